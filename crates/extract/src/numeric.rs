use crate::consts::LEADING_NUMBER_REGEX;

/// Parse the leading run of digits of a tag value.
///
/// Track, disc and year tags come in many shapes (`"7"`, `"7/12"`,
/// `"2004-05-01T00:00"`); only the leading number is meaningful. Values
/// without a leading number, or whose number doesn't fit, are absent.
///
/// ```
/// use tuneshelf_extract::leading_number;
/// assert_eq!(leading_number("3/12"), Some(3));
/// assert_eq!(leading_number("2004-05-01"), Some(2004));
/// assert_eq!(leading_number("n/a"), None);
/// ```
pub fn leading_number(value: &str) -> Option<u32> {
    LEADING_NUMBER_REGEX.captures(value)?.get(1)?.as_str().parse().ok()
}
