//! Object key validation.
//!
//! Keys are `/`-separated strings relative to the root of a source. Local
//! keys are normalized, since many spellings name the same file. S3 keys are
//! opaque: `a//b` and `a/b` are different objects, so they are only checked.

use crate::error::{ErrorKind, Result};

/// Validates and normalizes an object key.
///
/// Empty segments and `.` segments are dropped, `..` pops the previous
/// segment but may never climb above the root. Null bytes are rejected.
///
/// # Examples
///
/// ```
/// use tuneshelf_storage::validate_key;
/// // Valid keys
/// assert!(validate_key("Rock/Artist/Album/song.mp3").is_ok());
/// assert!(validate_key("a/../song.mp3").is_ok()); // (never leaves the root)
/// // Invalid keys
/// assert!(validate_key("../etc/passwd").is_err());
/// assert!(validate_key("a\0b").is_err());
/// // Keys get resolved
/// assert_eq!(validate_key("wrong/../Rock//./song.mp3/").unwrap(), "Rock/song.mp3");
/// ```
pub fn validate(key: impl AsRef<str>) -> Result<String> {
    let key = key.as_ref();
    if key.contains('\0') {
        exn::bail!(ErrorKind::InvalidKey(key.to_string()));
    }
    let mut segments: Vec<&str> = Vec::new();
    for segment in key.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                if segments.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidKey(key.to_string()));
                }
            },
            normal => segments.push(normal),
        }
    }
    match segments.is_empty() {
        true => exn::bail!(ErrorKind::InvalidKey(key.to_string())),
        false => Ok(segments.join("/")),
    }
}

/// Checks a key that must be used exactly as given.
///
/// Only empty keys and null bytes are rejected.
///
/// ```
/// use tuneshelf_storage::check_raw_key;
/// assert_eq!(check_raw_key("Rock//./song.mp3").unwrap(), "Rock//./song.mp3");
/// assert!(check_raw_key("").is_err());
/// ```
pub fn check_raw(key: &str) -> Result<&str> {
    if key.is_empty() || key.contains('\0') {
        exn::bail!(ErrorKind::InvalidKey(key.to_string()));
    }
    Ok(key)
}

/// Lowercased extension of the last key segment, if it has one.
///
/// ```
/// use tuneshelf_storage::key_extension;
/// assert_eq!(key_extension("Rock/Song.FLAC").as_deref(), Some("flac"));
/// assert_eq!(key_extension("Rock.d/README"), None);
/// ```
pub fn extension(key: &str) -> Option<String> {
    let name = key.rsplit('/').next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
