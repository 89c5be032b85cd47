use regex::Regex;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// Leading run of digits, ignoring surrounding whitespace: "07", "3/12", "2004-05-01".
regex!(LEADING_NUMBER_REGEX, r"^\s*(\d+)");
