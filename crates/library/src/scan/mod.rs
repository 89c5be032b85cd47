pub(crate) mod error;
mod file;
mod progress;
mod stream;

pub use self::error::ErrorKind;
pub use self::file::{FileReport, FileState, scan_object};
pub use self::progress::ScanProgress;
pub use self::stream::{ScanEvent, ScanOptions, scan, scan_stream};
