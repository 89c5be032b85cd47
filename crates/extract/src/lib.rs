//! Audio tag decoding.
//!
//! Turns a local audio file into [`CanonicalMetadata`]: one normalized record
//! regardless of which tag dialects (ID3v2, Vorbis comments, MP4 atoms, APE,
//! ...) the container carries. Also hosts the pure [duration
//! estimator](crate::duration) and the [wire protocol](crate::wire) used to run
//! the decoder in an isolated worker process.

mod consts;
mod decoder;
mod dialect;
pub mod duration;
pub mod error;
mod format;
pub mod models;
mod numeric;
pub mod wire;

pub use crate::decoder::TagDecoder;
pub use crate::dialect::{Dialect, Field};
pub use crate::format::AudioFormat;
pub use crate::models::{CanonicalMetadata, CoverArt};
pub use crate::numeric::leading_number;

use crate::error::Result;
use std::path::Path;

/// Easy, top-level entrypoint: decode a local file with default options.
///
/// Equivalent to `TagDecoder::default().decode(path)`.
pub fn decode(path: impl AsRef<Path>) -> Result<CanonicalMetadata> {
    TagDecoder::default().decode(path.as_ref())
}
