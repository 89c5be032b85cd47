//! Read access to the object stores that hold an audio library.
//!
//! Every store is exposed through the [`ObjectSource`] trait: a lazy listing
//! of objects with their change fingerprints (etag + size), full downloads to
//! a local destination, byte-range reads and metadata lookups.

pub mod backend;
pub mod error;
mod key;
mod object;

pub use crate::backend::ObjectSource;
pub use crate::key::{check_raw as check_raw_key, extension as key_extension, validate as validate_key};
pub use crate::object::{ByteRange, ObjectHead, ObjectInfo};
use std::sync::Arc;

pub type SourceHandle = Arc<dyn ObjectSource + Send + Sync>;
