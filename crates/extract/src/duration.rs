//! Duration estimation from bitrate and file size.

use crate::models::CanonicalMetadata;

/// Estimated playback length in seconds: `size * 8 / bitrate`.
///
/// Returns `0.0` for a non-positive bitrate. Accurate for CBR streams; VBR
/// files without a seek header will be off by however much their average
/// bitrate differs from the one reported.
pub fn estimate(bitrate_bps: i64, file_size_bytes: u64) -> f64 {
    if bitrate_bps <= 0 {
        return 0.0;
    }
    (file_size_bytes as f64 * 8.0) / bitrate_bps as f64
}

/// Fill in a missing duration from the bitrate and the *real* object size.
///
/// Only applies when the decoded duration is not positive and both inputs
/// are known. Returns whether an estimate was applied.
pub fn apply(metadata: &mut CanonicalMetadata, actual_size: Option<u64>) -> bool {
    if metadata.has_duration() {
        return false;
    }
    let (Some(bitrate), Some(size)) = (metadata.bitrate, actual_size) else {
        return false;
    };
    let estimated = estimate(i64::from(bitrate), size);
    if estimated <= 0.0 {
        return false;
    }
    tracing::debug!(bitrate, size, estimated, "estimated duration from bitrate");
    metadata.duration = estimated;
    metadata.duration_estimated = true;
    true
}
