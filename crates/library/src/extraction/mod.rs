//! Getting [`CanonicalMetadata`] out of a remote object.
//!
//! The [`Extractor`] asks the [`StrategySelector`] for a plan, stages the
//! object locally and runs the decoders, falling back along this chain:
//!
//! 1. partial input, planned placement;
//! 2. if that fails, or finds no duration even when estimated from the
//!    listed object size, full input, planned placement.
//!
//! Within a placement, in-process decoding falls back once to the isolated
//! worker with the same file. A worker failure is terminal for that input;
//! a worker timeout or an interruption is terminal for the file.

mod decoder;
pub mod error;
mod stage;
mod strategy;

pub use self::decoder::{DecoderHandle, InProcessDecoder, MetadataDecoder, SubprocessDecoder};
pub use self::stage::{StagedFile, Stager};
pub use self::strategy::{ExtractionPlan, InputMode, Placement, Reason, StrategySelector};

use self::error::{ErrorKind, Result};
use std::path::Path;
use tracing::instrument;
use tuneshelf_extract::CanonicalMetadata;
use tuneshelf_storage::ObjectInfo;

/// What an extraction produced, and how.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub metadata: CanonicalMetadata,
    pub plan: ExtractionPlan,
    /// Input the metadata actually came from.
    pub input: InputMode,
    /// Where the successful decode ran.
    pub placement: Placement,
}

pub struct Extractor {
    selector: StrategySelector,
    stager: Stager,
    in_process: DecoderHandle,
    subprocess: DecoderHandle,
}

impl Extractor {
    pub fn new(selector: StrategySelector, stager: Stager, in_process: DecoderHandle, subprocess: DecoderHandle) -> Self {
        Self {
            selector,
            stager,
            in_process,
            subprocess,
        }
    }

    pub fn stager(&self) -> &Stager {
        &self.stager
    }

    pub fn plan(&self, object: &ObjectInfo) -> ExtractionPlan {
        self.selector.plan(object)
    }

    #[instrument(level = "debug", skip_all, fields(key = %object.key, size = object.size))]
    pub async fn extract(&self, object: &ObjectInfo) -> Result<Extraction> {
        let plan = self.selector.plan(object);
        tracing::debug!(%plan, "planned extraction");

        if plan.input == InputMode::Partial {
            match self.attempt(object, InputMode::Partial, plan.placement).await {
                Ok((metadata, placement)) if metadata.has_duration() => {
                    return Ok(Extraction {
                        metadata,
                        plan,
                        input: InputMode::Partial,
                        placement,
                    });
                },
                Ok(_) => tracing::debug!("no duration from partial input; downloading whole object"),
                Err(err) if matches!(&*err, ErrorKind::Interrupted | ErrorKind::Timeout(_)) => return Err(err),
                Err(err) => tracing::debug!(error = %err, "partial input failed; downloading whole object"),
            }
        }

        let (metadata, placement) = self.attempt(object, InputMode::Full, plan.placement).await?;
        Ok(Extraction {
            metadata,
            plan,
            input: InputMode::Full,
            placement,
        })
    }

    async fn attempt(
        &self,
        object: &ObjectInfo,
        input: InputMode,
        placement: Placement,
    ) -> Result<(CanonicalMetadata, Placement)> {
        let staged = self.stager.stage(object, input).await?;
        self.decode(staged.path(), staged.size_hint(), placement).await
    }

    async fn decode(
        &self,
        path: &Path,
        size_hint: Option<u64>,
        placement: Placement,
    ) -> Result<(CanonicalMetadata, Placement)> {
        if placement == Placement::InProcess {
            match self.in_process.decode(path, size_hint).await {
                Ok(metadata) => return Ok((metadata, Placement::InProcess)),
                Err(err) => tracing::debug!(error = %err, "in-process decoding failed; retrying in worker"),
            }
        }
        let metadata = self.subprocess.decode(path, size_hint).await?;
        Ok((metadata, Placement::Subprocess))
    }
}
