//! Deciding how an object gets decoded.
//!
//! Two independent axes: how the local file is prepared ([`InputMode`]) and
//! where the decoder runs ([`Placement`]). Both are decided up front and
//! returned as a value so the decision can be logged and tested.

use crate::budget::ResourceBudget;
use derive_more::Display;
use std::collections::HashSet;
use std::sync::Arc;
use tuneshelf_config::ExtractionConfig;
use tuneshelf_storage::ObjectInfo;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputMode {
    /// Header and footer ranges stitched into a sparse file of the real size.
    #[display("partial")]
    Partial,
    /// The whole object.
    #[display("full")]
    Full,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    /// In-process first, falling back once to the isolated worker.
    #[display("in-process")]
    InProcess,
    /// Straight to the isolated worker.
    #[display("subprocess")]
    Subprocess,
}

/// Why the placement was chosen.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum Reason {
    #[display("{_0} is a memory-intensive format")]
    MemoryIntensiveFormat(String),
    #[display("object is {_0} bytes")]
    LargeObject(u64),
    #[display("only {_0} bytes of memory headroom")]
    LowHeadroom(u64),
    #[display("no resource risk")]
    Routine,
}

#[derive(Debug, Display, Clone, PartialEq, Eq)]
#[display("{input} input, {placement} ({reason})")]
pub struct ExtractionPlan {
    pub input: InputMode,
    pub placement: Placement,
    pub reason: Reason,
}

#[derive(Debug, Clone)]
pub struct StrategySelector {
    memory_intensive: HashSet<String>,
    size_threshold: u64,
    headroom_threshold: u64,
    partial_reads: bool,
    partial_bytes: u64,
    budget: Arc<dyn ResourceBudget>,
}

impl StrategySelector {
    pub fn new(config: &ExtractionConfig, budget: Arc<dyn ResourceBudget>) -> Self {
        Self {
            memory_intensive: config.memory_intensive_formats.iter().map(|ext| ext.to_ascii_lowercase()).collect(),
            size_threshold: config.size_threshold_bytes,
            headroom_threshold: config.headroom_threshold_bytes,
            partial_reads: config.partial_reads,
            partial_bytes: config.header_bytes.saturating_add(config.footer_bytes),
            budget,
        }
    }

    pub fn plan(&self, object: &ObjectInfo) -> ExtractionPlan {
        let input = if self.partial_reads && object.size > self.partial_bytes {
            InputMode::Partial
        } else {
            InputMode::Full
        };
        let (placement, reason) = match self.risk(object) {
            Some(reason) => (Placement::Subprocess, reason),
            None => (Placement::InProcess, Reason::Routine),
        };
        ExtractionPlan { input, placement, reason }
    }

    /// The first resource risk that applies, if any. The budget is only
    /// sampled when the cheaper checks pass.
    fn risk(&self, object: &ObjectInfo) -> Option<Reason> {
        if let Some(extension) = object.extension()
            && self.memory_intensive.contains(&extension)
        {
            return Some(Reason::MemoryIntensiveFormat(extension));
        }
        if object.size >= self.size_threshold {
            return Some(Reason::LargeObject(object.size));
        }
        match self.budget.headroom() {
            Some(headroom) if headroom < self.headroom_threshold => Some(Reason::LowHeadroom(headroom)),
            _ => None,
        }
    }
}
