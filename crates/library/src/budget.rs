//! Memory introspection.
//!
//! The strategy selector only needs one number, the memory headroom, but
//! samples keep both halves so decisions can be logged.

use std::fmt::Debug;
use std::fs;
use std::path::PathBuf;

const KIB: u64 = 1024;
// cgroup v1 reports "unlimited" as a page-aligned i64::MAX.
const UNLIMITED_THRESHOLD: u64 = 1 << 60;

const CGROUP_V2_LIMIT: &str = "sys/fs/cgroup/memory.max";
const CGROUP_V2_USAGE: &str = "sys/fs/cgroup/memory.current";
const CGROUP_V1_LIMIT: &str = "sys/fs/cgroup/memory/memory.limit_in_bytes";
const CGROUP_V1_USAGE: &str = "sys/fs/cgroup/memory/memory.usage_in_bytes";
const PROC_MEMINFO: &str = "proc/meminfo";
const PROC_STATUS: &str = "proc/self/status";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySample {
    pub limit_bytes: u64,
    pub used_bytes: u64,
}
impl MemorySample {
    pub fn new(limit_bytes: u64, used_bytes: u64) -> Self {
        Self { limit_bytes, used_bytes }
    }

    pub fn headroom(&self) -> u64 {
        self.limit_bytes.saturating_sub(self.used_bytes)
    }
}

/// Somewhere to ask how much memory is left.
///
/// `None` means the platform gave no usable answer; callers treat that as
/// "no pressure" rather than guessing.
pub trait ResourceBudget: Debug + Send + Sync {
    fn sample(&self) -> Option<MemorySample>;

    fn headroom(&self) -> Option<u64> {
        self.sample().map(|sample| sample.headroom())
    }
}

/// Reads the host's (or container's) memory accounting.
///
/// Limit: cgroup v2 `memory.max`, then cgroup v1 `memory.limit_in_bytes`,
/// capped at (or falling back to) `MemTotal`. Usage: the cgroup's current
/// usage, then `MemTotal - MemAvailable`, then this process's `VmRSS`.
#[derive(Debug, Clone)]
pub struct HostBudget {
    root: PathBuf,
}
impl Default for HostBudget {
    fn default() -> Self {
        Self::with_root("/")
    }
}
impl HostBudget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the well-known files under `root` instead of `/`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read(&self, relative: &str) -> Option<String> {
        fs::read_to_string(self.root.join(relative)).ok()
    }

    /// `(limit, usage)` of the first cgroup hierarchy that answers; the
    /// limit is `None` when unlimited.
    fn cgroup(&self) -> Option<(Option<u64>, u64)> {
        [(CGROUP_V2_LIMIT, CGROUP_V2_USAGE), (CGROUP_V1_LIMIT, CGROUP_V1_USAGE)]
            .into_iter()
            .find_map(|(limit, usage)| {
                let limit = parse_cgroup_limit(&self.read(limit)?)?;
                let usage = self.read(usage)?.trim().parse().ok()?;
                Some((limit, usage))
            })
    }
}
impl ResourceBudget for HostBudget {
    fn sample(&self) -> Option<MemorySample> {
        let meminfo = self.read(PROC_MEMINFO).unwrap_or_default();
        let total = parse_kib_field(&meminfo, "MemTotal");
        if let Some((limit, used)) = self.cgroup() {
            let limit = match (limit, total) {
                (Some(limit), Some(total)) => limit.min(total),
                (Some(limit), None) => limit,
                (None, Some(total)) => total,
                (None, None) => return None,
            };
            return Some(MemorySample::new(limit, used));
        }
        let total = total?;
        let used = match parse_kib_field(&meminfo, "MemAvailable") {
            Some(available) => total.saturating_sub(available),
            None => parse_kib_field(&self.read(PROC_STATUS)?, "VmRSS")?,
        };
        Some(MemorySample::new(total, used))
    }
}

/// A budget that always reports the same sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBudget(Option<MemorySample>);
impl FixedBudget {
    pub fn new(limit_bytes: u64, used_bytes: u64) -> Self {
        Self(Some(MemorySample::new(limit_bytes, used_bytes)))
    }

    pub fn unknown() -> Self {
        Self(None)
    }
}
impl ResourceBudget for FixedBudget {
    fn sample(&self) -> Option<MemorySample> {
        self.0
    }
}

/// `Some(None)` for an unlimited limit, `None` for garbage.
fn parse_cgroup_limit(contents: &str) -> Option<Option<u64>> {
    let value = contents.trim();
    if value == "max" {
        return Some(None);
    }
    let limit: u64 = value.parse().ok()?;
    Some((limit < UNLIMITED_THRESHOLD).then_some(limit))
}

/// Value of a `Name:   1234 kB` line, in bytes.
fn parse_kib_field(contents: &str, field: &str) -> Option<u64> {
    contents.lines().find_map(|line| {
        let rest = line.strip_prefix(field)?.strip_prefix(':')?;
        let kib: u64 = rest.split_whitespace().next()?.parse().ok()?;
        Some(kib * KIB)
    })
}
