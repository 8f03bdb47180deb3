//! TargetPool: the ordered sequence of targets a campaign consumes.
//!
//! A pool is deliberately passive.  It does not build itself (an external
//! pool builder materialises it before the campaign starts), it makes no
//! selection decisions (targets are appended in the exact order they will be
//! injected), and it performs no routing.  The campaign controller owns the
//! pool exclusively and walks it with a single forward cursor.

use std::collections::BTreeMap;

use super::{Target, TargetKind};

/// Per-kind target counts, used in pool statistics and backend provisioning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindCounts {
    pub config: usize,
    pub reg: usize,
}

impl KindCounts {
    fn bump(&mut self, kind: TargetKind) {
        match kind {
            TargetKind::Config => self.config += 1,
            TargetKind::Reg => self.reg += 1,
        }
    }
}

/// Aggregate pool statistics for startup logging and the campaign summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    /// Total number of targets in the pool (not the remaining count).
    pub total: usize,
    /// Current cursor position.
    pub position: usize,
    /// Targets not yet served by `pop_next`.
    pub remaining: usize,
    /// Counts split by target kind.
    pub by_kind: KindCounts,
    /// Counts split by module, then by kind.
    pub by_module: BTreeMap<String, KindCounts>,
}

/// Ordered sequence of [`Target`]s with a single forward cursor.
///
/// `pop_next` advances the cursor exactly once per call and returns `None`
/// forever once the sequence is exhausted; `reset` rewinds the cursor
/// without touching the contents.
#[derive(Debug, Default)]
pub struct TargetPool {
    targets: Vec<Target>,
    cursor: usize,
}

impl TargetPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a single target at the end of the injection order.
    pub fn push(&mut self, target: Target) {
        self.targets.push(target);
    }

    /// Appends a batch of targets, preserving their order.
    pub fn extend(&mut self, targets: impl IntoIterator<Item = Target>) {
        self.targets.extend(targets);
    }

    /// Returns the next target in sequence, or `None` when exhausted.
    ///
    /// Each call advances the cursor exactly once.  The returned target is a
    /// clone; the pool keeps its contents so [`reset`](Self::reset) can
    /// replay the sequence.
    pub fn pop_next(&mut self) -> Option<Target> {
        let target = self.targets.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(target)
    }

    /// Rewinds the cursor to the first target.  Contents are unchanged.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Total number of targets (not the remaining count).
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// True when the pool holds no targets at all.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Targets the cursor has not yet served.
    pub fn remaining(&self) -> usize {
        self.targets.len().saturating_sub(self.cursor)
    }

    /// Counts targets by kind over the whole pool.
    pub fn count_by_kind(&self) -> KindCounts {
        let mut counts = KindCounts::default();
        for target in &self.targets {
            counts.bump(target.kind());
        }
        counts
    }

    /// Counts targets by module and kind over the whole pool.
    pub fn count_by_module(&self) -> BTreeMap<String, KindCounts> {
        let mut counts: BTreeMap<String, KindCounts> = BTreeMap::new();
        for target in &self.targets {
            counts
                .entry(target.module_name().to_string())
                .or_default()
                .bump(target.kind());
        }
        counts
    }

    /// Snapshot of all pool statistics.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            total: self.len(),
            position: self.cursor,
            remaining: self.remaining(),
            by_kind: self.count_by_kind(),
            by_module: self.count_by_module(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
