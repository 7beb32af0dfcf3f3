//! Debug and statistics module

use crate::propagation::{PropagationReport, WriteStatus};

/// Running totals over propagation reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagationStats {
    /// Writes requested
    writes: u64,
    /// Writes that propagated through a hierarchy
    propagated: u64,
    /// Writes applied to standalone entities
    standalone: u64,
    /// Writes rejected because the target mirrors its parent
    mirror_rejected: u64,
    /// Writes dropped because the target was dead or the handle stale
    dropped: u64,
    /// Descendant slots recomputed
    nodes_visited: u64,
    /// Transforms written out
    transforms_written: u64,
    /// Dead descendant slots skipped
    dead_skipped: u64,
    /// Frames ended
    frames: u64,
}

impl PropagationStats {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one report into the totals
    pub fn record(&mut self, report: &PropagationReport) {
        self.writes += 1;
        match report.status {
            WriteStatus::Propagated => self.propagated += 1,
            WriteStatus::Standalone => self.standalone += 1,
            WriteStatus::MirrorRejected => self.mirror_rejected += 1,
            WriteStatus::TargetDead | WriteStatus::StaleHandle => self.dropped += 1,
        }
        self.nodes_visited += report.visited as u64;
        self.transforms_written += report.written as u64;
        self.dead_skipped += report.skipped_dead as u64;
    }

    /// Add another tracker's totals to this one
    pub fn merge(&mut self, other: &Self) {
        self.writes += other.writes;
        self.propagated += other.propagated;
        self.standalone += other.standalone;
        self.mirror_rejected += other.mirror_rejected;
        self.dropped += other.dropped;
        self.nodes_visited += other.nodes_visited;
        self.transforms_written += other.transforms_written;
        self.dead_skipped += other.dead_skipped;
        self.frames += other.frames;
    }

    /// Count a finished frame
    pub fn record_frame(&mut self) {
        self.frames += 1;
    }

    /// Get writes requested
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Get writes that propagated through a hierarchy
    pub fn propagated(&self) -> u64 {
        self.propagated
    }

    /// Get writes applied to standalone entities
    pub fn standalone(&self) -> u64 {
        self.standalone
    }

    /// Get writes rejected on mirror nodes
    pub fn mirror_rejected(&self) -> u64 {
        self.mirror_rejected
    }

    /// Get writes dropped on dead targets or stale handles
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Get descendant slots recomputed
    pub fn nodes_visited(&self) -> u64 {
        self.nodes_visited
    }

    /// Get transforms written out
    pub fn transforms_written(&self) -> u64 {
        self.transforms_written
    }

    /// Get dead descendant slots skipped
    pub fn dead_skipped(&self) -> u64 {
        self.dead_skipped
    }

    /// Get frames ended
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Average descendants recomputed per propagated write
    pub fn avg_subtree(&self) -> f32 {
        if self.propagated == 0 {
            0.0
        } else {
            self.nodes_visited as f32 / self.propagated as f32
        }
    }

    /// Clear all totals
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Get a formatted stats string
    pub fn summary(&self) -> String {
        format!(
            "Writes: {} (propagated {}, standalone {}, mirror {}, dropped {}) | Nodes: {} (avg {:.1}) | Written: {} | Dead: {} | Frames: {}",
            self.writes,
            self.propagated,
            self.standalone,
            self.mirror_rejected,
            self.dropped,
            self.nodes_visited,
            self.avg_subtree(),
            self.transforms_written,
            self.dead_skipped,
            self.frames
        )
    }
}
