//! Options controlling a transcode run.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::decode::DisplayZone;
use crate::formats::parquet::{ReadOptions, WriteOptions};
use crate::pipeline::inspect::InspectOptions;

/// What a batch does after one file fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop at the first failed file and return its error.
    Abort,
    /// Record the failure and carry on with the remaining files.
    #[default]
    Continue,
}

/// Options shared by [`crate::pipeline::transcode_file`] and the batch
/// entry points.
#[derive(Debug, Clone, Default)]
pub struct TranscodeOptions {
    /// Source options.
    pub read: ReadOptions,
    /// Sink options.
    pub write: WriteOptions,
    /// Decode and log annotated values before writing, when set.
    pub inspect: Option<InspectOptions>,
    /// Behaviour of batches after a failed file.
    pub failure_policy: FailurePolicy,
    /// Flag polled between files; once set, no further file is started.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl TranscodeOptions {
    /// Default options: no inspection, `Continue` on failure.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable inspection with instants rendered in `zone`.
    pub fn with_inspect(mut self, zone: DisplayZone) -> Self {
        self.inspect = Some(InspectOptions::new(zone));
        self
    }

    /// Set the batch failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the maximum number of rows per output row group.
    pub fn with_row_group_rows(mut self, rows: usize) -> Self {
        self.write.row_group_rows = rows;
        self
    }

    /// Install a cancellation flag.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_continue_without_inspection() {
        let options = TranscodeOptions::new();
        assert_eq!(options.failure_policy, FailurePolicy::Continue);
        assert!(options.inspect.is_none());
        assert!(options.read.int96_as_fixed);
        assert!(!options.write.dictionary_enabled);
        assert!(!options.is_cancelled());
    }

    #[test]
    fn cancel_flag_is_observed() {
        let flag = Arc::new(AtomicBool::new(false));
        let options = TranscodeOptions::new().with_cancel_flag(flag.clone());
        assert!(!options.is_cancelled());
        flag.store(true, Ordering::Relaxed);
        assert!(options.is_cancelled());
    }
}
