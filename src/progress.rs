//! Progress callbacks for batch conversion.
//!
//! Pass an [`Arc<dyn BatchProgressCallback>`] to
//! [`crate::DocumentEngine::convert_batch_with_progress`] to hear about each
//! file as it finishes. The library never draws anything itself; the CLI
//! forwards these events to an indicatif bar, a server could forward them to
//! a job record.
//!
//! # Example
//!
//! ```rust
//! use edgequake_doc2json::{BatchProgressCallback, ConversionOutcome};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct FailureCounter(AtomicUsize);
//!
//! impl BatchProgressCallback for FailureCounter {
//!     fn on_item_complete(&self, _index: usize, _total: usize, outcome: &ConversionOutcome) {
//!         if !outcome.is_success() {
//!             self.0.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//! ```

use crate::output::ConversionOutcome;
use std::path::Path;
use std::sync::Arc;

/// Events emitted while a batch runs.
///
/// Items run concurrently, so `on_item_start` and `on_item_complete` may be
/// called from different tasks at once and in any order. All methods default
/// to no-ops.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any file is converted.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called before the converter is launched for `input`.
    /// `index` is the zero-based position in the input list.
    fn on_item_start(&self, index: usize, total: usize, input: &Path) {
        let _ = (index, total, input);
    }

    /// Called with each file's outcome, success or failure.
    fn on_item_complete(&self, index: usize, total: usize, outcome: &ConversionOutcome) {
        let _ = (index, total, outcome);
    }

    /// Called once after every file has been attempted.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// Default when no callback is supplied.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
