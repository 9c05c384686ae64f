//! Session finalization: from buffered chunks to one recording on disk

mod finalizer;
pub mod naming;

pub use finalizer::{FinalizeOutcome, OutputMode, SessionFinalizer, TRANSCODE_SUBDIR};
