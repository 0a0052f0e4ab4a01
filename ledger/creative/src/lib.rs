//! Task creative ledger: per-slot artifact/approval/feedback bookkeeping and
//! the derived-state rules built on it (required slot counts, slot status,
//! per-department progress).
//!
//! Every read path is total over malformed data - short or missing columns
//! behave as defaults and never panic. The one rejected input is a negative
//! slot index on a write, which is a caller bug, not a data problem.

pub mod http;
pub mod progress;
pub mod slots;

pub use progress::{done_today, weekly_progress, Progress};
pub use slots::{
    delete_slot_artifact, required_slot_count, set_slot_approval, set_slot_artifact,
    set_slot_feedback, slot_status, LedgerError,
};
