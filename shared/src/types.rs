// ========== USER ==========
pub use hyrax_atoms::users::model::{Department, LoginPayload, Role, User};

// ========== CAMPAIGN ==========
pub use hyrax_atoms::campaigns::model::Campaign;

// ========== TASK ==========
pub use hyrax_atoms::tasks::model::{
    ApprovalState, CreateTaskPayload, MediaType, Quantity, SetCopyApprovalPayload, Slot, SlotKind,
    Task, TaskRecord, UpdateTaskPayload,
};

// ========== LEDGER ==========
pub use creative_ledger::{LedgerError, Progress};
