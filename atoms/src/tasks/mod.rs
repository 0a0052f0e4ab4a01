pub mod http;
pub mod model;
pub mod service;

pub use model::{ApprovalState, MediaType, Slot, SlotKind, Task, TaskRecord};
pub use service::TaskSyncHook;
pub use http::*;
