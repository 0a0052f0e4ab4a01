pub mod model;
pub mod service;

pub use model::{LoginPayload, User};
pub use service::*;
