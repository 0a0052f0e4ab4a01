pub mod model;
pub mod service;

pub use model::Campaign;
pub use service::*;
