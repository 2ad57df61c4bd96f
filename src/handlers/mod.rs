//! HTTP handlers for resource actions.

pub mod resource;
pub use resource::*;
