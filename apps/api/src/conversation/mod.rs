//! Conversation pipeline: prompt composition, completion, persisted history,
//! and reply segmentation.

pub mod composer;
pub mod handlers;
pub mod segment;
pub mod store;

pub use store::{Role, Turn};
