//! Data models for Todoist entities

mod comment;
mod task;

pub use comment::*;
pub use task::*;
