//! Built-in request handlers

pub mod members;

pub use members::{MembersResponse, MEMBERS, MEMBERS_PATH};
