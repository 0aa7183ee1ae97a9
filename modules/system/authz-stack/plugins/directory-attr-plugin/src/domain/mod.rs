//! Domain layer for the directory attribute plugin.

mod client;
pub mod service;

pub use service::DirectoryAttrPlugin;
