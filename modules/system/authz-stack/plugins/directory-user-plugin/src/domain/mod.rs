//! Domain layer for the directory user plugin.

mod client;
pub mod model;
pub mod service;

pub use model::DirectoryUser;
pub use service::DirectoryUserPlugin;
