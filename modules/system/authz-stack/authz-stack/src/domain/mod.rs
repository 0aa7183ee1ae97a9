//! Domain layer for the authorization stack.

pub mod error;
pub mod evaluator;
pub mod local_client;
pub mod registry;
pub mod service;
pub mod stack;

pub use error::DomainError;
pub use evaluator::{Decision, DecisionState, FaultPhase, PluginFault};
pub use local_client::AuthorizationLocalClient;
pub use registry::{PluginFactory, PluginRegistry};
pub use service::Service;
pub use stack::{PluginStack, StackEntry};
