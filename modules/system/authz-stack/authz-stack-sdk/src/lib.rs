#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Authorization Stack SDK
//!
//! This crate provides the public contracts of the authorization stack:
//!
//! - [`AuthorizationClient`] - Public API trait for the serving layer
//! - [`AuthorizationPlugin`] - Contract every decision module implements
//! - [`RequestContext`], [`Session`], [`InMemorySession`] - Per-request and per-caller state
//! - [`session_cache`] - Shared helpers for plugin-owned session namespaces
//! - [`DirectoryProvider`], [`PooledDirectoryProvider`] - Directory service abstraction
//! - [`StackConfig`], [`ControlFlag`], [`PluginParams`] - Stack configuration boundary
//!
//! ## Usage
//!
//! ```ignore
//! use authz_stack_sdk::{AuthorizationClient, Entity, RequestContext};
//!
//! let ctx = RequestContext::builder()
//!     .principal("jdoe (cn=jdoe)")
//!     .session(session)
//!     .build();
//!
//! if client.authorize(&ctx, &Entity::project("kernel")).await {
//!     // render the project
//! }
//! ```

pub mod api;
pub mod error;
pub mod models;
pub mod plugin_api;
pub mod provider;
pub mod session;
pub mod session_cache;

// Re-export main types at crate root
pub use api::AuthorizationClient;
pub use error::{AuthorizationError, LoadError, PluginError, ProviderError};
pub use models::{
    ControlFlag, Entity, EntityKind, PluginDescriptorConfig, PluginParams, Principal,
    ReloadReport, StackConfig,
};
pub use plugin_api::AuthorizationPlugin;
pub use provider::{
    DirectoryConnection, DirectoryConnector, DirectoryPoolConfig, DirectoryProvider,
    DirectoryRecord, PooledDirectoryProvider,
};
pub use session::{InMemorySession, RequestContext, RequestContextBuilder, Session, SessionValue};
