#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Directory User Plugin
//!
//! Looks up the caller's directory entry and caches a configured subset of
//! its attributes in the session, for itself and for plugins further down the
//! stack.
//!
//! The caller's common name is taken from the principal string (the first
//! `cn=<token>` occurrence, e.g. `"jdoe (cn=jdoe)"`). Principals without one
//! are never looked up and are denied.
//!
//! Only configured attributes that come back with at least one value are
//! cached. When the entry is found but none of the configured attributes has
//! a value, nothing is cached and the caller is denied, even though the entry
//! exists in the directory.
//!
//! ## Configuration
//!
//! ```yaml
//! authorization:
//!   stack:
//!     - name: directory-user
//!       flag: required
//!       parameters:
//!         objectclass: person
//!         attributes: "mail,title"
//! ```

pub mod config;
pub mod domain;

pub use config::DirectoryUserConfig;
pub use domain::{DirectoryUser, DirectoryUserPlugin};

/// Registry identifier.
pub const PLUGIN_NAME: &str = "directory-user";

/// Session key holding the cached [`DirectoryUser`].
pub const SESSION_NAMESPACE: &str = "authz-directory-user";
