#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Directory Attribute Plugin
//!
//! Allows callers whose cached directory entry carries a given attribute,
//! optionally restricted to a set of accepted values. Reads the facts the
//! directory user plugin stores, so it must be stacked after it.
//!
//! ## Configuration
//!
//! ```yaml
//! authorization:
//!   stack:
//!     - name: directory-user
//!       flag: requisite
//!       parameters: { objectclass: person, attributes: "mail,ou" }
//!     - name: directory-attr
//!       flag: required
//!       parameters:
//!         attribute: ou
//!         values: "engineering,qa"
//! ```

pub mod config;
pub mod domain;

pub use config::DirectoryAttrConfig;
pub use domain::DirectoryAttrPlugin;

/// Registry identifier.
pub const PLUGIN_NAME: &str = "directory-attr";
