//! Authorization Stack Module
//!
//! This module holds the active stack of decision plugins, evaluates it per
//! `(request, entity)` pair with PAM-style control flags, and swaps it
//! atomically on reload.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;
pub mod module;

pub use module::AuthzStack;
