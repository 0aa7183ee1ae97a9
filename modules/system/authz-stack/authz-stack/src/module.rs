//! Authorization stack module.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use authz_stack_sdk::{AuthorizationClient, ReloadReport};
use tracing::info;

use crate::config::AuthzStackConfig;
use crate::domain::{AuthorizationLocalClient, PluginRegistry, Service};

/// Authorization stack module.
///
/// This module:
/// 1. Builds the initial stack from configuration (empty stack when none is configured)
/// 2. Exposes the [`AuthorizationClient`] used by the serving layer
/// 3. Hot-reloads the stack from a configuration source on demand
pub struct AuthzStack {
    service: Arc<Service>,
    client: Arc<dyn AuthorizationClient>,
}

impl AuthzStack {
    /// Initialize the module with the built-in `registry` and startup `cfg`.
    ///
    /// Only `cfg.authorization` is read here. Directory-backed plugins get
    /// their provider from the factories in `registry`, so the caller builds
    /// a [`PooledDirectoryProvider`](authz_stack_sdk::PooledDirectoryProvider)
    /// from `cfg.directory` and its own connector before registering them.
    ///
    /// # Errors
    ///
    /// Fails when the startup stack cannot be built or fails its smoke test.
    #[tracing::instrument(skip_all, fields(entries = cfg.authorization.stack.len()))]
    pub async fn init(cfg: &AuthzStackConfig, registry: PluginRegistry) -> anyhow::Result<Self> {
        info!(plugins = ?registry.names(), "Initializing authz-stack module");

        let service = Arc::new(Service::new(registry));
        if !cfg.authorization.stack.is_empty() {
            service
                .reload(&cfg.authorization)
                .await
                .context("startup authorization stack rejected")?;
        }

        let client: Arc<dyn AuthorizationClient> =
            Arc::new(AuthorizationLocalClient::new(Arc::clone(&service)));

        info!(generation = service.generation(), "authz-stack module initialized");
        Ok(Self { service, client })
    }

    #[must_use]
    pub fn client(&self) -> Arc<dyn AuthorizationClient> {
        Arc::clone(&self.client)
    }

    #[must_use]
    pub fn service(&self) -> &Arc<Service> {
        &self.service
    }

    /// Re-read `path` and reload the stack it describes.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be parsed or the new stack is rejected; the
    /// active stack keeps serving in both cases.
    pub async fn reload_from_file(&self, path: &Path) -> anyhow::Result<ReloadReport> {
        let cfg = AuthzStackConfig::from_yaml_file(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let report = self
            .client
            .reload(&cfg.authorization)
            .await
            .with_context(|| format!("reloading from {}", path.display()))?;
        Ok(report)
    }
}
