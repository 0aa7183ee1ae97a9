#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Hot reload: atomic publication, abort on bad configuration, and
//! consistency of evaluations running while the stack is swapped.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use authz_stack::AuthzStack;
use authz_stack::config::AuthzStackConfig;
use authz_stack::domain::{PluginRegistry, Service, evaluator};
use authz_stack_sdk::{
    AuthorizationError, AuthorizationPlugin, ControlFlag, DirectoryProvider, DirectoryRecord,
    Entity, InMemorySession, LoadError, PluginDescriptorConfig, PluginError, PluginParams,
    ProviderError, RequestContext, Session, StackConfig,
};
use directory_attr_plugin::DirectoryAttrPlugin;
use directory_user_plugin::DirectoryUserPlugin;

/// Fixed verdict from its `verdict` parameter; counts live instances.
struct Verdict {
    allow: bool,
    live: Arc<AtomicUsize>,
}

impl Verdict {
    fn new(live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self {
            allow: false,
            live: Arc::clone(live),
        }
    }
}

impl Drop for Verdict {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuthorizationPlugin for Verdict {
    fn load(&mut self, params: &PluginParams) -> Result<(), LoadError> {
        self.allow = match params.require_str("verdict")? {
            "allow" => true,
            "deny" => false,
            other => return Err(LoadError::invalid("verdict", format!("unexpected '{other}'"))),
        };
        Ok(())
    }

    fn is_session_primed(&self, _ctx: &RequestContext) -> bool {
        true
    }

    fn is_allowed(&self, _ctx: &RequestContext, _entity: &Entity) -> Result<bool, PluginError> {
        Ok(self.allow)
    }
}

fn verdict_registry(live: &Arc<AtomicUsize>) -> PluginRegistry {
    let live = Arc::clone(live);
    PluginRegistry::new().with("verdict", move || Box::new(Verdict::new(&live)))
}

fn verdict(flag: ControlFlag, value: &str) -> PluginDescriptorConfig {
    PluginDescriptorConfig::new("verdict", flag, PluginParams::new().with("verdict", value))
}

/// Two REQUIRED allows: allowed after evaluating both entries.
fn allowing() -> StackConfig {
    StackConfig::new(vec![
        verdict(ControlFlag::Required, "allow"),
        verdict(ControlFlag::Required, "allow"),
    ])
}

/// REQUISITE deny first: denied after evaluating one entry.
fn denying() -> StackConfig {
    StackConfig::new(vec![
        verdict(ControlFlag::Requisite, "deny"),
        verdict(ControlFlag::Required, "allow"),
    ])
}

fn ctx() -> RequestContext {
    let session: Arc<dyn Session> = Arc::new(InMemorySession::new("s"));
    RequestContext::builder()
        .principal("jdoe")
        .session(session)
        .build()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn evaluations_see_exactly_one_generation_during_reloads() {
    let live = Arc::new(AtomicUsize::new(0));
    let svc = Arc::new(
        Service::with_config(verdict_registry(&live), &allowing())
            .await
            .unwrap(),
    );

    // Odd generations allow, even generations deny.
    let reloader = {
        let svc = Arc::clone(&svc);
        tokio::spawn(async move {
            for i in 0..50 {
                let cfg = if i % 2 == 0 { denying() } else { allowing() };
                svc.reload(&cfg).await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move {
                let entity = Entity::project("p");
                for _ in 0..200 {
                    let ctx = ctx();
                    let stack = svc.snapshot();
                    let decision = evaluator::evaluate(&stack, &ctx, &entity).await;
                    let odd = stack.generation() % 2 == 1;
                    assert_eq!(decision.allowed, odd, "generation {}", stack.generation());
                    assert_eq!(decision.evaluated, if odd { 2 } else { 1 });
                    assert!(decision.faults.is_empty());

                    // The client path must never panic or fault either.
                    let _ = svc.authorize(&ctx, &entity).await;
                }
            })
        })
        .collect();

    reloader.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }

    assert_eq!(svc.generation(), 51);
    // Only the active stack's two instances survive.
    assert_eq!(live.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn superseded_stack_lives_until_last_snapshot_is_released() {
    let live = Arc::new(AtomicUsize::new(0));
    let svc = Service::with_config(verdict_registry(&live), &allowing())
        .await
        .unwrap();

    let held = svc.snapshot();
    svc.reload(&denying()).await.unwrap();
    assert_eq!(live.load(Ordering::SeqCst), 4);
    assert!(evaluator::evaluate(&held, &ctx(), &Entity::project("p")).await.allowed);

    drop(held);
    assert_eq!(live.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rejected_reload_discards_built_instances() {
    let live = Arc::new(AtomicUsize::new(0));
    let svc = Service::with_config(verdict_registry(&live), &allowing())
        .await
        .unwrap();

    let bad = StackConfig::new(vec![
        verdict(ControlFlag::Required, "deny"),
        verdict(ControlFlag::Required, "maybe"),
    ]);
    assert!(svc.reload(&bad).await.is_err());

    assert_eq!(svc.generation(), 1);
    assert_eq!(live.load(Ordering::SeqCst), 2);
}

struct NoDirectory;

#[async_trait]
impl DirectoryProvider for NoDirectory {
    async fn lookup(
        &self,
        _base: Option<&str>,
        _filter: &str,
        _attributes: &[String],
    ) -> Result<DirectoryRecord, ProviderError> {
        Ok(DirectoryRecord::new())
    }
}

fn directory_registry() -> PluginRegistry {
    let provider: Arc<dyn DirectoryProvider> = Arc::new(NoDirectory);
    PluginRegistry::new()
        .with(directory_user_plugin::PLUGIN_NAME, move || {
            Box::new(DirectoryUserPlugin::new(Arc::clone(&provider)))
        })
        .with(directory_attr_plugin::PLUGIN_NAME, || {
            Box::new(DirectoryAttrPlugin::new())
        })
}

const GOOD: &str = r#"
authorization:
  stack:
    - name: directory-user
      flag: required
      parameters:
        objectclass: person
        attributes: mail
"#;

// Second entry lacks its mandatory `attribute`.
const MISSING_KEY: &str = r#"
authorization:
  stack:
    - name: directory-user
      flag: required
      parameters:
        objectclass: person
        attributes: mail
    - name: directory-attr
      flag: required
"#;

fn write_config(file: &tempfile::NamedTempFile, yaml: &str) {
    std::fs::write(file.path(), yaml).unwrap();
}

#[tokio::test]
async fn reload_from_file_aborts_on_missing_required_key() {
    let cfg = AuthzStackConfig::from_yaml_str(GOOD).unwrap();
    let module = AuthzStack::init(&cfg, directory_registry()).await.unwrap();
    assert_eq!(module.service().generation(), 1);

    let file = tempfile::NamedTempFile::new().unwrap();
    write_config(&file, MISSING_KEY);

    let err = module.reload_from_file(file.path()).await.unwrap_err();
    let cause = err
        .chain()
        .find_map(|e| e.downcast_ref::<AuthorizationError>())
        .expect("authorization error in chain");
    assert!(matches!(
        cause,
        AuthorizationError::PluginLoad { name, source: LoadError::MissingParameter { .. } }
            if name == directory_attr_plugin::PLUGIN_NAME
    ));
    assert_eq!(module.service().generation(), 1);
    assert_eq!(module.service().snapshot().len(), 1);
}

#[tokio::test]
async fn reload_from_file_publishes_next_generation() {
    let module = AuthzStack::init(&AuthzStackConfig::default(), directory_registry())
        .await
        .unwrap();
    assert_eq!(module.service().generation(), 0);

    let file = tempfile::NamedTempFile::new().unwrap();
    write_config(&file, MISSING_KEY);
    assert!(module.reload_from_file(file.path()).await.is_err());

    write_config(&file, GOOD);
    let report = module.reload_from_file(file.path()).await.unwrap();
    assert_eq!(report.generation, 1);
    assert_eq!(report.entries, 1);
}

#[tokio::test]
async fn unknown_plugin_is_rejected_by_client() {
    let module = AuthzStack::init(&AuthzStackConfig::default(), directory_registry())
        .await
        .unwrap();
    let cfg = StackConfig::new(vec![PluginDescriptorConfig::new(
        "ldap-fancy",
        ControlFlag::Optional,
        PluginParams::new(),
    )]);

    let err = module.client().reload(&cfg).await.unwrap_err();
    assert!(matches!(err, AuthorizationError::UnknownPlugin { ref name } if name == "ldap-fancy"));
    assert!(
        !module
            .client()
            .authorize(&ctx(), &Entity::project("p"))
            .await
    );
}

#[tokio::test]
async fn init_fails_for_invalid_startup_stack() {
    let cfg = AuthzStackConfig::from_yaml_str(MISSING_KEY).unwrap();
    assert!(AuthzStack::init(&cfg, directory_registry()).await.is_err());
}
