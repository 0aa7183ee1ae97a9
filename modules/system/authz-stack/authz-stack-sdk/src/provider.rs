//! Directory provider abstraction.
//!
//! [`DirectoryProvider`] is the capability plugins query for directory facts.
//! [`PooledDirectoryProvider`] implements it over any [`DirectoryConnector`],
//! keeping connection lifecycle internal: each lookup is atomic from the
//! caller's view and fails with a [`ProviderError`] instead of blocking.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::ProviderError;

/// Attribute name to value set, as returned by one lookup.
pub type DirectoryRecord = HashMap<String, BTreeSet<String>>;

/// Query capability of an external attribute store.
#[async_trait]
pub trait DirectoryProvider: Send + Sync {
    /// Look up `attributes` of the entries matching `filter` below `base`
    /// (or the configured default base when `None`).
    ///
    /// # Errors
    ///
    /// - `Unavailable` if no connection can be established
    /// - `MalformedQuery` if `filter` is not a well-formed filter expression
    /// - `Timeout` if the pool or the remote does not answer in time
    /// - `Remote` for errors reported by the directory itself
    async fn lookup(
        &self,
        base: Option<&str>,
        filter: &str,
        attributes: &[String],
    ) -> Result<DirectoryRecord, ProviderError>;
}

/// Transport-level connection to the directory.
#[async_trait]
pub trait DirectoryConnection: Send + 'static {
    /// # Errors
    ///
    /// Any [`ProviderError`]; the connection is discarded afterwards.
    async fn search(
        &mut self,
        base: Option<&str>,
        filter: &str,
        attributes: &[String],
    ) -> Result<DirectoryRecord, ProviderError>;

    /// Whether the connection may be handed out again.
    fn is_healthy(&self) -> bool {
        true
    }
}

/// Opens new [`DirectoryConnection`]s for the pool.
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    type Connection: DirectoryConnection;

    /// # Errors
    ///
    /// Returns [`ProviderError::Unavailable`] when the directory cannot be reached.
    async fn connect(&self) -> Result<Self::Connection, ProviderError>;
}

/// Pool settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirectoryPoolConfig {
    /// Upper bound of concurrently checked-out connections.
    pub max_connections: usize,
    /// Bounded wait for a free connection, and separately for opening a new one.
    pub checkout_timeout_ms: u64,
    /// Bounded wait for the remote to answer one search.
    pub request_timeout_ms: u64,
}

impl Default for DirectoryPoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            checkout_timeout_ms: 5_000,
            request_timeout_ms: 10_000,
        }
    }
}

/// Connection-pooling [`DirectoryProvider`].
pub struct PooledDirectoryProvider<C: DirectoryConnector> {
    connector: C,
    idle: Mutex<Vec<C::Connection>>,
    permits: Semaphore,
    checkout_timeout: Duration,
    request_timeout: Duration,
}

impl<C: DirectoryConnector> PooledDirectoryProvider<C> {
    #[must_use]
    pub fn new(connector: C, config: &DirectoryPoolConfig) -> Self {
        Self {
            connector,
            idle: Mutex::new(Vec::new()),
            permits: Semaphore::new(config.max_connections.max(1)),
            checkout_timeout: Duration::from_millis(config.checkout_timeout_ms),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
        }
    }

    /// Number of idle connections kept for reuse.
    #[must_use]
    pub fn idle_connections(&self) -> usize {
        self.idle.lock().len()
    }

    async fn checkout(&self) -> Result<C::Connection, ProviderError> {
        // Pop under a short-lived guard; never hold it across an await.
        let reused = self.idle.lock().pop();
        if let Some(conn) = reused {
            return Ok(conn);
        }
        debug!("opening new directory connection");
        self.connector.connect().await
    }

    fn give_back(&self, conn: C::Connection) {
        if conn.is_healthy() {
            self.idle.lock().push(conn);
        }
    }
}

#[async_trait]
impl<C: DirectoryConnector> DirectoryProvider for PooledDirectoryProvider<C> {
    #[tracing::instrument(skip_all, fields(filter = %filter))]
    async fn lookup(
        &self,
        base: Option<&str>,
        filter: &str,
        attributes: &[String],
    ) -> Result<DirectoryRecord, ProviderError> {
        validate_filter(filter)?;

        let _permit = tokio::time::timeout(self.checkout_timeout, self.permits.acquire())
            .await
            .map_err(|_| {
                warn!("no directory connection available in time");
                ProviderError::Timeout {
                    after_ms: millis(self.checkout_timeout),
                }
            })?
            .map_err(|_| ProviderError::Unavailable("connection pool closed".to_owned()))?;

        let mut conn = tokio::time::timeout(self.checkout_timeout, self.checkout())
            .await
            .map_err(|_| {
                warn!("directory connection not established in time");
                ProviderError::Timeout {
                    after_ms: millis(self.checkout_timeout),
                }
            })??;

        match tokio::time::timeout(self.request_timeout, conn.search(base, filter, attributes))
            .await
        {
            Ok(Ok(record)) => {
                self.give_back(conn);
                Ok(record)
            }
            // Failed or timed-out connections are dropped, not returned.
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ProviderError::Timeout {
                after_ms: millis(self.request_timeout),
            }),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Checks that `filter` is a non-empty, parenthesized, balanced filter expression.
///
/// # Errors
///
/// Returns [`ProviderError::MalformedQuery`] describing the first problem found.
pub fn validate_filter(filter: &str) -> Result<(), ProviderError> {
    let trimmed = filter.trim();
    if trimmed.is_empty() {
        return Err(ProviderError::MalformedQuery("empty filter".to_owned()));
    }
    if !trimmed.starts_with('(') || !trimmed.ends_with(')') {
        return Err(ProviderError::MalformedQuery(format!(
            "filter '{filter}' must be enclosed in parentheses"
        )));
    }

    let mut depth: usize = 0;
    for (i, c) in trimmed.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    ProviderError::MalformedQuery(format!("unbalanced ')' at offset {i}"))
                })?;
                if depth == 0 && i + 1 != trimmed.len() {
                    return Err(ProviderError::MalformedQuery(format!(
                        "trailing content after offset {i}"
                    )));
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(ProviderError::MalformedQuery("unbalanced '('".to_owned()));
    }
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeConnection {
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl DirectoryConnection for FakeConnection {
        async fn search(
            &mut self,
            _base: Option<&str>,
            _filter: &str,
            attributes: &[String],
        ) -> Result<DirectoryRecord, ProviderError> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(ProviderError::Remote("no such object".to_owned()));
            }
            Ok(attributes
                .iter()
                .map(|a| (a.clone(), BTreeSet::from([format!("{a}-value")])))
                .collect())
        }
    }

    struct FakeConnector {
        connects: Arc<AtomicUsize>,
        delay: Duration,
        fail_search: bool,
        unreachable: bool,
        hang_on_connect: bool,
    }

    impl FakeConnector {
        fn new(connects: Arc<AtomicUsize>) -> Self {
            Self {
                connects,
                delay: Duration::ZERO,
                fail_search: false,
                unreachable: false,
                hang_on_connect: false,
            }
        }
    }

    #[async_trait]
    impl DirectoryConnector for FakeConnector {
        type Connection = FakeConnection;

        async fn connect(&self) -> Result<FakeConnection, ProviderError> {
            if self.unreachable {
                return Err(ProviderError::Unavailable("connection refused".to_owned()));
            }
            if self.hang_on_connect {
                std::future::pending::<()>().await;
            }
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(FakeConnection {
                delay: self.delay,
                fail: self.fail_search,
            })
        }
    }

    fn attrs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn validate_filter_accepts_nested_expressions() {
        assert!(validate_filter("(cn=jdoe)").is_ok());
        assert!(validate_filter("(&(objectclass=person)(cn=jdoe))").is_ok());
    }

    #[test]
    fn validate_filter_rejects_malformed_expressions() {
        for bad in ["", "cn=jdoe", "(cn=jdoe", "(cn=jdoe))", "(a)(b)", ")("] {
            assert!(
                matches!(validate_filter(bad), Err(ProviderError::MalformedQuery(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn lookup_reuses_idle_connection() {
        let connects = Arc::new(AtomicUsize::new(0));
        let pool = PooledDirectoryProvider::new(
            FakeConnector::new(connects.clone()),
            &DirectoryPoolConfig::default(),
        );

        let record = pool
            .lookup(None, "(cn=jdoe)", &attrs(&["mail"]))
            .await
            .unwrap();
        assert!(record["mail"].contains("mail-value"));

        pool.lookup(None, "(cn=jdoe)", &attrs(&["mail"]))
            .await
            .unwrap();

        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert_eq!(pool.idle_connections(), 1);
    }

    #[tokio::test]
    async fn malformed_filter_fails_without_connecting() {
        let connects = Arc::new(AtomicUsize::new(0));
        let pool = PooledDirectoryProvider::new(
            FakeConnector::new(connects.clone()),
            &DirectoryPoolConfig::default(),
        );

        let err = pool.lookup(None, "cn=jdoe", &[]).await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedQuery(_)));
        assert_eq!(connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unreachable_directory_reports_unavailable() {
        let mut connector = FakeConnector::new(Arc::new(AtomicUsize::new(0)));
        connector.unreachable = true;
        let pool = PooledDirectoryProvider::new(connector, &DirectoryPoolConfig::default());

        let err = pool.lookup(None, "(cn=x)", &[]).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }

    #[tokio::test]
    async fn failed_search_discards_connection() {
        let mut connector = FakeConnector::new(Arc::new(AtomicUsize::new(0)));
        connector.fail_search = true;
        let pool = PooledDirectoryProvider::new(connector, &DirectoryPoolConfig::default());

        let err = pool.lookup(None, "(cn=x)", &[]).await.unwrap_err();
        assert!(matches!(err, ProviderError::Remote(_)));
        assert_eq!(pool.idle_connections(), 0);
    }

    #[tokio::test]
    async fn checkout_wait_is_bounded() {
        let mut connector = FakeConnector::new(Arc::new(AtomicUsize::new(0)));
        connector.delay = Duration::from_millis(300);
        let pool = Arc::new(PooledDirectoryProvider::new(
            connector,
            &DirectoryPoolConfig {
                max_connections: 1,
                checkout_timeout_ms: 20,
                request_timeout_ms: 5_000,
            },
        ));

        let busy = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.lookup(None, "(cn=a)", &[]).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = pool.lookup(None, "(cn=b)", &[]).await.unwrap_err();
        assert_eq!(err, ProviderError::Timeout { after_ms: 20 });

        assert!(busy.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn stalled_handshake_times_out() {
        let mut connector = FakeConnector::new(Arc::new(AtomicUsize::new(0)));
        connector.hang_on_connect = true;
        let pool = PooledDirectoryProvider::new(
            connector,
            &DirectoryPoolConfig {
                max_connections: 1,
                checkout_timeout_ms: 50,
                request_timeout_ms: 50,
            },
        );

        let outcome =
            tokio::time::timeout(Duration::from_secs(2), pool.lookup(None, "(cn=a)", &[])).await;
        let err = outcome.expect("lookup must give up on its own").unwrap_err();
        assert_eq!(err, ProviderError::Timeout { after_ms: 50 });

        // The permit is released; a second lookup times out the same way.
        let err = pool.lookup(None, "(cn=b)", &[]).await.unwrap_err();
        assert_eq!(err, ProviderError::Timeout { after_ms: 50 });
    }

    #[tokio::test]
    async fn slow_remote_times_out() {
        let mut connector = FakeConnector::new(Arc::new(AtomicUsize::new(0)));
        connector.delay = Duration::from_millis(200);
        let pool = PooledDirectoryProvider::new(
            connector,
            &DirectoryPoolConfig {
                request_timeout_ms: 10,
                ..DirectoryPoolConfig::default()
            },
        );

        let err = pool.lookup(None, "(cn=a)", &[]).await.unwrap_err();
        assert_eq!(err, ProviderError::Timeout { after_ms: 10 });
        assert_eq!(pool.idle_connections(), 0);
    }
}
