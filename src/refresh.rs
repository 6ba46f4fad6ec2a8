//! Refreshable credentials.
//!
//! A [`RefreshableCredentials`] holds the current credential generation
//! behind an `Arc` that is swapped as a whole, so a snapshot can never mix
//! fields from two refreshes. Refreshes are serialized by a single async
//! mutex:
//!
//! - inside the **mandatory** window the caller waits for the lock and a
//!   failed refresh is returned to it;
//! - inside only the **advisory** window the caller tries the lock, and on
//!   contention or failure keeps serving the current, still valid, snapshot.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use futures::future::BoxFuture;
use tokio::sync::Mutex;

use crate::credential::{CredentialMetadata, ReadOnlyCredentials};
use crate::{Error, Result};

pub type RefreshFuture = BoxFuture<'static, Result<CredentialMetadata>>;

/// Produces a fresh credential generation.
pub type RefreshFn = Arc<dyn Fn() -> RefreshFuture + Send + Sync>;

/// Clock used for expiry checks.
pub type TimeFetcher = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Wrap an async closure as a [`RefreshFn`].
pub fn refresh_fn<F, Fut>(f: F) -> RefreshFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<CredentialMetadata>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

pub const DEFAULT_ADVISORY_REFRESH: Duration = Duration::minutes(15);
pub const DEFAULT_MANDATORY_REFRESH: Duration = Duration::minutes(10);

/// How long before expiry each kind of refresh kicks in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshThresholds {
    pub advisory: Duration,
    pub mandatory: Duration,
}

impl RefreshThresholds {
    pub fn new(advisory: Duration, mandatory: Duration) -> Self {
        Self {
            advisory,
            mandatory,
        }
    }
}

impl Default for RefreshThresholds {
    fn default() -> Self {
        Self::new(DEFAULT_ADVISORY_REFRESH, DEFAULT_MANDATORY_REFRESH)
    }
}

struct Generation {
    frozen: ReadOnlyCredentials,
    expiry_time: DateTime<Utc>,
}

/// Credentials that refresh themselves before they expire.
pub struct RefreshableCredentials {
    // `None` until the first fetch of a deferred instance.
    current: RwLock<Option<Arc<Generation>>>,
    refresh_lock: Mutex<()>,
    refresh_using: RefreshFn,
    method: String,
    time_fetcher: TimeFetcher,
    thresholds: RefreshThresholds,
    refresh_count: AtomicU64,
}

impl RefreshableCredentials {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        token: Option<String>,
        expiry_time: DateTime<Utc>,
        refresh_using: RefreshFn,
        method: impl Into<String>,
    ) -> Self {
        let generation = Generation {
            frozen: ReadOnlyCredentials::new(access_key, secret_key, token),
            expiry_time,
        };
        Self::with_generation(Some(generation), refresh_using, method.into())
    }

    /// Build from the output of a refresh function.
    pub fn from_metadata(
        metadata: CredentialMetadata,
        refresh_using: RefreshFn,
        method: impl Into<String>,
    ) -> Result<Self> {
        let method = method.into();
        let generation = Generation {
            expiry_time: metadata.expiry(&method)?,
            frozen: metadata.frozen(),
        };
        Ok(Self::with_generation(Some(generation), refresh_using, method))
    }

    /// Credentials whose first fetch happens on first access.
    ///
    /// The initial fetch runs exactly once even if many tasks race to read.
    pub fn deferred(refresh_using: RefreshFn, method: impl Into<String>) -> Self {
        Self::with_generation(None, refresh_using, method.into())
    }

    fn with_generation(
        generation: Option<Generation>,
        refresh_using: RefreshFn,
        method: String,
    ) -> Self {
        Self {
            current: RwLock::new(generation.map(Arc::new)),
            refresh_lock: Mutex::new(()),
            refresh_using,
            method,
            time_fetcher: Arc::new(Utc::now),
            thresholds: RefreshThresholds::default(),
            refresh_count: AtomicU64::new(0),
        }
    }

    pub fn with_time_fetcher(mut self, time_fetcher: TimeFetcher) -> Self {
        self.time_fetcher = time_fetcher;
        self
    }

    pub fn with_thresholds(mut self, thresholds: RefreshThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn thresholds(&self) -> RefreshThresholds {
        self.thresholds
    }

    /// Expiry of the current generation, if one has been fetched.
    pub fn expiry_time(&self) -> Option<DateTime<Utc>> {
        self.generation().map(|g| g.expiry_time)
    }

    /// Number of successful refreshes so far.
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::SeqCst)
    }

    /// True if `now >= expiry - threshold`, or nothing has been fetched yet.
    pub fn refresh_needed(&self, threshold: Duration) -> bool {
        match self.generation() {
            Some(generation) => self.generation_needs_refresh(&generation, threshold),
            None => true,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.refresh_needed(Duration::zero())
    }

    /// Get a consistent snapshot, refreshing first if needed.
    pub async fn get_frozen_credentials(&self) -> Result<ReadOnlyCredentials> {
        self.refresh_if_needed().await?;
        self.generation()
            .map(|g| g.frozen.clone())
            .ok_or_else(|| Error::retrieval(&self.method, "credentials were never loaded"))
    }

    async fn refresh_if_needed(&self) -> Result<()> {
        let Some(current) = self.generation() else {
            let _guard = self.refresh_lock.lock().await;
            if self.generation().is_none() {
                self.protected_refresh(true).await?;
            }
            return Ok(());
        };

        if !self.generation_needs_refresh(&current, self.thresholds.advisory) {
            return Ok(());
        }

        if self.generation_needs_refresh(&current, self.thresholds.mandatory) {
            let _guard = self.refresh_lock.lock().await;
            if self.refresh_needed(self.thresholds.mandatory) {
                self.protected_refresh(true).await?;
            }
        } else if let Ok(_guard) = self.refresh_lock.try_lock()
            && self.refresh_needed(self.thresholds.advisory)
        {
            self.protected_refresh(false).await?;
        }
        Ok(())
    }

    // Caller must hold `refresh_lock`.
    async fn protected_refresh(&self, is_mandatory: bool) -> Result<()> {
        let refreshed = (self.refresh_using)().await.and_then(|metadata| {
            let expiry_time = metadata.expiry(&self.method)?;
            Ok(Generation {
                frozen: metadata.frozen(),
                expiry_time,
            })
        });

        let generation = match refreshed {
            Ok(generation) => generation,
            Err(e) if !is_mandatory => {
                tracing::warn!(
                    method = %self.method,
                    error = %e,
                    "Refreshing temporary credentials failed during advisory refresh period"
                );
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(
                    method = %self.method,
                    error = %e,
                    "Refreshing temporary credentials failed during mandatory refresh period"
                );
                return Err(e);
            }
        };

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(generation));
        self.refresh_count.fetch_add(1, Ordering::SeqCst);

        if self.is_expired() {
            return Err(Error::retrieval(
                &self.method,
                "Credentials were refreshed, but the refreshed credentials are still expired.",
            ));
        }
        tracing::debug!(method = %self.method, "Refreshed temporary credentials");
        Ok(())
    }

    fn generation(&self) -> Option<Arc<Generation>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn generation_needs_refresh(&self, generation: &Generation, threshold: Duration) -> bool {
        (self.time_fetcher)() >= generation.expiry_time - threshold
    }
}

impl fmt::Debug for RefreshableCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshableCredentials")
            .field("method", &self.method)
            .field("expiry_time", &self.expiry_time())
            .field("thresholds", &self.thresholds)
            .field("refresh_count", &self.refresh_count())
            .finish()
    }
}
