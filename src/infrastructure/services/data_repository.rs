//! Read-through caching repository over a storage backend and a provider

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::domain::DomainError;
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::container::DataContainer;
use crate::domain::freshness::FreshnessPolicy;
use crate::domain::key::DataKey;
use crate::domain::provider::Provider;
use crate::domain::serializer::SerializerRegistry;
use crate::domain::storage::Storage;

/// Behaviour switches for [`DataRepository`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Return the stale cached value when the provider fails
    pub serve_stale_on_error: bool,
    /// Collapse concurrent requests for the same key into one provider call
    pub single_flight: bool,
}

impl RepositoryConfig {
    pub fn with_serve_stale_on_error(mut self) -> Self {
        self.serve_stale_on_error = true;
        self
    }

    pub fn with_single_flight(mut self) -> Self {
        self.single_flight = true;
        self
    }
}

/// Stages a single `get` moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    CheckCache,
    HitFresh,
    MissOrStale,
    Fetching,
    Saving,
    Done,
    Failed,
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestState::CheckCache => "check_cache",
            RequestState::HitFresh => "hit_fresh",
            RequestState::MissOrStale => "miss_or_stale",
            RequestState::Fetching => "fetching",
            RequestState::Saving => "saving",
            RequestState::Done => "done",
            RequestState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Where a returned container came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalSource {
    /// Fresh cached value, the provider was not called
    Cache,
    /// Fetched from the provider and persisted
    Provider,
    /// Stale cached value served because the provider failed
    StaleCache,
}

/// A container together with its origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retrieval<T, A> {
    pub container: DataContainer<T, A>,
    pub source: RetrievalSource,
}

type FlightLock = Arc<tokio::sync::Mutex<()>>;

/// Caching repository
///
/// `get` serves a fresh cached container when the freshness policy allows it, and otherwise
/// fetches from the provider and saves the result before returning it. Provider failures
/// never write to storage.
pub struct DataRepository<T, A> {
    storage: Arc<dyn Storage>,
    provider: Arc<dyn Provider<T, A>>,
    serializers: Arc<SerializerRegistry>,
    policy: Arc<dyn FreshnessPolicy>,
    clock: Arc<dyn Clock>,
    config: RepositoryConfig,
    in_flight: Mutex<HashMap<String, FlightLock>>,
}

impl<T, A> fmt::Debug for DataRepository<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataRepository")
            .field("storage", &self.storage.backend_name())
            .field("serializers", &self.serializers)
            .field("config", &self.config)
            .finish()
    }
}

impl<T, A> DataRepository<T, A>
where
    T: Send + 'static,
    A: Send + 'static,
{
    pub fn new(
        storage: Arc<dyn Storage>,
        provider: Arc<dyn Provider<T, A>>,
        serializers: Arc<SerializerRegistry>,
        policy: Arc<dyn FreshnessPolicy>,
    ) -> Self {
        Self {
            storage,
            provider,
            serializers,
            policy,
            clock: Arc::new(SystemClock),
            config: RepositoryConfig::default(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_config(mut self, config: RepositoryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Returns the cached container if fresh, otherwise fetches, saves and returns it
    pub async fn get(&self, key: &DataKey<T, A>) -> Result<DataContainer<T, A>, DomainError> {
        Ok(self.get_detailed(key).await?.container)
    }

    /// Like [`get`](Self::get), also reporting where the container came from
    pub async fn get_detailed(&self, key: &DataKey<T, A>) -> Result<Retrieval<T, A>, DomainError> {
        if !self.config.single_flight {
            return self.resolve(key).await;
        }

        let flight = self.join_flight(key.serialized_key())?;
        let _held = flight.lock.lock().await;
        self.resolve(key).await
    }

    /// Cache-only read: never calls the provider, a miss is an empty container
    pub async fn cached(&self, key: &DataKey<T, A>) -> Result<DataContainer<T, A>, DomainError> {
        self.read_cache(key).await
    }

    /// Removes every row sharing `related_key`, returning how many were removed
    pub async fn invalidate(&self, related_key: &str) -> Result<u64, DomainError> {
        let removed = self
            .storage
            .remove_relatives_by_related_key(related_key)
            .await?;

        debug!(related_key, removed, "Invalidated related rows");
        Ok(removed)
    }

    /// Removes the row for one key
    pub async fn remove(&self, key: &DataKey<T, A>) -> Result<u64, DomainError> {
        self.storage
            .remove_by_serialized_key(key.serialized_key())
            .await
    }

    async fn resolve(&self, key: &DataKey<T, A>) -> Result<Retrieval<T, A>, DomainError> {
        let serialized_key = key.serialized_key();

        debug!(serialized_key, state = %RequestState::CheckCache, "Repository request");
        let cached = self.read_cache(key).await?;
        let now = self.clock.now_millis();

        if cached.body.is_some() && self.policy.is_fresh(cached.saved_at_millis, now) {
            debug!(serialized_key, state = %RequestState::HitFresh, "Repository request");
            debug!(serialized_key, state = %RequestState::Done, "Repository request");
            return Ok(Retrieval {
                container: cached,
                source: RetrievalSource::Cache,
            });
        }

        debug!(serialized_key, state = %RequestState::MissOrStale, "Repository request");
        debug!(serialized_key, state = %RequestState::Fetching, "Repository request");

        let mut fetched = match self.provider.request(key).await {
            Ok(fetched) => fetched,
            Err(e) => {
                debug!(
                    serialized_key,
                    state = %RequestState::Failed,
                    error = %e,
                    "Repository request"
                );

                if self.config.serve_stale_on_error && cached.body.is_some() {
                    warn!(
                        serialized_key,
                        error = %e,
                        "Provider failed, serving stale cached value"
                    );
                    return Ok(Retrieval {
                        container: cached,
                        source: RetrievalSource::StaleCache,
                    });
                }

                return Err(e);
            }
        };

        fetched.requested_at_millis = Some(now);

        debug!(serialized_key, state = %RequestState::Saving, "Repository request");
        let raw = self.serializers.encode_container(key, &fetched)?;
        let saved = self
            .storage
            .save_by_serialized_key(serialized_key, key.related_key(), raw)
            .await?;
        fetched.saved_at_millis = saved.saved_at_millis;

        debug!(serialized_key, state = %RequestState::Done, "Repository request");
        Ok(Retrieval {
            container: fetched,
            source: RetrievalSource::Provider,
        })
    }

    async fn read_cache(&self, key: &DataKey<T, A>) -> Result<DataContainer<T, A>, DomainError> {
        let raw = self
            .storage
            .get_by_serialized_key(key.serialized_key())
            .await?;

        match self.serializers.decode_container(key, &raw) {
            Ok(container) => Ok(container),
            Err(DomainError::Serialization { message }) => {
                warn!(
                    serialized_key = key.serialized_key(),
                    error = %message,
                    "Cached payload could not be decoded, treating as a miss"
                );
                Ok(DataContainer::empty())
            }
            Err(e) => Err(e),
        }
    }

    fn join_flight(&self, serialized_key: &str) -> Result<Flight<'_>, DomainError> {
        let mut in_flight = self
            .in_flight
            .lock()
            .map_err(|e| DomainError::internal(format!("In-flight map poisoned: {}", e)))?;

        let lock = in_flight
            .entry(serialized_key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();

        Ok(Flight {
            in_flight: &self.in_flight,
            serialized_key: serialized_key.to_string(),
            lock,
        })
    }
}

/// Membership in a key's flight; leaving runs on drop, so cancelled callers clean up too
struct Flight<'a> {
    in_flight: &'a Mutex<HashMap<String, FlightLock>>,
    serialized_key: String,
    lock: FlightLock,
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        let mut in_flight = match self.in_flight.lock() {
            Ok(in_flight) => in_flight,
            Err(poisoned) => poisoned.into_inner(),
        };

        // Only the map and this caller hold it, so nobody is waiting
        if Arc::strong_count(&self.lock) == 2 {
            in_flight.remove(&self.serialized_key);
        }
    }
}
