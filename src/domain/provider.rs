//! Provider traits - authoritative sources behind the cache

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::DomainError;
use crate::domain::container::{DataContainer, RawContainer};
use crate::domain::key::DataKey;
use crate::domain::serializer::SerializerRegistry;

#[cfg(test)]
use mockall::automock;

/// Fetches a fresh container for a key, one round trip per call
///
/// Providers neither cache nor retry; failures surface as `DomainError::Upstream`.
#[async_trait]
pub trait Provider<T, A>: Send + Sync
where
    T: Send + 'static,
    A: Send + 'static,
{
    async fn request(&self, key: &DataKey<T, A>) -> Result<DataContainer<T, A>, DomainError>;
}

/// Byte-level source addressed only by the serialized key
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RawProvider: Send + Sync {
    async fn request_by_serialized_key(
        &self,
        serialized_key: &str,
    ) -> Result<RawContainer, DomainError>;
}

/// Adapts a [`RawProvider`] into a typed [`Provider`] by decoding through the serializer chain
pub struct SerializingProvider<P> {
    name: String,
    inner: P,
    serializers: Arc<SerializerRegistry>,
}

impl<P> SerializingProvider<P>
where
    P: RawProvider,
{
    pub fn new(name: impl Into<String>, inner: P, serializers: Arc<SerializerRegistry>) -> Self {
        Self {
            name: name.into(),
            inner,
            serializers,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<P> std::fmt::Debug for SerializingProvider<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializingProvider")
            .field("name", &self.name)
            .field("serializers", &self.serializers)
            .finish()
    }
}

#[async_trait]
impl<T, A, P> Provider<T, A> for SerializingProvider<P>
where
    T: Any + Send + Sync,
    A: Any + Send + Sync,
    P: RawProvider,
{
    async fn request(&self, key: &DataKey<T, A>) -> Result<DataContainer<T, A>, DomainError> {
        let raw = self
            .inner
            .request_by_serialized_key(key.serialized_key())
            .await?;

        self.serializers
            .decode_container(key, &raw)
            .map_err(|e| match e {
                DomainError::Serialization { message } => DomainError::upstream(
                    self.name.clone(),
                    format!("Undecodable payload for '{}': {}", key.serialized_key(), message),
                ),
                other => other,
            })
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Mock provider for testing
    #[derive(Debug)]
    pub struct MockProvider<T, A> {
        name: &'static str,
        response: Mutex<Option<DataContainer<T, A>>>,
        error: Mutex<Option<String>>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl<T, A> MockProvider<T, A> {
        pub fn new(name: &'static str) -> Self {
            Self {
                name,
                response: Mutex::new(None),
                error: Mutex::new(None),
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn with_response(self, response: DataContainer<T, A>) -> Self {
            *self.response.lock().unwrap() = Some(response);
            self
        }

        pub fn with_error(self, error: impl Into<String>) -> Self {
            *self.error.lock().unwrap() = Some(error.into());
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn set_response(&self, response: DataContainer<T, A>) {
            *self.response.lock().unwrap() = Some(response);
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl<T, A> Provider<T, A> for MockProvider<T, A>
    where
        T: Clone + Send + Sync + 'static,
        A: Clone + Send + Sync + 'static,
    {
        async fn request(
            &self,
            _key: &DataKey<T, A>,
        ) -> Result<DataContainer<T, A>, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            if let Some(error) = self.error.lock().unwrap().clone() {
                return Err(DomainError::upstream(self.name, error));
            }

            self.response
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| DomainError::upstream(self.name, "No mock response configured"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::serializer::default_registry;

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct User {
        id: u64,
        name: String,
    }

    #[tokio::test]
    async fn test_serializing_provider_decodes_body_and_attachment() {
        let serializers = Arc::new(default_registry());
        let key: DataKey<User, String> = DataKey::new("u:1", "user:1").unwrap();
        let payload = serializers
            .encode_container(
                &key,
                &DataContainer::new(User {
                    id: 1,
                    name: "Alice".to_string(),
                })
                .with_attachment("etag-1".to_string()),
            )
            .unwrap();

        let mut raw = MockRawProvider::new();
        raw.expect_request_by_serialized_key()
            .withf(|key| key == "u:1")
            .times(1)
            .returning(move |_| Ok(payload.clone()));

        let provider = SerializingProvider::new("users-api", raw, serializers);
        let container = provider.request(&key).await.unwrap();

        assert_eq!(container.body.unwrap().name, "Alice");
        assert_eq!(container.attachment.as_deref(), Some("etag-1"));
    }

    #[tokio::test]
    async fn test_serializing_provider_reports_garbage_as_upstream() {
        let serializers = Arc::new(default_registry());
        let key: DataKey<User, String> = DataKey::new("u:1", "user:1").unwrap();

        let mut raw = MockRawProvider::new();
        raw.expect_request_by_serialized_key()
            .returning(|_| Ok(RawContainer::new(b"not a checksummed payload".to_vec())));

        let provider = SerializingProvider::new("users-api", raw, serializers);
        let result = provider.request(&key).await;

        assert!(matches!(result, Err(DomainError::Upstream { .. })));
    }

    #[tokio::test]
    async fn test_serializing_provider_passes_upstream_errors_through() {
        let serializers = Arc::new(default_registry());
        let key: DataKey<User, String> = DataKey::new("u:1", "user:1").unwrap();

        let mut raw = MockRawProvider::new();
        raw.expect_request_by_serialized_key()
            .returning(|_| Err(DomainError::upstream("users-api", "503")));

        let provider = SerializingProvider::new("users-api", raw, serializers);
        let error = provider.request(&key).await.unwrap_err();

        assert_eq!(error.to_string(), "Upstream error: users-api - 503");
    }

    #[tokio::test]
    async fn test_mock_provider_counts_calls() {
        let provider: mock::MockProvider<String, String> =
            mock::MockProvider::new("test").with_response(DataContainer::new("x".to_string()));
        let key: DataKey<String, String> = DataKey::new("k", "r").unwrap();

        provider.request(&key).await.unwrap();
        provider.request(&key).await.unwrap();

        assert_eq!(provider.call_count(), 2);
    }
}
