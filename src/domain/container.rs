//! Value envelope moved between storage, provider and callers

/// Cached or fetched value with its freshness timestamps
///
/// A missing `body` means "no cached value", whatever the attachment holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataContainer<T, A> {
    pub body: Option<T>,
    pub attachment: Option<A>,
    /// Stamped by storage when the container is persisted
    pub saved_at_millis: Option<i64>,
    /// Stamped by the repository when the upstream fetch was requested
    pub requested_at_millis: Option<i64>,
}

/// Byte-level container, the only form storage backends see
pub type RawContainer = DataContainer<Vec<u8>, Vec<u8>>;

impl<T, A> Default for DataContainer<T, A> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T, A> DataContainer<T, A> {
    /// The container returned on a cache miss
    pub fn empty() -> Self {
        Self {
            body: None,
            attachment: None,
            saved_at_millis: None,
            requested_at_millis: None,
        }
    }

    pub fn new(body: T) -> Self {
        Self {
            body: Some(body),
            ..Self::empty()
        }
    }

    pub fn with_attachment(mut self, attachment: A) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn with_saved_at(mut self, millis: i64) -> Self {
        self.saved_at_millis = Some(millis);
        self
    }

    pub fn with_requested_at(mut self, millis: i64) -> Self {
        self.requested_at_millis = Some(millis);
        self
    }

    pub fn is_miss(&self) -> bool {
        self.body.is_none()
    }

    /// True when every field is absent
    pub fn is_empty(&self) -> bool {
        self.body.is_none()
            && self.attachment.is_none()
            && self.saved_at_millis.is_none()
            && self.requested_at_millis.is_none()
    }
}
