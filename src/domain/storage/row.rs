//! Backend-internal storage row

use crate::domain::container::{DataContainer, RawContainer};

/// One persisted entry, addressed by `serialized_key` and grouped by `related_key`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRow {
    pub serialized_key: String,
    pub related_key: String,
    pub body: Option<Vec<u8>>,
    pub attachment: Option<Vec<u8>>,
    pub saved_at_millis: Option<i64>,
    pub requested_at_millis: Option<i64>,
}

impl StorageRow {
    /// Builds the row written by a save, stamping the save time
    pub fn stamped(
        serialized_key: impl Into<String>,
        related_key: impl Into<String>,
        container: RawContainer,
        saved_at_millis: i64,
    ) -> Self {
        Self {
            serialized_key: serialized_key.into(),
            related_key: related_key.into(),
            body: container.body,
            attachment: container.attachment,
            saved_at_millis: Some(saved_at_millis),
            requested_at_millis: container.requested_at_millis,
        }
    }

    pub fn to_container(&self) -> RawContainer {
        DataContainer {
            body: self.body.clone(),
            attachment: self.attachment.clone(),
            saved_at_millis: self.saved_at_millis,
            requested_at_millis: self.requested_at_millis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamped_overrides_saved_at() {
        let container = RawContainer::new(b"Alice".to_vec())
            .with_saved_at(1)
            .with_requested_at(5);

        let row = StorageRow::stamped("u:1", "user:1", container, 99);

        assert_eq!(row.saved_at_millis, Some(99));
        assert_eq!(row.requested_at_millis, Some(5));

        let back = row.to_container();
        assert_eq!(back.body, Some(b"Alice".to_vec()));
        assert_eq!(back.saved_at_millis, Some(99));
    }
}
