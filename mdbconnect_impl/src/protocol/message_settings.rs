use crate::{conn::ConnectionDescription, MdbResult};

/// The size limits a message encoder has to honor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageSettings {
    max_document_size: usize,
    max_message_size: usize,
    max_batch_count: usize,
}
impl Default for MessageSettings {
    fn default() -> Self {
        Self {
            max_document_size: ConnectionDescription::DEFAULT_MAX_DOCUMENT_SIZE,
            max_message_size: ConnectionDescription::DEFAULT_MAX_MESSAGE_SIZE,
            max_batch_count: ConnectionDescription::DEFAULT_MAX_BATCH_COUNT,
        }
    }
}
impl MessageSettings {
    /// Constructor.
    ///
    /// # Errors
    ///
    /// `MdbError::Usage` if one of the limits is zero.
    pub fn try_new(
        max_document_size: usize,
        max_message_size: usize,
        max_batch_count: usize,
    ) -> MdbResult<Self> {
        if max_document_size == 0 || max_message_size == 0 || max_batch_count == 0 {
            return Err(usage_err!(
                "message limits must be positive (document size: {max_document_size}, \
                 message size: {max_message_size}, batch count: {max_batch_count})"
            ));
        }
        Ok(Self {
            max_document_size,
            max_message_size,
            max_batch_count,
        })
    }

    /// Maximal size of a single document.
    pub fn max_document_size(&self) -> usize {
        self.max_document_size
    }
    /// Maximal size of a message.
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }
    /// Maximal number of items in a batch.
    pub fn max_batch_count(&self) -> usize {
        self.max_batch_count
    }
}
impl From<&ConnectionDescription> for MessageSettings {
    fn from(description: &ConnectionDescription) -> Self {
        Self {
            max_document_size: description.max_document_size().max(1),
            max_message_size: description.max_message_size().max(1),
            max_batch_count: description.max_batch_count().max(1),
        }
    }
}
