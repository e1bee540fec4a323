//! Client error types

use std::time::Duration;

use muxqueue::{CorrelationId, QueueError};
use thiserror::Error;

/// Errors surfaced by the dispatcher, waiter and client facade
///
/// A result that legitimately never arrived is not an error: it is returned
/// as `Ok(None)`.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("Unknown correlation id: {0}")]
    UnknownIdentifier(CorrelationId),

    #[error("Queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error("No result for {id} after {after:?}")]
    Timeout { id: CorrelationId, after: Duration },

    #[error("Queue error: {0}")]
    Queue(QueueError),
}

impl From<QueueError> for ClientError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Unavailable(reason) => ClientError::QueueUnavailable(reason),
            QueueError::UnknownIdentifier(id) => ClientError::UnknownIdentifier(id),
            other => ClientError::Queue(other),
        }
    }
}

impl ClientError {
    /// True for input problems the caller must fix before retrying
    pub fn is_malformed(&self) -> bool {
        matches!(self, ClientError::MalformedEvent(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_errors_map_to_client_errors() {
        let id = CorrelationId::generate();

        assert!(matches!(
            ClientError::from(QueueError::Unavailable("closed".to_string())),
            ClientError::QueueUnavailable(_)
        ));
        assert!(matches!(
            ClientError::from(QueueError::UnknownIdentifier(id)),
            ClientError::UnknownIdentifier(got) if got == id
        ));
        assert!(matches!(
            ClientError::from(QueueError::Full { capacity: 4 }),
            ClientError::Queue(QueueError::Full { capacity: 4 })
        ));
    }

    #[test]
    fn test_timeout_message() {
        let err = ClientError::Timeout {
            id: CorrelationId::generate(),
            after: Duration::from_secs(30),
        };
        assert!(err.to_string().contains("30s"));
    }
}
