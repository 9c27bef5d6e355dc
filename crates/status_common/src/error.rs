//! Error types for the status aggregator.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatusError {
    /// Network failure, timeout or non-2xx answer
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// Response arrived but its structure was not recognised
    #[error("source returned unrecognised content: {0}")]
    SourceUnparseable(String),

    #[error("model tier disabled: no model credential configured")]
    ModelConfigMissing,

    #[error("model response malformed: {0}")]
    ModelResponseMalformed(String),

    #[error("scheduler already running (job {0})")]
    SchedulerAlreadyRunning(u64),

    #[error("webhook delivery failed: {0}")]
    WebhookDeliveryFailed(String),

    #[error("service '{0}' is not in the catalogue")]
    ServiceNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl StatusError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StatusError::SourceUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_failures_are_retryable() {
        assert!(StatusError::SourceUnavailable("timeout".into()).is_retryable());
        assert!(!StatusError::SourceUnparseable("captcha".into()).is_retryable());
        assert!(!StatusError::ModelConfigMissing.is_retryable());
    }

    #[test]
    fn missing_credential_message_is_explicit() {
        let msg = StatusError::ModelConfigMissing.to_string();
        assert!(msg.contains("no model credential"));
    }
}
