#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Malformed {operation} payload: {reason}")]
    MalformedPayload {
        operation: &'static str,
        reason: String,
    },

    #[error("Unsupported payload version {found} (supported: 1..={supported})")]
    UnsupportedPayloadVersion { found: i64, supported: i64 },
}
