/// Errors from calls into the VCS service.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-2xx status code.
    #[error("VCS API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The service refused the operation (duplicate key, unknown entity).
    #[error("Rejected by VCS service: {0}")]
    Rejected(String),
}

pub type VcsResult<T> = Result<T, VcsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display() {
        let err = VcsError::Api {
            status: 409,
            body: "duplicate".into(),
        };
        assert_eq!(err.to_string(), "VCS API error (409): duplicate");
    }

    #[test]
    fn rejected_display() {
        let err = VcsError::Rejected("project LOAD-abcd0 exists".into());
        assert!(err.to_string().contains("LOAD-abcd0"));
    }
}
