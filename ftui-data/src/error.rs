use std::time::Duration;
use thiserror::Error;

/// All errors produced while fetching from a remote bot.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum FetchError {
    #[error("connectivity failure: {0}")]
    Connectivity(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream responded with HTTP {status}: {url}")]
    Status { status: u16, url: String },

    #[error("upstream rejected credentials")]
    Unauthorized,

    #[error("malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },
}

/// Coarse classification of a [`FetchError`], stored alongside cached snapshots.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, derive_more::Display)]
pub enum ErrorKind {
    #[display("connectivity")]
    Connectivity,
    #[display("unauthorized")]
    Unauthorized,
    #[display("malformed response")]
    MalformedResponse,
}

impl ErrorKind {
    /// Rank used when several failing keys of one source are summarised as a single kind.
    pub fn severity(self) -> u8 {
        match self {
            ErrorKind::Connectivity => 1,
            ErrorKind::MalformedResponse => 2,
            ErrorKind::Unauthorized => 3,
        }
    }
}

impl FetchError {
    pub fn malformed(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedResponse {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Connectivity(_) | FetchError::Timeout(_) | FetchError::Status { .. } => {
                ErrorKind::Connectivity
            }
            FetchError::Unauthorized => ErrorKind::Unauthorized,
            FetchError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
        }
    }

    /// Determine if an error will keep recurring until the operator intervenes, so views
    /// should show a persistent warning rather than a transient staleness marker.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_persistent(&self) -> bool {
        match self {
            FetchError::Unauthorized => true,
            _ => false,
        }
    }
}

/// Reasons a configured server is excluded from the active source set at startup.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum RegistrationError {
    #[error("invalid server address {0}")]
    InvalidAddress(String),

    #[error("initial connectivity check failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("duplicate source name {0}")]
    DuplicateName(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            let endpoint = error
                .url()
                .map(|url| url.path().to_string())
                .unwrap_or_default();
            return FetchError::malformed(endpoint, &error);
        }

        match error.status() {
            Some(status) if status == reqwest::StatusCode::UNAUTHORIZED => FetchError::Unauthorized,
            Some(status) => FetchError::Status {
                status: status.as_u16(),
                url: error.url().map(ToString::to_string).unwrap_or_default(),
            },
            None => FetchError::Connectivity(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_kind() {
        struct TestCase {
            input: FetchError,
            expected: ErrorKind,
        }

        let tests = vec![
            TestCase {
                // TC0: connection refused is a connectivity failure
                input: FetchError::Connectivity("connection refused".to_string()),
                expected: ErrorKind::Connectivity,
            },
            TestCase {
                // TC1: timeout is a connectivity failure
                input: FetchError::Timeout(Duration::from_secs(10)),
                expected: ErrorKind::Connectivity,
            },
            TestCase {
                // TC2: non-401 HTTP status is a connectivity failure
                input: FetchError::Status {
                    status: 502,
                    url: "http://127.0.0.1:8080/api/v1/status".to_string(),
                },
                expected: ErrorKind::Connectivity,
            },
            TestCase {
                // TC3: unauthorized is distinct
                input: FetchError::Unauthorized,
                expected: ErrorKind::Unauthorized,
            },
            TestCase {
                // TC4: malformed is distinct
                input: FetchError::malformed("/api/v1/trades", "missing field `trades`"),
                expected: ErrorKind::MalformedResponse,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.kind();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_fetch_error_is_persistent() {
        struct TestCase {
            input: FetchError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: unauthorized persists until credentials change
                input: FetchError::Unauthorized,
                expected: true,
            },
            TestCase {
                // TC1: timeout is transient
                input: FetchError::Timeout(Duration::from_millis(500)),
                expected: false,
            },
            TestCase {
                // TC2: malformed response is retried like connectivity
                input: FetchError::malformed("/api/v1/profit", "expected f64"),
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.is_persistent();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }
}
