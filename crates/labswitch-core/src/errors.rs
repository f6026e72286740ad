use std::time::Duration;

/// Failures talking to the remote job runner.
///
/// Every variant is terminal for the command that triggered the call; nothing
/// in the command path retries.
#[derive(Clone, Debug, thiserror::Error)]
pub enum JobRunnerError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("launch of job {job_id} failed: {detail}")]
    Launch { job_id: String, detail: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl JobRunnerError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::Launch { .. } => "launch",
            Self::Network(_) => "network",
            Self::Timeout(_) => "timeout",
            Self::InvalidResponse(_) => "invalid_response",
        }
    }
}

/// Failures of the chat transport (polling, sending, leaving).
#[derive(Clone, Debug, thiserror::Error)]
pub enum ChatError {
    #[error("network error: {0}")]
    Network(String),
    #[error("api error {code}: {description}")]
    Api { code: u16, description: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("transport closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_runner_error_kinds() {
        assert_eq!(JobRunnerError::Auth("bad".into()).error_kind(), "auth");
        assert_eq!(
            JobRunnerError::Launch { job_id: "7".into(), detail: "500".into() }.error_kind(),
            "launch"
        );
        assert_eq!(JobRunnerError::Timeout(Duration::from_secs(3)).error_kind(), "timeout");
    }

    #[test]
    fn launch_error_mentions_job() {
        let err = JobRunnerError::Launch { job_id: "42".into(), detail: "status 404".into() };
        assert_eq!(err.to_string(), "launch of job 42 failed: status 404");
    }

    #[test]
    fn chat_api_error_display() {
        let err = ChatError::Api { code: 403, description: "bot was kicked".into() };
        assert_eq!(err.to_string(), "api error 403: bot was kicked");
    }
}
