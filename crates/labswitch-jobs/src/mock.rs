use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use labswitch_core::errors::JobRunnerError;
use labswitch_core::jobs::JobRunner;
use labswitch_core::security::AuthToken;

/// Job runner with scripted outcomes that records every call, for testing
/// the orchestration without a real automation server.
pub struct MockJobRunner {
    auth_error: Option<JobRunnerError>,
    launch_error: Option<JobRunnerError>,
    auth_calls: AtomicUsize,
    launches: Mutex<Vec<String>>,
}

impl MockJobRunner {
    /// Authentication and every launch succeed.
    pub fn succeeding() -> Self {
        Self::new(None, None)
    }

    /// Authentication fails; launch is never reached.
    pub fn failing_auth() -> Self {
        Self::new(Some(JobRunnerError::Auth("status 401: bad credentials".into())), None)
    }

    /// Authentication succeeds, every launch fails.
    pub fn failing_launch() -> Self {
        Self::new(
            None,
            Some(JobRunnerError::Launch {
                job_id: "mock".into(),
                detail: "status 500: boom".into(),
            }),
        )
    }

    fn new(auth_error: Option<JobRunnerError>, launch_error: Option<JobRunnerError>) -> Self {
        Self {
            auth_error,
            launch_error,
            auth_calls: AtomicUsize::new(0),
            launches: Mutex::new(Vec::new()),
        }
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::Relaxed)
    }

    /// Job ids passed to `launch_job`, including failed attempts.
    pub fn launches(&self) -> Vec<String> {
        self.launches.lock().clone()
    }
}

#[async_trait]
impl JobRunner for MockJobRunner {
    async fn authenticate(&self) -> Result<AuthToken, JobRunnerError> {
        self.auth_calls.fetch_add(1, Ordering::Relaxed);
        match &self.auth_error {
            Some(e) => Err(e.clone()),
            None => Ok(AuthToken::new("mock-token")),
        }
    }

    async fn launch_job(&self, _token: &AuthToken, job_id: &str) -> Result<(), JobRunnerError> {
        self.launches.lock().push(job_id.to_string());
        match &self.launch_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}
