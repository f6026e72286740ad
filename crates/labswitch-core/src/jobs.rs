use async_trait::async_trait;

use crate::errors::JobRunnerError;
use crate::security::AuthToken;

/// Remote automation system that executes named jobs on request.
///
/// The client owns its credentials; `authenticate` exchanges them for a token
/// that is only valid for the launches of the current command.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn authenticate(&self) -> Result<AuthToken, JobRunnerError>;

    async fn launch_job(&self, token: &AuthToken, job_id: &str) -> Result<(), JobRunnerError>;
}
