use std::sync::Arc;

use tracing::{error, info, warn};

use labswitch_core::errors::JobRunnerError;
use labswitch_core::jobs::JobRunner;

use crate::registry::{RegistryError, SessionRegistry};
use crate::replies::Replies;

/// Job template ids launched by the power commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowConfig {
    pub start_job: String,
    pub stop_job: String,
}

/// Command logic for the lab.
///
/// Every command returns the replies to send, in order. Recoverable failures
/// become replies; `Err` is reserved for fatal registry errors, which must stop
/// command processing.
///
/// Power state is inferred from the registry: no active sessions means the
/// lab may be switched off. Job runner failures never roll back registry
/// changes already made by the same command, so the registry and the lab can
/// drift apart; `/clear` is the manual reconciliation.
pub struct Workflow {
    registry: SessionRegistry,
    jobs: Arc<dyn JobRunner>,
    config: WorkflowConfig,
    replies: &'static Replies,
}

impl Workflow {
    pub fn new(
        registry: SessionRegistry,
        jobs: Arc<dyn JobRunner>,
        config: WorkflowConfig,
        replies: &'static Replies,
    ) -> Self {
        Self { registry, jobs, config, replies }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn replies(&self) -> &'static Replies {
        self.replies
    }

    pub fn check_in(&self, username: &str) -> Result<Vec<String>, RegistryError> {
        Ok(vec![self.check_in_reply(username)?])
    }

    pub fn check_out(&self, username: &str) -> Result<Vec<String>, RegistryError> {
        let reply = match self.registry.check_out(username) {
            Ok(()) => self.replies.checked_out.to_string(),
            Err(e) => self.recover(e)?,
        };
        Ok(vec![reply])
    }

    pub fn status(&self) -> Result<Vec<String>, RegistryError> {
        let reply = match self.registry.list_active() {
            Ok(active) => self.replies.status(&active),
            Err(e) => self.recover(e)?,
        };
        Ok(vec![reply])
    }

    /// Administrative clear: closes every active record without per-user checks.
    pub fn clear(&self, username: &str) -> Result<Vec<String>, RegistryError> {
        let reply = match self.registry.clear_all() {
            Ok(cleared) => {
                warn!(username, cleared, "administrative clear executed");
                self.replies.cleared.to_string()
            }
            Err(e) => self.recover(e)?,
        };
        Ok(vec![reply])
    }

    pub async fn start(&self, username: &str) -> Result<Vec<String>, RegistryError> {
        let active = match self.registry.list_active() {
            Ok(active) => active,
            Err(e) => return Ok(vec![self.recover(e)?]),
        };
        if !active.is_empty() {
            info!(username, active = active.len(), "start refused, lab already in use");
            return Ok(vec![
                self.replies.already_on.to_string(),
                self.replies.status(&active),
            ]);
        }

        if let Err(e) = self.run_job(&self.config.start_job).await {
            error!(username, job_id = %self.config.start_job, kind = e.error_kind(), error = %e, "start job failed");
            return Ok(vec![self.replies.command_failed.to_string()]);
        }

        // The caller is now a user of the lab they just powered on.
        Ok(vec![
            self.check_in_reply(username)?,
            self.replies.starting.to_string(),
        ])
    }

    pub async fn stop(&self, username: &str) -> Result<Vec<String>, RegistryError> {
        let mut replies = Vec::new();

        // Release the caller first so a sole user's /stop always frees their
        // own session, even if the power-off job fails afterwards.
        match self.registry.check_out(username) {
            Ok(()) => replies.push(self.replies.checked_out.to_string()),
            Err(RegistryError::NoActiveSession { .. }) => {
                replies.push(self.replies.no_active_check_in.to_string())
            }
            Err(e) => {
                replies.push(self.recover(e)?);
                return Ok(replies);
            }
        }

        let active = match self.registry.list_active() {
            Ok(active) => active,
            Err(e) => {
                replies.push(self.recover(e)?);
                return Ok(replies);
            }
        };
        if !active.is_empty() {
            info!(username, active = active.len(), "stop refused, lab still in use");
            replies.push(self.replies.still_in_use.to_string());
            replies.push(self.replies.status(&active));
            return Ok(replies);
        }

        if let Err(e) = self.run_job(&self.config.stop_job).await {
            error!(username, job_id = %self.config.stop_job, kind = e.error_kind(), error = %e, "stop job failed");
            replies.push(self.replies.command_failed.to_string());
            return Ok(replies);
        }

        replies.push(self.replies.stopping.to_string());
        Ok(replies)
    }

    fn check_in_reply(&self, username: &str) -> Result<String, RegistryError> {
        match self.registry.check_in(username) {
            Ok(_) => Ok(self.replies.checked_in.to_string()),
            Err(e) => self.recover(e),
        }
    }

    /// Authenticate, then launch. No retries and no compensation.
    async fn run_job(&self, job_id: &str) -> Result<(), JobRunnerError> {
        let token = self.jobs.authenticate().await?;
        self.jobs.launch_job(&token, job_id).await?;
        info!(job_id, "job launched");
        Ok(())
    }

    /// Turn a recoverable registry error into its reply; pass fatal ones through.
    fn recover(&self, err: RegistryError) -> Result<String, RegistryError> {
        match err {
            RegistryError::AlreadyActive { ref username } => {
                warn!(username = %username, "check-in refused, already active");
                Ok(self.replies.already_checked_in.to_string())
            }
            RegistryError::NoActiveSession { ref username } => {
                warn!(username = %username, "check-out refused, no active session");
                Ok(self.replies.no_active_check_in.to_string())
            }
            RegistryError::Store(ref e) => {
                error!(error = %e, "registry store failure");
                Ok(self.replies.command_failed.to_string())
            }
            RegistryError::ConsistencyViolation { .. } => Err(err),
        }
    }
}
