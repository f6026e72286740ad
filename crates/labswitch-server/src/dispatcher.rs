//! Command dispatch: authorize the chat and sender, route to the workflow,
//! deliver replies.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use labswitch_core::chat::{ChatTransport, InboundMessage};
use labswitch_core::ids::ChatId;
use labswitch_engine::{RegistryError, Workflow};

const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(3);

/// Commands the bot answers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    Start,
    Stop,
    CheckIn,
    CheckOut,
    Status,
    Clear,
}

impl Command {
    /// Parse `/name`, `/name@BotName`, with or without trailing arguments.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?.strip_prefix('/')?;
        let name = word.split('@').next().unwrap_or(word);
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            "checkin" => Some(Self::CheckIn),
            "checkout" => Some(Self::CheckOut),
            "status" => Some(Self::Status),
            "clear" => Some(Self::Clear),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::CheckIn => "checkin",
            Self::CheckOut => "checkout",
            Self::Status => "status",
            Self::Clear => "clear",
        }
    }
}

/// Why an inbound message was not executed.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("message from unauthorized chat {chat_id}")]
    Unauthorized { chat_id: ChatId },
    #[error("sender {sender_id} has no username")]
    IdentityMissing { sender_id: i64 },
}

pub struct Dispatcher {
    transport: Arc<dyn ChatTransport>,
    workflow: Arc<Workflow>,
    authorized_chat: ChatId,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn ChatTransport>, workflow: Arc<Workflow>, authorized_chat: ChatId) -> Self {
        Self {
            transport,
            workflow,
            authorized_chat,
        }
    }

    /// The sender's username, if the message may be executed at all.
    pub fn authorize<'m>(&self, msg: &'m InboundMessage) -> Result<&'m str, DispatchError> {
        if msg.chat_id != self.authorized_chat {
            return Err(DispatchError::Unauthorized { chat_id: msg.chat_id });
        }
        msg.sender
            .handle()
            .ok_or(DispatchError::IdentityMissing { sender_id: msg.sender.id })
    }

    /// Handle one inbound message. Only fatal registry errors are returned.
    pub async fn handle(&self, msg: &InboundMessage) -> Result<(), RegistryError> {
        if msg.chat_id != self.authorized_chat {
            error!(chat_id = %msg.chat_id, sender_id = msg.sender.id, "unauthorized chat, leaving");
            if let Err(e) = self.transport.leave(msg.chat_id).await {
                warn!(chat_id = %msg.chat_id, error = %e, "failed to leave chat");
            }
            return Ok(());
        }

        let Some(command) = Command::parse(&msg.text) else {
            debug!(sender_id = msg.sender.id, "ignoring non-command message");
            return Ok(());
        };

        let username = match self.authorize(msg) {
            Ok(username) => username,
            Err(e) => {
                warn!(command = command.as_str(), error = %e, "rejecting command");
                self.reply(msg.chat_id, self.workflow.replies().missing_username).await;
                return Ok(());
            }
        };

        info!(username, command = command.as_str(), "executing command");
        let replies = self.execute(command, username).await?;
        for text in &replies {
            self.reply(msg.chat_id, text).await;
        }
        Ok(())
    }

    async fn execute(&self, command: Command, username: &str) -> Result<Vec<String>, RegistryError> {
        match command {
            Command::Start => self.workflow.start(username).await,
            Command::Stop => self.workflow.stop(username).await,
            Command::CheckIn => self.workflow.check_in(username),
            Command::CheckOut => self.workflow.check_out(username),
            Command::Status => self.workflow.status(),
            Command::Clear => self.workflow.clear(username),
        }
    }

    async fn reply(&self, chat_id: ChatId, text: &str) {
        if let Err(e) = self.transport.send(chat_id, text).await {
            warn!(chat_id = %chat_id, error = %e, "failed to send reply");
        }
    }

    /// Long-poll and handle messages sequentially until `shutdown` fires.
    ///
    /// Returns `Err` only for a fatal registry error, after which the process
    /// must not keep serving commands.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), RegistryError> {
        info!(chat_id = %self.authorized_chat, "dispatcher started");
        loop {
            let batch = tokio::select! {
                _ = shutdown.cancelled() => break,
                batch = self.transport.next_batch() => batch,
            };

            match batch {
                Ok(messages) => {
                    for msg in &messages {
                        if let Err(e) = self.handle(msg).await {
                            error!(error = %e, "fatal registry error, stopping dispatcher");
                            return Err(e);
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "polling failed, backing off");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                    }
                }
            }
        }
        info!("dispatcher stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use labswitch_core::chat::Sender;
    use labswitch_core::errors::ChatError;
    use labswitch_engine::replies::PT_BR;
    use labswitch_engine::{SessionRegistry, WorkflowConfig};
    use labswitch_jobs::MockJobRunner;
    use labswitch_store::{InMemoryRegistryStore, RegistryStore, SessionRecord};

    use super::*;

    const CHAT: ChatId = ChatId(-100);

    /// Replays scripted poll results, then cancels `done` once drained.
    struct RecordingTransport {
        batches: Mutex<VecDeque<Result<Vec<InboundMessage>, ChatError>>>,
        sent: Mutex<Vec<(ChatId, String)>>,
        left: Mutex<Vec<ChatId>>,
        done: CancellationToken,
    }

    impl RecordingTransport {
        fn new(batches: Vec<Result<Vec<InboundMessage>, ChatError>>, done: CancellationToken) -> Self {
            Self {
                batches: Mutex::new(batches.into()),
                sent: Mutex::new(Vec::new()),
                left: Mutex::new(Vec::new()),
                done,
            }
        }

        fn texts(&self) -> Vec<String> {
            self.sent.lock().iter().map(|(_, t)| t.clone()).collect()
        }
    }

    #[async_trait]
    impl ChatTransport for RecordingTransport {
        async fn next_batch(&self) -> Result<Vec<InboundMessage>, ChatError> {
            let next = self.batches.lock().pop_front();
            match next {
                Some(batch) => batch,
                None => {
                    self.done.cancel();
                    std::future::pending().await
                }
            }
        }

        async fn send(&self, chat_id: ChatId, text: &str) -> Result<(), ChatError> {
            self.sent.lock().push((chat_id, text.to_string()));
            Ok(())
        }

        async fn leave(&self, chat_id: ChatId) -> Result<(), ChatError> {
            self.left.lock().push(chat_id);
            Ok(())
        }
    }

    struct Harness {
        dispatcher: Dispatcher,
        transport: Arc<RecordingTransport>,
        store: Arc<InMemoryRegistryStore>,
        jobs: Arc<MockJobRunner>,
        shutdown: CancellationToken,
    }

    fn harness(batches: Vec<Result<Vec<InboundMessage>, ChatError>>) -> Harness {
        harness_with_store(batches, InMemoryRegistryStore::new())
    }

    fn harness_with_store(
        batches: Vec<Result<Vec<InboundMessage>, ChatError>>,
        store: InMemoryRegistryStore,
    ) -> Harness {
        let shutdown = CancellationToken::new();
        let transport = Arc::new(RecordingTransport::new(batches, shutdown.clone()));
        let store = Arc::new(store);
        let jobs = Arc::new(MockJobRunner::succeeding());
        let workflow = Workflow::new(
            SessionRegistry::new(store.clone()),
            jobs.clone(),
            WorkflowConfig {
                start_job: "10".into(),
                stop_job: "11".into(),
            },
            &PT_BR,
        );
        Harness {
            dispatcher: Dispatcher::new(transport.clone(), Arc::new(workflow), CHAT),
            transport,
            store,
            jobs,
            shutdown,
        }
    }

    fn msg(chat_id: ChatId, username: Option<&str>, text: &str) -> InboundMessage {
        InboundMessage {
            chat_id,
            sender: Sender {
                id: 7,
                username: username.map(str::to_string),
            },
            text: text.to_string(),
        }
    }

    #[test]
    fn parse_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("  /stop now"), Some(Command::Stop));
        assert_eq!(Command::parse("/checkin@LabSwitchBot"), Some(Command::CheckIn));
        assert_eq!(Command::parse("/CheckOut"), Some(Command::CheckOut));
        assert_eq!(Command::parse("/status"), Some(Command::Status));
        assert_eq!(Command::parse("/clear"), Some(Command::Clear));
        assert_eq!(Command::parse("start"), None);
        assert_eq!(Command::parse("/reboot"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn authorize_checks_chat_then_identity() {
        let h = harness(vec![]);
        assert_eq!(h.dispatcher.authorize(&msg(CHAT, Some("alice"), "/start")), Ok("alice"));
        assert_eq!(
            h.dispatcher.authorize(&msg(ChatId(5), Some("alice"), "/start")),
            Err(DispatchError::Unauthorized { chat_id: ChatId(5) })
        );
        assert_eq!(
            h.dispatcher.authorize(&msg(CHAT, Some(""), "/start")),
            Err(DispatchError::IdentityMissing { sender_id: 7 })
        );
    }

    #[tokio::test]
    async fn unauthorized_chat_is_left_without_side_effects() {
        let h = harness(vec![]);
        h.dispatcher.handle(&msg(ChatId(5), Some("mallory"), "/start")).await.unwrap();

        assert_eq!(*h.transport.left.lock(), vec![ChatId(5)]);
        assert!(h.transport.sent.lock().is_empty());
        assert!(h.store.snapshot().is_empty());
        assert_eq!(h.jobs.auth_calls(), 0);
    }

    #[tokio::test]
    async fn missing_username_is_refused() {
        let h = harness(vec![]);
        h.dispatcher.handle(&msg(CHAT, None, "/checkin")).await.unwrap();

        assert_eq!(h.transport.texts(), vec![PT_BR.missing_username]);
        assert!(h.store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn plain_text_is_ignored() {
        let h = harness(vec![]);
        h.dispatcher.handle(&msg(CHAT, None, "bom dia")).await.unwrap();
        assert!(h.transport.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn replies_go_to_the_authorized_chat_in_order() {
        let h = harness(vec![]);
        h.dispatcher.handle(&msg(CHAT, Some("alice"), "/start")).await.unwrap();

        let sent = h.transport.sent.lock().clone();
        assert_eq!(
            sent,
            vec![
                (CHAT, PT_BR.checked_in.to_string()),
                (CHAT, PT_BR.starting.to_string()),
            ]
        );
        assert_eq!(h.jobs.launches(), vec!["10"]);
    }

    #[tokio::test]
    async fn run_processes_batches_until_drained() {
        let h = harness(vec![
            Ok(vec![
                msg(CHAT, Some("alice"), "/checkin"),
                msg(CHAT, Some("bob"), "/checkin"),
            ]),
            Err(ChatError::Network("connection reset".into())),
            Ok(vec![msg(CHAT, Some("alice"), "/status")]),
        ]);
        tokio::time::pause();

        h.dispatcher.run(h.shutdown.clone()).await.unwrap();

        assert_eq!(
            h.transport.texts(),
            vec![
                PT_BR.checked_in.to_string(),
                PT_BR.checked_in.to_string(),
                "Registros Ativos: \n- @alice\n- @bob".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn run_stops_on_consistency_violation() {
        let store = InMemoryRegistryStore::without_unique_active();
        store.insert(&SessionRecord::check_in("alice")).unwrap();
        store.insert(&SessionRecord::check_in("alice")).unwrap();
        let h = harness_with_store(
            vec![Ok(vec![
                msg(CHAT, Some("alice"), "/checkout"),
                msg(CHAT, Some("bob"), "/checkin"),
            ])],
            store,
        );

        let err = h.dispatcher.run(h.shutdown.clone()).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(h.transport.sent.lock().is_empty());
        assert_eq!(h.store.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn run_returns_when_cancelled() {
        let h = harness(vec![]);
        h.shutdown.cancel();
        h.dispatcher.run(h.shutdown.clone()).await.unwrap();
    }
}
