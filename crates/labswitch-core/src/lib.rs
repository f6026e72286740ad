pub mod chat;
pub mod errors;
pub mod ids;
pub mod jobs;
pub mod locale;
pub mod security;

pub use chat::{ChatTransport, InboundMessage, Sender};
pub use errors::{ChatError, JobRunnerError};
pub use jobs::JobRunner;
pub use locale::Locale;
