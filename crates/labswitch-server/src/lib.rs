//! Outer surfaces of the lab switch: the chat command dispatcher, the
//! Telegram Bot API transport, the health endpoint, and shutdown plumbing.

#![deny(unsafe_code)]

pub mod dispatcher;
pub mod health;
pub mod shutdown;
pub mod telegram;

pub use dispatcher::{Command, DispatchError, Dispatcher};
pub use health::HealthServer;
pub use shutdown::ShutdownCoordinator;
pub use telegram::{TelegramConfig, TelegramTransport};
