pub mod awx;
pub mod mock;

pub use awx::{AwxClient, AwxConfig};
pub use mock::MockJobRunner;
