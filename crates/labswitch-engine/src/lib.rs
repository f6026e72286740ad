//! Session registry and power orchestration for the shared lab.
//!
//! The registry decides whether a user may check in or out; the workflow
//! composes registry state with job runner calls to decide whether the lab
//! may be powered on or off.

pub mod registry;
pub mod replies;
pub mod workflow;

pub use registry::{RegistryError, SessionRegistry};
pub use replies::Replies;
pub use workflow::{Workflow, WorkflowConfig};
