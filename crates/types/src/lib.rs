//! Shared data model for the FaaSr workflow monitor: the workflow payload,
//! the derived invocation graph, function identities, and function status.

pub mod graph;
pub mod identity;
pub mod keys;
pub mod payload;
pub mod status;

pub use graph::WorkflowGraph;
pub use identity::FunctionIdentity;
pub use payload::{ActionEntry, DataStoreConfig, InvokeNext, PayloadError, WorkflowPayload};
pub use status::FunctionStatus;
