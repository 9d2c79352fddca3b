//! The workflow monitor: per-function log tailers (§4.2), the agents that
//! derive status from them (§4.3), and the monitor that drives the global
//! state machine over the whole workflow (§4.4).

pub mod agent;
pub mod monitor;
pub mod tailer;

pub use agent::FunctionAgent;
pub use monitor::{
    InitializationError, MonitorConfig, WorkflowMonitorHandle, DEFAULT_CHECK_INTERVAL,
    DEFAULT_TIMEOUT, REQUIRED_ENV_VARS,
};
pub use tailer::{TailerEvent, TailerHandle, DEFAULT_POLL_INTERVAL};
