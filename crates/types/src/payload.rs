use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single entry in a workflow's `DataStores` map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataStoreConfig {
    #[serde(default, rename = "Endpoint", alias = "endpoint")]
    pub endpoint: Option<String>,
    #[serde(rename = "Bucket", alias = "bucket")]
    pub bucket: String,
    #[serde(rename = "Region", alias = "region")]
    pub region: String,
}

/// A single entry in a workflow's `ActionList` map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEntry {
    #[serde(default, rename = "InvokeNext", alias = "invoke_next")]
    pub invoke_next: InvokeNext,
    #[serde(default = "default_rank", rename = "Rank", alias = "rank")]
    pub rank: u32,
}

fn default_rank() -> u32 {
    1
}

/// `InvokeNext` may be a single name or a list of names in FaaSr payloads.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum InvokeNext {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl InvokeNext {
    pub fn as_slice(&self) -> Vec<&str> {
        match self {
            InvokeNext::None => Vec::new(),
            InvokeNext::One(name) => vec![name.as_str()],
            InvokeNext::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// The workflow payload: the read-only input describing the DAG to monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowPayload {
    #[serde(rename = "WorkflowName")]
    pub workflow_name: String,
    #[serde(rename = "FunctionInvoke")]
    pub function_invoke: String,
    #[serde(rename = "InvocationID")]
    pub invocation_id: String,
    #[serde(rename = "FaaSrLog")]
    pub faasr_log: String,
    #[serde(rename = "DefaultDataStore")]
    pub default_data_store: String,
    #[serde(rename = "DataStores")]
    pub data_stores: HashMap<String, DataStoreConfig>,
    #[serde(rename = "ActionList")]
    pub action_list: HashMap<String, ActionEntry>,
}

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("failed to read workflow payload file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed workflow payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("workflow payload has no DataStores entry named {0:?} (DefaultDataStore)")]
    MissingDefaultDataStore(String),
}

impl WorkflowPayload {
    pub fn from_json(text: &str) -> Result<Self, PayloadError> {
        let payload: WorkflowPayload = serde_json::from_str(text)?;
        payload.default_data_store_config()?;
        Ok(payload)
    }

    pub fn default_data_store_config(&self) -> Result<&DataStoreConfig, PayloadError> {
        self.data_stores
            .get(&self.default_data_store)
            .ok_or_else(|| PayloadError::MissingDefaultDataStore(self.default_data_store.clone()))
    }
}
