use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use faasr_store::{ObjectStoreBackend, StoreAccessor};
use faasr_types::{FunctionIdentity, FunctionStatus, PayloadError, WorkflowGraph, WorkflowPayload};
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;

use crate::agent::FunctionAgent;
use crate::tailer::DEFAULT_POLL_INTERVAL;

/// Environment variables the monitor requires before it will start. Mirrors
/// the credential surface the object-store driver and the FaaS platform
/// integration both need, even though the monitor itself only checks for
/// their presence.
pub const REQUIRED_ENV_VARS: &[&str] =
    &["S3_AccessKey", "S3_SecretKey", "GH_PAT", "GITHUB_REPOSITORY", "GITHUB_REF_NAME"];

/// Default inactivity budget: how long the monitor waits for any status
/// change before declaring a timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default interval between monitoring ticks.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum InitializationError {
    #[error("missing required environment variables: {0}")]
    MissingEnvVars(String),
    #[error("malformed workflow payload: {0}")]
    MalformedPayload(#[from] PayloadError),
    #[error("failed to construct object store accessor: {0}")]
    StoreInit(String),
}

fn validate_env_vars() -> Result<(), InitializationError> {
    let missing: Vec<&str> = REQUIRED_ENV_VARS
        .iter()
        .copied()
        .filter(|name| std::env::var(name).is_err())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(InitializationError::MissingEnvVars(missing.join(", ")))
    }
}

/// Tunables for a monitor run. `poll_interval` is the tailer's Δ; all
/// tailers share the same value.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub check_interval: Duration,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub stream_logs: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            stream_logs: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FinishReason {
    AllCompleted,
    FailureCascade,
    Timeout,
    ExternalShutdown,
}

struct MonitorState {
    prev_statuses: HashMap<FunctionIdentity, FunctionStatus>,
    shutdown_requested: bool,
    failure_detected: bool,
    last_change: Instant,
}

struct MonitorInner {
    agents: HashMap<FunctionIdentity, Arc<FunctionAgent>>,
    graph: WorkflowGraph,
    check_interval: Duration,
    timeout: Duration,
    poll_interval: Duration,
    state: Mutex<MonitorState>,
    wake: Notify,
    complete_tx: watch::Sender<bool>,
}

/// A cheap-to-clone front for a running monitor: the actual state lives
/// behind `Arc<MonitorInner>`, the monitoring tick runs on its own
/// `tokio::task`, and every agent runs its own tailer-driving task.
#[derive(Clone)]
pub struct WorkflowMonitorHandle {
    inner: Arc<MonitorInner>,
    monitor_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl WorkflowMonitorHandle {
    /// Validate the environment, build the invocation graph, instantiate one
    /// agent per function identity, and start every tailer plus the
    /// monitoring tick. Returns once everything is running.
    pub async fn start(
        payload: &WorkflowPayload,
        backend: Arc<dyn ObjectStoreBackend>,
        config: MonitorConfig,
    ) -> Result<Self, InitializationError> {
        validate_env_vars()?;

        let accessor = Arc::new(StoreAccessor::new(backend));
        let graph = WorkflowGraph::build(payload);
        let invocation_folder = format!("{}/{}", payload.faasr_log, payload.invocation_id);

        let mut agents = HashMap::new();
        for identity in graph.all_identities() {
            let log_key = faasr_types::keys::log_key(&invocation_folder, &identity);
            let done_key = faasr_types::keys::done_key(&invocation_folder, &identity);
            let initial_status = if identity == graph.entry_point {
                FunctionStatus::Invoked
            } else {
                FunctionStatus::Pending
            };
            let agent = Arc::new(FunctionAgent::new(
                identity.clone(),
                payload.workflow_name.clone(),
                log_key,
                done_key,
                accessor.clone(),
                initial_status,
            ));
            agents.insert(identity, agent);
        }

        let mut agent_joins = Vec::with_capacity(agents.len());
        for agent in agents.values() {
            let agent = agent.clone();
            let poll_interval = config.poll_interval;
            let stream_logs = config.stream_logs;
            agent_joins.push(tokio::spawn(async move {
                agent.run(poll_interval, stream_logs).await;
            }));
        }

        let mut prev_statuses = HashMap::with_capacity(agents.len());
        for (identity, agent) in &agents {
            prev_statuses.insert(identity.clone(), agent.status().await);
        }

        let (complete_tx, _) = watch::channel(false);
        let inner = Arc::new(MonitorInner {
            agents,
            graph,
            check_interval: config.check_interval,
            timeout: config.timeout,
            poll_interval: config.poll_interval,
            state: Mutex::new(MonitorState {
                prev_statuses,
                shutdown_requested: false,
                failure_detected: false,
                last_change: Instant::now(),
            }),
            wake: Notify::new(),
            complete_tx,
        });

        let task_inner = inner.clone();
        let monitor_join = tokio::spawn(async move { run_monitor_task(task_inner, agent_joins).await });

        Ok(Self { inner, monitor_task: Arc::new(Mutex::new(Some(monitor_join))) })
    }

    /// Snapshot of every function identity's current status.
    pub async fn get_function_statuses(&self) -> HashMap<FunctionIdentity, FunctionStatus> {
        let mut out = HashMap::with_capacity(self.inner.agents.len());
        for (identity, agent) in &self.inner.agents {
            out.insert(identity.clone(), agent.status().await);
        }
        out
    }

    /// The concatenated log text observed for a function, or `None` if no
    /// such identity exists in this workflow.
    pub async fn get_function_logs_content(&self, identity: &FunctionIdentity) -> Option<String> {
        match self.inner.agents.get(identity) {
            Some(agent) => Some(agent.logs_content().await),
            None => None,
        }
    }

    pub async fn is_complete(&self) -> bool {
        *self.inner.complete_tx.subscribe().borrow()
    }

    /// Resolves once monitoring has finished for any reason (all completed,
    /// failure cascade, timeout, or shutdown). Does not itself request
    /// shutdown -- pair with `shutdown()`/`force_shutdown()` for that.
    pub async fn wait_until_complete(&self) {
        let mut rx = self.inner.complete_tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Request graceful shutdown: every non-final agent becomes `Skipped`,
    /// tailers are asked to stop, and their tasks are drained. Returns
    /// whether monitoring finished within `wait`.
    pub async fn shutdown(&self, wait: Duration) -> bool {
        {
            let mut state = self.inner.state.lock().await;
            state.shutdown_requested = true;
        }
        self.inner.wake.notify_waiters();
        tokio::time::timeout(wait, self.wait_until_complete()).await.is_ok()
    }

    /// Mark monitoring complete immediately, without waiting for tailers to
    /// drain. Best-effort stop requests are still sent.
    pub async fn force_shutdown(&self) {
        {
            let mut state = self.inner.state.lock().await;
            state.shutdown_requested = true;
        }
        for agent in self.inner.agents.values() {
            agent.stop_tailer().await;
        }
        let _ = self.inner.complete_tx.send(true);
    }

    /// Graceful shutdown bounded by one check interval plus one poll
    /// interval; falls back to `force_shutdown` if that elapses first.
    pub async fn cleanup(&self) {
        let wait = self.inner.check_interval + self.inner.poll_interval + Duration::from_millis(500);
        if !self.shutdown(wait).await {
            self.force_shutdown().await;
        }
    }
}

async fn run_monitor_task(inner: Arc<MonitorInner>, mut agent_joins: Vec<JoinHandle<()>>) {
    let mut ticker = tokio::time::interval(inner.check_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let reason = loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = inner.wake.notified() => {}
        }
        if let Some(reason) = run_tick(&inner).await {
            break reason;
        }
    };

    apply_finish(&inner, reason).await;

    let drain_timeout = inner.check_interval + inner.poll_interval + Duration::from_millis(200);
    for join in agent_joins.drain(..) {
        let _ = tokio::time::timeout(drain_timeout, join).await;
    }

    let _ = inner.complete_tx.send(true);
}

async fn run_tick(inner: &MonitorInner) -> Option<FinishReason> {
    for (identity, agent) in &inner.agents {
        if agent.status().await == FunctionStatus::Pending {
            if let Some(resolved) = resolve_pending(identity, &inner.graph, &inner.agents).await {
                agent.set_status(resolved).await;
            }
        }
    }

    let mut current = HashMap::with_capacity(inner.agents.len());
    for (identity, agent) in &inner.agents {
        current.insert(identity.clone(), agent.status().await);
    }

    let mut state = inner.state.lock().await;
    let changed = current
        .iter()
        .any(|(id, status)| state.prev_statuses.get(id) != Some(status));
    if changed {
        for (id, status) in &current {
            if state.prev_statuses.get(id) != Some(status) {
                tracing::info!(function = %id, status = ?status, "status transition");
            }
        }
        state.last_change = Instant::now();
    }
    state.prev_statuses = current.clone();

    if state.shutdown_requested {
        return Some(FinishReason::ExternalShutdown);
    }

    if current.values().all(|s| s.is_final()) {
        return Some(FinishReason::AllCompleted);
    }

    let any_failed = current.values().any(|s| *s == FunctionStatus::Failed);
    if any_failed && !state.failure_detected {
        state.failure_detected = true;
        tracing::warn!("failure detected, awaiting tailer drain before cascade");
    } else if state.failure_detected {
        let mut drained = true;
        for (identity, agent) in &inner.agents {
            let status = current[identity];
            let active = agent.logs_started().await && !agent.logs_complete().await;
            if !status.is_final() && active {
                drained = false;
                break;
            }
        }
        if drained {
            return Some(FinishReason::FailureCascade);
        }
    } else if state.last_change.elapsed() > inner.timeout {
        return Some(FinishReason::Timeout);
    }

    None
}

/// Resolves a `Pending` agent's status from its parents' invocation sets.
/// Returns `None` when the decision is still undetermined.
async fn resolve_pending(
    identity: &FunctionIdentity,
    graph: &WorkflowGraph,
    agents: &HashMap<FunctionIdentity, Arc<FunctionAgent>>,
) -> Option<FunctionStatus> {
    let Some(parents) = graph.reverse_adj.get(identity) else {
        return Some(FunctionStatus::NotInvoked);
    };

    let mut any_pending = false;
    for parent in parents {
        let Some(agent) = agents.get(parent) else { continue };
        // A failed parent never gets to resolve its children to NotInvoked:
        // whether it would have invoked this child is moot, and the child
        // must stay eligible for the failure cascade rather than settling
        // into a final state ahead of it.
        if agent.status().await == FunctionStatus::Failed {
            any_pending = true;
            continue;
        }
        match agent.invocations().await {
            None => any_pending = true,
            Some(invoked) if invoked.contains(identity) => return Some(FunctionStatus::Invoked),
            Some(_) => {}
        }
    }

    if any_pending {
        None
    } else {
        Some(FunctionStatus::NotInvoked)
    }
}

async fn apply_finish(inner: &MonitorInner, reason: FinishReason) {
    match reason {
        FinishReason::AllCompleted => {}
        FinishReason::FailureCascade | FinishReason::ExternalShutdown => {
            cascade(&inner.agents, FunctionStatus::Skipped).await;
        }
        FinishReason::Timeout => cascade(&inner.agents, FunctionStatus::Timeout).await,
    }
    for agent in inner.agents.values() {
        agent.stop_tailer().await;
    }
}

async fn cascade(agents: &HashMap<FunctionIdentity, Arc<FunctionAgent>>, target: FunctionStatus) {
    for agent in agents.values() {
        if !agent.status().await.is_final() {
            agent.set_status(target).await;
        }
    }
}
