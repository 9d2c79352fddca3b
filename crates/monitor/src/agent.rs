use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use faasr_store::StoreAccessor;
use faasr_types::{FunctionIdentity, FunctionStatus};
use regex::Regex;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::tailer::{spawn_tailer, TailerEvent, TailerHandle};

struct AgentState {
    status: FunctionStatus,
    logs: Vec<String>,
    logs_started: bool,
    logs_complete: bool,
    /// `None` until the tailer's final `LogComplete` scan has run; `Some`
    /// thereafter, even if empty. The invocation resolver in the monitor
    /// treats `None` as "this parent's decision is still pending".
    invocations: Option<HashSet<FunctionIdentity>>,
}

/// One per function identity: owns a tailer, derives status from its
/// events, and extracts the set of downstream identities it invoked.
pub struct FunctionAgent {
    pub identity: FunctionIdentity,
    log_key: String,
    done_key: String,
    workflow_name: String,
    invocation_pattern: Regex,
    accessor: Arc<StoreAccessor>,
    state: Mutex<AgentState>,
    tailer: Mutex<Option<TailerHandle>>,
}

impl FunctionAgent {
    pub fn new(
        identity: FunctionIdentity,
        workflow_name: String,
        log_key: String,
        done_key: String,
        accessor: Arc<StoreAccessor>,
        initial_status: FunctionStatus,
    ) -> Self {
        // Escape the workflow name: it is matched as a literal fragment, and
        // FaaSr workflow names can contain regex metacharacters.
        let pattern = format!(r"Successfully invoked:\s*{}-(\S+)", regex::escape(&workflow_name));
        Self {
            identity,
            log_key,
            done_key,
            workflow_name,
            invocation_pattern: Regex::new(&pattern).expect("invocation pattern always compiles"),
            accessor,
            state: Mutex::new(AgentState {
                status: initial_status,
                logs: Vec::new(),
                logs_started: false,
                logs_complete: false,
                invocations: None,
            }),
            tailer: Mutex::new(None),
        }
    }

    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    /// Spawn this agent's tailer and drive its events until the tailer
    /// exits. Returns once `LogComplete` has been fully processed. Intended
    /// to be run as its own `tokio::task`.
    pub async fn run(self: Arc<Self>, poll_interval: Duration, stream_logs: bool) {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<TailerEvent>();
        let stream_tx = if stream_logs {
            let (tx, mut rx) = mpsc::unbounded_channel::<String>();
            let name = self.identity.to_string();
            tokio::spawn(async move {
                while let Some(line) = rx.recv().await {
                    tracing::info!(function = %name, "{line}");
                }
            });
            Some(tx)
        } else {
            None
        };

        let (handle, join) = spawn_tailer(
            self.identity.to_string(),
            self.log_key.clone(),
            self.accessor.clone(),
            poll_interval,
            event_tx,
            stream_tx,
        );
        *self.tailer.lock().await = Some(handle);

        while let Some(event) = event_rx.recv().await {
            self.handle_event(event).await;
        }
        let _ = join_tailer(join).await;
    }

    /// Request the owned tailer to stop. A no-op if `run()` has not yet
    /// spawned it.
    pub async fn stop_tailer(&self) {
        if let Some(handle) = self.tailer.lock().await.as_ref() {
            handle.stop();
        }
    }

    async fn handle_event(&self, event: TailerEvent) {
        match event {
            TailerEvent::LogCreated => {
                let mut state = self.state.lock().await;
                state.logs_started = true;
                if matches!(state.status, FunctionStatus::Invoked | FunctionStatus::Pending) {
                    self.transition(&mut state, FunctionStatus::Running);
                }
            }
            TailerEvent::LogUpdated { entries } => {
                let mut state = self.state.lock().await;
                state.logs = entries;
                self.evaluate_terminal(&mut state).await;
            }
            TailerEvent::LogComplete { entries } => {
                let mut state = self.state.lock().await;
                state.logs = entries;
                state.logs_complete = true;
                self.evaluate_terminal(&mut state).await;
                self.extract_invocations(&mut state);
            }
        }
    }

    /// Failed/Completed evaluation, shared by `LogUpdated` and `LogComplete`
    /// (the latter re-evaluates idempotently, per the design note on
    /// double-accounting: re-running this after a prior `Failed` transition
    /// is harmless because `transition` never regresses status).
    async fn evaluate_terminal(&self, state: &mut AgentState) {
        if state.status.is_final() {
            return;
        }
        if state.logs.iter().any(|entry| entry.contains("[ERROR]")) {
            self.transition(state, FunctionStatus::Failed);
            self.stop_tailer().await;
            return;
        }
        match self.accessor.exists(&self.done_key).await {
            Ok(true) => self.transition(state, FunctionStatus::Completed),
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(function = %self.identity, error = %err, "failed to probe completion marker");
            }
        }
    }

    fn extract_invocations(&self, state: &mut AgentState) {
        let mut found = HashSet::new();
        for entry in &state.logs {
            for captures in self.invocation_pattern.captures_iter(entry) {
                let raw = &captures[1];
                found.insert(FunctionIdentity::parse(raw));
            }
        }
        state.invocations = Some(found);
    }

    fn transition(&self, state: &mut AgentState, next: FunctionStatus) {
        if state.status.can_transition_to(next) {
            state.status = next;
        }
    }

    pub async fn status(&self) -> FunctionStatus {
        self.state.lock().await.status
    }

    pub async fn set_status(&self, next: FunctionStatus) {
        let mut state = self.state.lock().await;
        self.transition(&mut state, next);
    }

    /// A snapshot copy of the identities this function has invoked, or
    /// `None` if the tailer has not yet finished its final scan.
    pub async fn invocations(&self) -> Option<HashSet<FunctionIdentity>> {
        self.state.lock().await.invocations.clone()
    }

    pub async fn logs_content(&self) -> String {
        self.state.lock().await.logs.join("\n")
    }

    pub async fn logs_started(&self) -> bool {
        self.state.lock().await.logs_started
    }

    pub async fn logs_complete(&self) -> bool {
        self.state.lock().await.logs_complete
    }
}

async fn join_tailer(join: JoinHandle<()>) -> Result<(), tokio::task::JoinError> {
    join.await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use faasr_store::{BackendError, ObjectStoreBackend, StoreAccessor};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    struct FakeBackend {
        logs: StdMutex<Option<String>>,
        done: StdMutex<bool>,
    }

    impl FakeBackend {
        fn new() -> Arc<Self> {
            Arc::new(Self { logs: StdMutex::new(None), done: StdMutex::new(false) })
        }

        fn set_logs(&self, text: &str) {
            *self.logs.lock().unwrap() = Some(text.to_string());
        }

        fn set_done(&self, done: bool) {
            *self.done.lock().unwrap() = done;
        }
    }

    #[async_trait]
    impl ObjectStoreBackend for FakeBackend {
        async fn head(&self, key: &str) -> Result<bool, BackendError> {
            if key.ends_with(".done") {
                return Ok(*self.done.lock().unwrap());
            }
            Ok(self.logs.lock().unwrap().is_some())
        }

        async fn get(&self, key: &str) -> Result<String, BackendError> {
            if key.ends_with(".done") {
                return Err(BackendError::NotFound);
            }
            self.logs.lock().unwrap().clone().ok_or(BackendError::NotFound)
        }
    }

    fn make_agent(backend: Arc<FakeBackend>, status: FunctionStatus) -> Arc<FunctionAgent> {
        let accessor = Arc::new(StoreAccessor::new(backend));
        Arc::new(FunctionAgent::new(
            FunctionIdentity::bare("f1"),
            "wf".to_string(),
            "inv/f1.txt".to_string(),
            "inv/function_completions/f1.done".to_string(),
            accessor,
            status,
        ))
    }

    #[tokio::test]
    async fn done_without_error_completes() {
        let backend = FakeBackend::new();
        backend.set_logs("[1.0] ok");
        backend.set_done(true);
        let agent = make_agent(backend, FunctionStatus::Invoked);

        let run_agent = agent.clone();
        let handle = tokio::spawn(async move { run_agent.run(Duration::from_millis(5), false).await });
        tokio::time::sleep(Duration::from_millis(60)).await;
        agent.stop_tailer().await;
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;

        assert_eq!(agent.status().await, FunctionStatus::Completed);
    }

    #[tokio::test]
    async fn error_entry_fails_regardless_of_done_marker() {
        let backend = FakeBackend::new();
        backend.set_logs("[1.0] [ERROR] boom");
        backend.set_done(true);
        let agent = make_agent(backend, FunctionStatus::Invoked);

        let run_agent = agent.clone();
        let handle = tokio::spawn(async move { run_agent.run(Duration::from_millis(5), false).await });
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;

        assert_eq!(agent.status().await, FunctionStatus::Failed);
    }

    #[tokio::test]
    async fn extracts_and_escapes_invocations() {
        let backend = FakeBackend::new();
        backend.set_logs(
            "[1.0] GitHub Action: Successfully invoked: wf.name-func2\n[2.0] Successfully invoked: wf.name-func3",
        );
        backend.set_done(true);
        let accessor = Arc::new(StoreAccessor::new(backend));
        let agent = Arc::new(FunctionAgent::new(
            FunctionIdentity::bare("f1"),
            "wf.name".to_string(),
            "inv/f1.txt".to_string(),
            "inv/function_completions/f1.done".to_string(),
            accessor,
            FunctionStatus::Invoked,
        ));

        let run_agent = agent.clone();
        let handle = tokio::spawn(async move { run_agent.run(Duration::from_millis(5), false).await });
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;

        let invocations = agent.invocations().await.unwrap();
        assert!(invocations.contains(&FunctionIdentity::bare("func2")));
        assert!(invocations.contains(&FunctionIdentity::bare("func3")));
    }
}
