use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use faasr_store::StoreAccessor;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

/// Default polling interval (Δ in the spec).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Lifecycle events a tailer emits to its subscriber (the owning agent).
#[derive(Debug, Clone)]
pub enum TailerEvent {
    /// Emitted once, when the log object is first observed to exist.
    LogCreated,
    /// Emitted after a refetch whose parsed entries differ from the
    /// previous snapshot. Carries the full current entry list.
    LogUpdated { entries: Vec<String> },
    /// Emitted once, just before the tailer's poll loop exits. Carries the
    /// final entry list.
    LogComplete { entries: Vec<String> },
}

struct TailerShared {
    stop_requested: AtomicBool,
    notify: Notify,
}

/// A cheaply-cloneable handle to a running tailer: calling `stop()` requests
/// a graceful exit, observed at the next tick boundary (or immediately if
/// the loop is currently sleeping), so shutdown latency is bounded by
/// `interval` plus any in-flight store call.
#[derive(Clone)]
pub struct TailerHandle {
    shared: Arc<TailerShared>,
}

impl TailerHandle {
    pub fn stop(&self) {
        self.shared.stop_requested.store(true, Ordering::SeqCst);
        self.shared.notify.notify_waiters();
    }
}

/// Spawn a tailer polling `log_key` every `interval`, emitting events on
/// `event_tx`. `stream_tx`, when set, receives each newly observed entry as
/// it is discovered (the `stream_logs` flag from the spec). Returns a
/// `TailerHandle` for shutdown plus the task's `JoinHandle`.
pub fn spawn_tailer(
    function_name: String,
    log_key: String,
    accessor: Arc<StoreAccessor>,
    interval: Duration,
    event_tx: mpsc::UnboundedSender<TailerEvent>,
    stream_tx: Option<mpsc::UnboundedSender<String>>,
) -> (TailerHandle, JoinHandle<()>) {
    let shared = Arc::new(TailerShared {
        stop_requested: AtomicBool::new(false),
        notify: Notify::new(),
    });
    let loop_shared = shared.clone();
    let join = tokio::spawn(async move {
        run_loop(loop_shared, function_name, log_key, accessor, interval, event_tx, stream_tx).await;
    });
    (TailerHandle { shared }, join)
}

async fn run_loop(
    shared: Arc<TailerShared>,
    function_name: String,
    log_key: String,
    accessor: Arc<StoreAccessor>,
    interval: Duration,
    event_tx: mpsc::UnboundedSender<TailerEvent>,
    stream_tx: Option<mpsc::UnboundedSender<String>>,
) {
    let mut logs: Vec<String> = Vec::new();
    let mut logs_started = false;

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick fires immediately; the loop below issues its own
    // first poll before ever waiting on the ticker.
    ticker.tick().await;

    while !shared.stop_requested.load(Ordering::SeqCst) {
        if !logs_started {
            match accessor.exists(&log_key).await {
                Ok(true) => {
                    logs_started = true;
                    let _ = event_tx.send(TailerEvent::LogCreated);
                    match accessor.get(&log_key).await {
                        Ok(text) => {
                            logs = parse_entries(&text);
                            if !logs.is_empty() {
                                let _ = event_tx.send(TailerEvent::LogUpdated { entries: logs.clone() });
                            }
                        }
                        Err(err) => {
                            tracing::warn!(function = %function_name, error = %err, "failed to fetch newly created log");
                        }
                    }
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(function = %function_name, error = %err, "failed to probe log existence");
                }
            }
        } else {
            match accessor.get(&log_key).await {
                Ok(text) => {
                    let new_logs = parse_entries(&text);
                    if entries_changed(&logs, &new_logs) {
                        if let Some(tx) = &stream_tx {
                            for entry in new_logs.iter().skip(logs.len()) {
                                let _ = tx.send(entry.clone());
                            }
                        }
                        logs = new_logs;
                        let _ = event_tx.send(TailerEvent::LogUpdated { entries: logs.clone() });
                    }
                }
                Err(err) => {
                    tracing::warn!(function = %function_name, error = %err, "failed to refetch log, will retry next tick");
                }
            }
        }

        if shared.stop_requested.load(Ordering::SeqCst) {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {}
            _ = shared.notify.notified() => {}
        }
    }

    let _ = event_tx.send(TailerEvent::LogComplete { entries: logs });
}

fn entries_changed(prev: &[String], next: &[String]) -> bool {
    prev.len() != next.len() || prev.last() != next.last()
}

/// Split log text into entries: each line matching `^[<float>]` starts a new
/// entry; subsequent lines belong to it until the next such line or EOF.
/// Empty input yields an empty sequence.
pub fn parse_entries(text: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        if is_entry_header(line) {
            if let Some(entry) = current.take() {
                entries.push(entry);
            }
            current = Some(line.to_string());
        } else if let Some(entry) = current.as_mut() {
            entry.push('\n');
            entry.push_str(line);
        }
        // Lines before the first header (malformed/prefix noise) are dropped.
    }
    if let Some(entry) = current.take() {
        entries.push(entry);
    }
    entries
}

fn is_entry_header(line: &str) -> bool {
    let Some(rest) = line.strip_prefix('[') else { return false };
    let Some(close) = rest.find(']') else { return false };
    let inner = &rest[..close];
    !inner.is_empty() && inner.chars().all(|c| c.is_ascii_digit() || c == '.')
        && inner.matches('.').count() <= 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_entries() {
        assert_eq!(parse_entries(""), Vec::<String>::new());
    }

    #[test]
    fn groups_continuation_lines() {
        let text = "[1.0] a\n[2.0] b\nb'";
        let entries = parse_entries(text);
        assert_eq!(entries, vec!["[1.0] a".to_string(), "[2.0] b\nb'".to_string()]);
    }

    #[test]
    fn recognizes_integer_and_float_timestamps() {
        let text = "[1] start\n[2.5] [ERROR] boom";
        let entries = parse_entries(text);
        assert_eq!(entries.len(), 2);
        assert!(entries[1].contains("[ERROR]"));
    }

    #[test]
    fn detects_change_by_length_or_last_entry() {
        let a = vec!["[1.0] x".to_string()];
        let b = vec!["[1.0] x".to_string(), "[2.0] y".to_string()];
        assert!(entries_changed(&a, &b));
        assert!(!entries_changed(&a, &a.clone()));
        let c = vec!["[1.0] x changed".to_string()];
        assert!(entries_changed(&a, &c));
    }
}
