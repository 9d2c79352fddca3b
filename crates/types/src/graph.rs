use std::collections::{HashMap, HashSet};

use crate::identity::FunctionIdentity;
use crate::payload::WorkflowPayload;

/// The derived forward/reverse adjacency and replica counts for a workflow,
/// expanded over ranks so that every identity used downstream is already a
/// concrete `name` or `name(k)` -- never re-parsed after this point (see
/// the design note on rank expansion).
#[derive(Debug, Clone, Default)]
pub struct WorkflowGraph {
    pub adj: HashMap<FunctionIdentity, HashSet<FunctionIdentity>>,
    pub reverse_adj: HashMap<FunctionIdentity, HashSet<FunctionIdentity>>,
    pub ranks: HashMap<String, u32>,
    pub entry_point: FunctionIdentity,
}

impl WorkflowGraph {
    /// Every identity that appears in the workflow, either as a rank-1 bare
    /// name or as one of `name(1)..name(K)` for a ranked action.
    pub fn all_identities(&self) -> Vec<FunctionIdentity> {
        let mut seen: HashSet<FunctionIdentity> = HashSet::new();
        for (name, &rank) in &self.ranks {
            if rank <= 1 {
                seen.insert(FunctionIdentity::bare(name));
            } else {
                for k in 1..=rank {
                    seen.insert(FunctionIdentity::replica(name, k));
                }
            }
        }
        // Entry point is always present even if it has no ActionList entry
        // of its own beyond being referenced as FunctionInvoke.
        seen.insert(self.entry_point.clone());
        let mut all: Vec<_> = seen.into_iter().collect();
        all.sort();
        all
    }

    pub fn build(payload: &WorkflowPayload) -> Self {
        let mut ranks = HashMap::new();
        for (name, entry) in &payload.action_list {
            ranks.insert(name.clone(), entry.rank.max(1));
        }

        let mut adj: HashMap<FunctionIdentity, HashSet<FunctionIdentity>> = HashMap::new();
        let mut reverse_adj: HashMap<FunctionIdentity, HashSet<FunctionIdentity>> = HashMap::new();

        for (name, entry) in &payload.action_list {
            let rank = entry.rank.max(1);
            let sources: Vec<FunctionIdentity> = if rank <= 1 {
                vec![FunctionIdentity::bare(name)]
            } else {
                (1..=rank).map(|k| FunctionIdentity::replica(name, k)).collect()
            };

            let mut targets: HashSet<FunctionIdentity> = HashSet::new();
            for raw in entry.invoke_next.as_slice() {
                let reference = FunctionIdentity::parse(raw);
                match reference.replica {
                    // A `name(K)` reference names a replica *count*: expand
                    // to K concrete downstream identities, one per replica.
                    Some(count) => {
                        for k in 1..=count {
                            targets.insert(FunctionIdentity::replica(&reference.bare_name, k));
                        }
                    }
                    None => {
                        targets.insert(reference);
                    }
                }
            }

            for source in &sources {
                adj.entry(source.clone()).or_default().extend(targets.iter().cloned());
                for target in &targets {
                    reverse_adj.entry(target.clone()).or_default().insert(source.clone());
                }
            }
        }

        Self {
            adj,
            reverse_adj,
            ranks,
            entry_point: FunctionIdentity::bare(&payload.function_invoke),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::WorkflowPayload;

    fn payload(json: &str) -> WorkflowPayload {
        WorkflowPayload::from_json(json).unwrap()
    }

    #[test]
    fn linear_workflow() {
        let p = payload(
            r#"{
                "WorkflowName": "wf", "FunctionInvoke": "f1", "InvocationID": "i",
                "FaaSrLog": "logs", "DefaultDataStore": "S3",
                "DataStores": { "S3": { "Bucket": "b", "Region": "us-east-1" } },
                "ActionList": {
                    "f1": { "InvokeNext": ["f2"] },
                    "f2": { "InvokeNext": [] }
                }
            }"#,
        );
        let g = WorkflowGraph::build(&p);
        assert_eq!(g.adj[&FunctionIdentity::bare("f1")], HashSet::from([FunctionIdentity::bare("f2")]));
        assert!(g.reverse_adj[&FunctionIdentity::bare("f2")].contains(&FunctionIdentity::bare("f1")));
    }

    #[test]
    fn ranked_fan_out_expands_replicas() {
        let p = payload(
            r#"{
                "WorkflowName": "wf", "FunctionInvoke": "f1", "InvocationID": "i",
                "FaaSrLog": "logs", "DefaultDataStore": "S3",
                "DataStores": { "S3": { "Bucket": "b", "Region": "us-east-1" } },
                "ActionList": {
                    "f1": { "InvokeNext": ["f2(3)"] },
                    "f2": { "InvokeNext": [], "Rank": 3 }
                }
            }"#,
        );
        let g = WorkflowGraph::build(&p);
        let targets = &g.adj[&FunctionIdentity::bare("f1")];
        assert_eq!(targets.len(), 3);
        for k in 1..=3 {
            assert!(targets.contains(&FunctionIdentity::replica("f2", k)));
        }
        let identities = g.all_identities();
        assert!(identities.contains(&FunctionIdentity::replica("f2", 1)));
        assert!(identities.contains(&FunctionIdentity::replica("f2", 3)));
    }
}
