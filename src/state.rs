//! Cluster state as reported by a Mesos master.
//!
//! These types mirror the subset of `/master/state.json` the record
//! generator consumes. Unknown fields are ignored so the model stays
//! compatible across master versions.

use serde::Deserialize;
use std::collections::HashMap;

/// A snapshot of cluster state fetched from a master.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct State {
    /// The elected master, as `master@ip:port`.
    #[serde(default)]
    pub leader: String,

    /// Frameworks registered with the master.
    #[serde(default)]
    pub frameworks: Vec<Framework>,

    /// Worker nodes registered with the master.
    #[serde(default)]
    pub slaves: Vec<Slave>,
}

impl State {
    /// Index of slave id to hostname for record generation.
    pub fn slave_index(&self) -> HashMap<&str, &str> {
        self.slaves
            .iter()
            .map(|s| (s.id.as_str(), s.hostname.as_str()))
            .collect()
    }
}

/// A scheduler framework and its tasks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Framework {
    /// Framework name, used as the second label of generated names.
    #[serde(default)]
    pub name: String,

    /// Tasks launched by this framework.
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// A task launched on a slave.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Task {
    /// Task name, used as the first label of generated names.
    #[serde(default)]
    pub name: String,

    /// Unique task id.
    #[serde(default)]
    pub id: String,

    /// Current task state (e.g. "TASK_RUNNING").
    #[serde(default)]
    pub state: String,

    /// Id of the slave the task runs on.
    #[serde(default)]
    pub slave_id: String,

    /// Resources allocated to the task.
    #[serde(default)]
    pub resources: Resources,

    /// Status history, ordered oldest to newest.
    #[serde(default)]
    pub statuses: Vec<Status>,
}

impl Task {
    /// Whether the task counts as running: its most recent status entry
    /// reports `TASK_RUNNING`.
    pub fn is_running(&self) -> bool {
        self.statuses
            .last()
            .is_some_and(|s| s.state == "TASK_RUNNING")
    }
}

/// Resources allocated to a task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Resources {
    /// Exposed port ranges, e.g. `"[31000-31000, 31100-31110]"`.
    #[serde(default)]
    pub ports: String,
}

/// One entry in a task's status history.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Status {
    /// Task state at this point (e.g. "TASK_RUNNING").
    #[serde(default)]
    pub state: String,

    /// Unix timestamp of the transition.
    #[serde(default)]
    pub timestamp: f64,
}

/// A worker node.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Slave {
    /// Stable slave id referenced by tasks.
    #[serde(default)]
    pub id: String,

    /// Hostname or IP the slave registered with.
    #[serde(default)]
    pub hostname: String,
}
