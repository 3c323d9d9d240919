use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle phase. `TearingDown` is terminal-bound: a resource in
/// `TearingDown` can never be resurrected to `Running` (§3 invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Running,
    TearingDown,
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Running
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Running => write!(f, "running"),
            Phase::TearingDown => write!(f, "tearing_down"),
        }
    }
}

/// Store-managed bookkeeping attached to every resource.
///
/// `version` is `None` before the resource has been created; the store
/// stamps it to `Some(1)` on `create` and bumps it on every subsequent
/// mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub version: Option<u64>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Controller name that created the resource; empty if created externally.
    /// Only the owner may mutate or destroy (except privileged label/annotation
    /// edits — see the store's `Update` contract).
    pub owner: String,
    pub phase: Phase,
    pub finalizers: BTreeSet<String>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

impl Metadata {
    pub fn new(owner: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            version: None,
            created: now,
            updated: now,
            owner: owner.into(),
            phase: Phase::Running,
            finalizers: BTreeSet::new(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }

    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }
}
