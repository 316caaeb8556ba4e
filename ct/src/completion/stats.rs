//! Counters describing how a command was finalized

use serde::{Deserialize, Serialize};

/// Which race participant committed the response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizedBy {
    Push,
    Poll,
}

/// Per-coordinator statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionStats {
    pub status_queries: u64,
    pub transport_failures: u64,
    pub poll_runs: u64,
    pub pushes_received: u64,
    pub cancel_requests: u64,
    /// Terminal observations that lost the finalization race
    pub discarded_observations: u64,
    pub commits: u64,
    pub finalized_by: Option<FinalizedBy>,
}
