use serde::{Deserialize, Serialize};

use crate::artefacts::SamplePayload;
use crate::chain::ChainOutcome;

/// Per-chain counters reported after the chain stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSummary {
    /// Chain index (also its RNG substream).
    pub chain: usize,
    /// Variant name.
    pub variant: String,
    /// Accepted entries, starting point included.
    pub length: usize,
    /// Proposal draws, box rejections included.
    pub samples_drawn: u64,
    /// WorkFunction evaluations.
    pub evaluations: u64,
    /// Accepted moves per evaluated proposal.
    pub acceptance_rate: f64,
    /// Threshold in force at the end of the chain.
    pub final_threshold: f64,
}

impl ChainSummary {
    /// Summarises chain `chain`.
    pub fn from_outcome(chain: usize, variant: &str, outcome: &ChainOutcome) -> Self {
        let moves = outcome.trajectory.len().saturating_sub(1) as f64;
        let proposals = outcome.evaluations.saturating_sub(1) as f64;
        Self {
            chain,
            variant: variant.to_string(),
            length: outcome.trajectory.len(),
            samples_drawn: outcome.samples_drawn,
            evaluations: outcome.evaluations,
            acceptance_rate: if proposals > 0.0 { moves / proposals } else { 0.0 },
            final_threshold: outcome.final_delta,
        }
    }
}

/// Concatenates chain trajectories in chain order.
///
/// The result holds `W * N` rows when every chain returned `N` entries.
pub fn aggregate(outcomes: &[ChainOutcome], n_params: usize) -> SamplePayload {
    let rows = outcomes.iter().map(|o| o.trajectory.len()).sum();
    let mut payload = SamplePayload {
        params: Vec::with_capacity(rows),
        distances: Vec::with_capacity(rows),
    };
    for entry in outcomes.iter().flat_map(|o| &o.trajectory) {
        payload.params.push(entry.params(n_params).to_vec());
        payload.distances.push(entry.distance());
    }
    payload
}
