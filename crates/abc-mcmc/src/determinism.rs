use abc_core::derive_substream_seed;

const CALIBRATION_SALT: u64 = 0xCA11_B4A7_E000_0000;
const CHAIN_SALT: u64 = 0xC4A1_0000_0000_0000;
const CLASSIC_SALT: u64 = 0xC1A5_51C0_0000_0000;

/// Seed of the sampler drawing the candidates of calibration `round` (1 or 2).
pub fn sampler_seed(master_seed: u64, round: usize) -> u64 {
    derive_substream_seed(master_seed ^ CALIBRATION_SALT, (round as u64) << 32)
}

/// Seed handed to the work function for task `task` of calibration `round`.
pub fn calibration_task_seed(master_seed: u64, round: usize, task: usize) -> u64 {
    derive_substream_seed(
        master_seed ^ CALIBRATION_SALT,
        (round as u64) << 32 | (task as u64 + 1),
    )
}

/// Seed used to pick chain starting points from the accepted calibration set.
pub fn start_point_seed(master_seed: u64) -> u64 {
    derive_substream_seed(master_seed ^ CALIBRATION_SALT, u64::MAX)
}

/// Seed owned by chain `chain_index` for proposals, acceptance draws and evaluations.
pub fn chain_seed(master_seed: u64, chain_index: usize) -> u64 {
    derive_substream_seed(master_seed ^ CHAIN_SALT, chain_index as u64)
}

/// Seeds for the classic rejection ABC sampler (`task = None`) and its evaluations.
pub fn classic_seed(master_seed: u64, task: Option<usize>) -> u64 {
    let substream = task.map(|index| index as u64 + 1).unwrap_or(0);
    derive_substream_seed(master_seed ^ CLASSIC_SALT, substream)
}
