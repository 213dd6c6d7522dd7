//! Elite episode selection: length discounting, percentile threshold and
//! flattening of the elite steps into supervised training examples.

use crate::episode::{Episode, Observation};

/// Episodes above the reward bound and their flattened steps.
#[derive(Clone, Debug, Default)]
pub struct EliteSelection {
    pub elite: Vec<Episode>,
    pub observations: Vec<Observation>,
    pub actions: Vec<usize>,
    pub reward_bound: f32,
}

impl EliteSelection {
    /// No episode beat the bound; the update must be skipped.
    pub fn is_empty(&self) -> bool {
        self.elite.is_empty()
    }

    pub fn example_count(&self) -> usize {
        self.actions.len()
    }
}

/// `reward * gamma^len`: shorter episodes score higher for equal rewards.
pub fn discounted_score(episode: &Episode, gamma: f32) -> f32 {
    episode.reward() * gamma.powi(episode.len() as i32)
}

/// Percentile with linear interpolation between the closest ranks.
///
/// Returns `NaN` for an empty input, any `NaN` value or a percentile outside
/// `[0, 100]`.
pub fn percentile(values: &[f32], percentile: f32) -> f32 {
    if values.is_empty() || !(0.0..=100.0).contains(&percentile) {
        return f32::NAN;
    }
    if values.iter().any(|value| value.is_nan()) {
        return f32::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    let rank = percentile as f64 / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = (rank - lower as f64) as f32;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Selects the episodes whose discounted score is strictly greater than the
/// `percentile` of all discounted scores in `episodes`.
pub fn filter_elite(episodes: &[Episode], percentile_value: f32, gamma: f32) -> EliteSelection {
    let scores: Vec<f32> = episodes
        .iter()
        .map(|episode| discounted_score(episode, gamma))
        .collect();
    let reward_bound = percentile(&scores, percentile_value);

    let mut selection = EliteSelection {
        reward_bound,
        ..EliteSelection::default()
    };
    for (episode, score) in episodes.iter().zip(scores) {
        if score > reward_bound {
            for step in episode.steps() {
                selection.observations.push(step.observation().to_vec());
                selection.actions.push(step.action());
            }
            selection.elite.push(episode.clone());
        }
    }
    selection
}
