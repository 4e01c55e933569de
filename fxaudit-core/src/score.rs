//! Scoring engine — pure weighted scorecard over validation outcomes.
//!
//! `(values, specs) → 0–100`. No hidden state, no clock, no randomness;
//! `BTreeMap` everywhere so iteration (and any serialization of the card)
//! is deterministic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Weight and target for one named metric, from configuration. Metrics are
/// lower-is-better: a value at or above `target` scores 0, a value of 0
/// scores 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub weight: f64,
    pub target: f64,
}

/// One scored component of the card.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricOutcome {
    pub value: f64,
    pub weight: f64,
    pub target: f64,
    /// 0–100 component score.
    pub score: f64,
}

/// The aggregated scorecard: per-metric outcomes plus the weighted total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub components: BTreeMap<String, MetricOutcome>,
    /// Weighted composite, 0–100.
    pub total: f64,
}

/// Invalid-configuration conditions. All are terminal for the run.
#[derive(Debug, Error, PartialEq)]
pub enum ScoreError {
    #[error("metric {0:?} is configured but no value was supplied")]
    MissingValue(String),
    #[error("metric {0:?} has non-positive target {1}")]
    InvalidTarget(String, f64),
    #[error("metric {0:?} has negative weight {1}")]
    InvalidWeight(String, f64),
    #[error("weights sum to zero")]
    ZeroWeightSum,
}

/// Build the card. Every configured metric must have a value; extra values
/// without a spec are ignored (they simply carry no weight).
pub fn build_scorecard(
    values: &BTreeMap<String, f64>,
    specs: &BTreeMap<String, MetricSpec>,
) -> Result<ScoreCard, ScoreError> {
    let mut components = BTreeMap::new();
    let mut weight_sum = 0.0;
    let mut weighted = 0.0;

    for (name, spec) in specs {
        if spec.target <= 0.0 {
            return Err(ScoreError::InvalidTarget(name.clone(), spec.target));
        }
        if spec.weight < 0.0 {
            return Err(ScoreError::InvalidWeight(name.clone(), spec.weight));
        }
        let value = *values
            .get(name)
            .ok_or_else(|| ScoreError::MissingValue(name.clone()))?;
        let score = 100.0 * (1.0 - (value / spec.target).clamp(0.0, 1.0));
        components.insert(
            name.clone(),
            MetricOutcome {
                value,
                weight: spec.weight,
                target: spec.target,
                score,
            },
        );
        weight_sum += spec.weight;
        weighted += spec.weight * score;
    }

    if weight_sum <= 0.0 {
        return Err(ScoreError::ZeroWeightSum);
    }

    Ok(ScoreCard {
        components,
        total: weighted / weight_sum,
    })
}
