// Threshold Classifier
// Turns (probability, uncertainty) into an advisory. Sensitivity presets only move
// decision thresholds, never raw probabilities.

use serde::{Deserialize, Serialize};

use crate::models::Advisory;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DetectionSensitivity {
    Low,
    Medium,
    High,
}

impl DetectionSensitivity {
    pub fn from_str(val: &str) -> Self {
        match val.trim().to_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            _ => Self::Medium,
        }
    }

    /// Three-way policy for this preset; `Medium` is the shipped default.
    pub fn three_way_policy(self) -> ThresholdPolicy {
        let policy = match self {
            Self::Low => ThreeWayPolicy {
                ai_threshold: 0.85,
                human_threshold: 0.35,
                upper_uncertainty: 0.65,
            },
            Self::High => ThreeWayPolicy {
                ai_threshold: 0.70,
                human_threshold: 0.45,
                upper_uncertainty: 0.75,
            },
            Self::Medium => ThreeWayPolicy::default(),
        };
        ThresholdPolicy::ThreeWay(policy)
    }
}

/// AI / Human / Uncertain bands gated by uncertainty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreeWayPolicy {
    #[serde(default = "default_ai_threshold")]
    pub ai_threshold: f64,
    #[serde(default = "default_human_threshold")]
    pub human_threshold: f64,
    #[serde(default = "default_upper_uncertainty")]
    pub upper_uncertainty: f64,
}

impl Default for ThreeWayPolicy {
    fn default() -> Self {
        Self {
            ai_threshold: default_ai_threshold(),
            human_threshold: default_human_threshold(),
            upper_uncertainty: default_upper_uncertainty(),
        }
    }
}

/// AI / Human split whose threshold rises when the scorer is unsure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoWayPolicy {
    #[serde(default = "default_base_threshold")]
    pub base_threshold: f64,
    #[serde(default = "default_uncertainty_limit")]
    pub uncertainty_limit: f64,
    #[serde(default = "default_uncertainty_penalty")]
    pub uncertainty_penalty: f64,
}

impl Default for TwoWayPolicy {
    fn default() -> Self {
        Self {
            base_threshold: default_base_threshold(),
            uncertainty_limit: default_uncertainty_limit(),
            uncertainty_penalty: default_uncertainty_penalty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "camelCase")]
pub enum ThresholdPolicy {
    ThreeWay(ThreeWayPolicy),
    TwoWay(TwoWayPolicy),
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::ThreeWay(ThreeWayPolicy::default())
    }
}

fn default_ai_threshold() -> f64 { 0.80 }
fn default_human_threshold() -> f64 { 0.40 }
fn default_upper_uncertainty() -> f64 { 0.70 }
fn default_base_threshold() -> f64 { 0.5 }
fn default_uncertainty_limit() -> f64 { 0.6 }
fn default_uncertainty_penalty() -> f64 { 0.1 }

impl ThresholdPolicy {
    pub fn classify(&self, probability: f64, uncertainty: f64) -> Advisory {
        match self {
            Self::ThreeWay(p) => classify_three_way(probability, uncertainty, p),
            Self::TwoWay(p) => classify_two_way(probability, uncertainty, p),
        }
    }
}

pub fn classify_three_way(probability: f64, uncertainty: f64, policy: &ThreeWayPolicy) -> Advisory {
    let settled = uncertainty < policy.upper_uncertainty;
    if settled && probability >= policy.ai_threshold {
        Advisory::Ai
    } else if settled && probability <= policy.human_threshold {
        Advisory::Human
    } else {
        Advisory::Uncertain
    }
}

pub fn classify_two_way(probability: f64, uncertainty: f64, policy: &TwoWayPolicy) -> Advisory {
    let mut threshold = policy.base_threshold;
    if uncertainty > policy.uncertainty_limit {
        threshold += policy.uncertainty_penalty;
    }
    if probability >= threshold {
        Advisory::Ai
    } else {
        Advisory::Human
    }
}
