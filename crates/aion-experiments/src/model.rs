use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperimentStatus {
    Draft,
    Running,
    Paused,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperimentKind {
    Ab,
    Multivariate,
    FeatureFlag,
    Bandit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub id: String,
    pub weight: f64,
    pub enabled: bool,
    pub is_control: bool,
    pub configuration: Value,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct VariantMetrics {
    pub user_count: u64,
    pub conversions: u64,
    pub conversion_rate: f64,
    pub sample_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub id: String,
    pub status: ExperimentStatus,
    pub kind: ExperimentKind,
    pub variants: Vec<Variant>,
    pub target_audience: Option<String>,
    pub goals: Vec<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub metrics: HashMap<String, VariantMetrics>,
    pub results: Option<StatisticalResults>,
}

impl Experiment {
    pub fn new(id: impl Into<String>, kind: ExperimentKind, variants: Vec<Variant>, goals: Vec<String>) -> Self {
        let metrics = variants.iter().map(|v| (v.id.clone(), VariantMetrics::default())).collect();
        Self {
            id: id.into(),
            status: ExperimentStatus::Draft,
            kind,
            variants,
            target_audience: None,
            goals,
            start_date: None,
            end_date: None,
            metrics,
            results: None,
        }
    }

    /// Weights must sum to 100 (within epsilon) and exactly one variant must
    /// be the control.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("experiment id must not be empty".to_string());
        }
        if self.variants.len() < 2 {
            return Err("experiment requires at least two variants".to_string());
        }
        let controls = self.variants.iter().filter(|v| v.is_control).count();
        if controls != 1 {
            return Err(format!("experiment requires exactly one control variant, found {controls}"));
        }
        let weight_sum: f64 = self.variants.iter().map(|v| v.weight).sum();
        if (weight_sum - 100.0).abs() > 1e-6 {
            return Err(format!("variant weights must sum to 100, got {weight_sum}"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAssignment {
    pub user_id: String,
    pub experiment_id: String,
    pub variant_id: String,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticalResults {
    pub p_value: Option<f64>,
    pub confidence_level: f64,
    pub effect_size: Option<f64>,
    pub is_significant: bool,
    pub winning_variant: Option<String>,
    pub lift_percentage: Option<f64>,
}
