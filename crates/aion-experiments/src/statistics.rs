use std::collections::HashMap;

use crate::model::{StatisticalResults, VariantMetrics};

/// Computes termination analysis from final variant metrics. The reference
/// implementation hardcodes "significant if best conversion rate > 0.1";
/// that is a placeholder, not a real significance test, so the seam is
/// exposed here to let a real two-proportion z-test be swapped in without
/// touching the engine.
pub trait StatisticsEngine: Send + Sync {
    fn analyse(&self, metrics: &HashMap<String, VariantMetrics>, confidence_level: f64) -> StatisticalResults;
}

/// Faithful port of the reference's stub: "significant if bestConversionRate
/// > 0.1". Kept distinct from a real implementation so callers can swap in
/// `TwoProportionZTest` (not provided here — no external stats crate is in
/// the dependency stack) once one is available.
pub struct ThresholdStub;

impl StatisticsEngine for ThresholdStub {
    fn analyse(&self, metrics: &HashMap<String, VariantMetrics>, confidence_level: f64) -> StatisticalResults {
        let winner = metrics.iter().max_by(|a, b| {
            a.1.conversion_rate
                .partial_cmp(&b.1.conversion_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        match winner {
            Some((variant_id, best)) => StatisticalResults {
                p_value: None,
                confidence_level,
                effect_size: None,
                is_significant: best.conversion_rate > 0.1,
                winning_variant: Some(variant_id.clone()),
                lift_percentage: None,
            },
            None => StatisticalResults {
                p_value: None,
                confidence_level,
                effect_size: None,
                is_significant: false,
                winning_variant: None,
                lift_percentage: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winning_variant_is_the_argmax_even_when_not_significant() {
        let mut metrics = HashMap::new();
        metrics.insert("a".to_string(), VariantMetrics { conversion_rate: 0.05, ..Default::default() });
        metrics.insert("b".to_string(), VariantMetrics { conversion_rate: 0.03, ..Default::default() });

        let results = ThresholdStub.analyse(&metrics, 0.95);

        assert_eq!(results.winning_variant, Some("a".to_string()));
        assert!(!results.is_significant, "0.05 is below the 0.1 significance threshold");
    }
}
