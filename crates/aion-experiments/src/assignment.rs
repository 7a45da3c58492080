use crate::model::Variant;

/// Stable rolling polynomial hash: `h_{i+1} = 31*h_i + byte_i`, wrapping on
/// 32-bit overflow, absolute value taken so the result is non-negative.
pub fn stable_hash(user_id: &str, experiment_id: &str) -> u32 {
    let mut h: i32 = 0;
    for byte in user_id.bytes().chain(experiment_id.bytes()) {
        h = h.wrapping_mul(31).wrapping_add(byte as i32);
    }
    h.unsigned_abs()
}

/// Maps the hash to a percentile in `[0, 100)`.
pub fn hash_to_percentile(hash: u32) -> f64 {
    (hash % 10_000) as f64 / 100.0
}

/// Selects a variant deterministically for `(user_id, experiment_id)`.
///
/// Iterates enabled variants in declaration order accumulating weight and
/// picks the first whose cumulative weight reaches the target percentile.
/// Falls back to the control variant, then the first enabled variant, then
/// the first variant unconditionally — so the function always returns
/// something as long as `variants` is non-empty.
pub fn select_variant<'a>(user_id: &str, experiment_id: &str, variants: &'a [Variant]) -> Option<&'a Variant> {
    let percentile = hash_to_percentile(stable_hash(user_id, experiment_id));

    let mut cumulative = 0.0;
    for variant in variants.iter().filter(|v| v.enabled) {
        cumulative += variant.weight;
        if cumulative >= percentile {
            return Some(variant);
        }
    }

    variants
        .iter()
        .find(|v| v.is_control)
        .or_else(|| variants.iter().find(|v| v.enabled))
        .or_else(|| variants.first())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn variant(id: &str, weight: f64, enabled: bool, is_control: bool) -> Variant {
        Variant { id: id.to_string(), weight, enabled, is_control, configuration: json!({}) }
    }

    #[test]
    fn same_user_and_experiment_always_hash_identically() {
        let h1 = stable_hash("user-42", "exp-1");
        let h2 = stable_hash("user-42", "exp-1");
        assert_eq!(h1, h2);
    }

    #[test]
    fn distribution_over_many_users_approaches_declared_weights() {
        let variants = vec![variant("a", 50.0, true, true), variant("b", 50.0, true, false)];
        let mut a_count = 0;
        let total = 100_000;
        for i in 0..total {
            let user_id = format!("user-{i}");
            let picked = select_variant(&user_id, "exp-1", &variants).unwrap();
            if picked.id == "a" {
                a_count += 1;
            }
        }
        let share = a_count as f64 / total as f64;
        assert!((share - 0.5).abs() < 0.01, "share was {share}");
    }

    #[test]
    fn disabled_variants_are_never_selected() {
        let variants = vec![variant("a", 50.0, false, true), variant("b", 50.0, true, false)];
        for i in 0..1000 {
            let user_id = format!("user-{i}");
            let picked = select_variant(&user_id, "exp-1", &variants).unwrap();
            assert_eq!(picked.id, "b");
        }
    }
}
