use crate::session::{Action, ActionType, DeploymentStrategyKind, Stage};

const DEFAULT_MAX_RETRIES: u32 = 2;

fn action(kind: ActionType) -> Action {
    Action::new(kind, DEFAULT_MAX_RETRIES)
}

/// Builds the ordered stage pipeline for a strategy, per the table in the
/// orchestrator's public contract. `recreate` is the default for any
/// strategy not otherwise recognised.
pub fn build_stages(strategy: DeploymentStrategyKind) -> Vec<Stage> {
    match strategy {
        DeploymentStrategyKind::BlueGreen => vec![
            Stage::new("backup", vec![action(ActionType::Backup)]),
            Stage::new("deploy_green", vec![action(ActionType::Deploy)]),
            Stage::new("health_check", vec![action(ActionType::HealthCheck)]),
            Stage::new("traffic_switch", vec![action(ActionType::TrafficSwitch)]),
            Stage::new("validate", vec![action(ActionType::Validation)]),
            Stage::new("notify", vec![action(ActionType::Notification)]),
        ],
        DeploymentStrategyKind::Canary => vec![
            Stage::new("backup", vec![action(ActionType::Backup)]),
            Stage::new("deploy_canary", vec![action(ActionType::Deploy)]),
            Stage::new("health_check", vec![action(ActionType::HealthCheck)]),
            Stage::new("traffic_switch", vec![action(ActionType::TrafficSwitch)]),
            Stage::new(
                "monitor_and_validate",
                vec![action(ActionType::Validation)],
            ),
        ],
        DeploymentStrategyKind::Rolling => vec![
            Stage::new("backup", vec![action(ActionType::Backup)]),
            Stage::new("rolling_update", vec![action(ActionType::Deploy)]),
            Stage::new("health_check", vec![action(ActionType::HealthCheck)]),
            Stage::new("validate", vec![action(ActionType::Validation)]),
        ],
        DeploymentStrategyKind::Recreate => vec![
            Stage::new("backup", vec![action(ActionType::Backup)]),
            Stage::new("deploy", vec![action(ActionType::Deploy)]),
            Stage::new("validate", vec![action(ActionType::Validation)]),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blue_green_pipeline_matches_contract() {
        let stages = build_stages(DeploymentStrategyKind::BlueGreen);
        let names: Vec<_> = stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["backup", "deploy_green", "health_check", "traffic_switch", "validate", "notify"]
        );
    }

    #[test]
    fn rolling_pipeline_has_four_stages() {
        assert_eq!(build_stages(DeploymentStrategyKind::Rolling).len(), 4);
    }
}
