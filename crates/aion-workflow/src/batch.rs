use std::collections::HashMap;

use serde_json::Value;

#[derive(Debug, Clone)]
pub struct WorkflowRequest {
    pub id: String,
    pub request_type: String,
    pub payload: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct WorkflowBatch {
    pub id: String,
    pub request_type: String,
    pub requests: Vec<WorkflowRequest>,
    pub status: BatchStatus,
}

/// Groups requests by type, preserving the order in which each type first
/// appeared. Each group becomes one batch dispatched as a unit.
pub fn group_into_batches(requests: Vec<WorkflowRequest>) -> Vec<WorkflowBatch> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<WorkflowRequest>> = HashMap::new();

    for request in requests {
        groups.entry(request.request_type.clone()).or_insert_with(|| {
            order.push(request.request_type.clone());
            Vec::new()
        });
        groups.get_mut(&request.request_type).unwrap().push(request);
    }

    order
        .into_iter()
        .map(|request_type| {
            let requests = groups.remove(&request_type).unwrap_or_default();
            WorkflowBatch { id: format!("batch-{request_type}"), request_type, requests, status: BatchStatus::Pending }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn req(id: &str, request_type: &str) -> WorkflowRequest {
        WorkflowRequest { id: id.into(), request_type: request_type.into(), payload: json!({}) }
    }

    #[test]
    fn groups_thirty_requests_of_three_types_into_three_batches_of_ten() {
        let mut requests = Vec::new();
        for i in 0..30 {
            let request_type = match i % 3 {
                0 => "ingest",
                1 => "classify",
                _ => "summarize",
            };
            requests.push(req(&format!("r{i}"), request_type));
        }
        let batches = group_into_batches(requests);
        assert_eq!(batches.len(), 3);
        for batch in &batches {
            assert_eq!(batch.requests.len(), 10);
        }
    }
}
