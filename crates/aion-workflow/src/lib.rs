pub mod batch;
pub mod endpoint;
pub mod enhancer;
pub mod errors;
pub mod monitor;

pub use batch::{group_into_batches, BatchStatus, WorkflowBatch, WorkflowRequest};
pub use endpoint::{spawn_probe_loop, EndpointHealth, EndpointStatus, LoadBalancer};
pub use enhancer::{EnhancerConfig, WorkflowEnhancer};
pub use errors::{WorkflowError, WorkflowResult};
pub use monitor::{spawn_monitor_loop, Alert, Bottleneck, MetricsSnapshot, MetricsSource, Monitor, Severity};
