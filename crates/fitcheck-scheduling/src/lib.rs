//! Fitcheck Scheduling - Inputs to pod placement decisions
//!
//! This crate provides:
//! - Effective pod requests and limits (containers, init containers, overhead)
//! - Taint and toleration matching
//! - Node selector and required node affinity matching
//! - Pod priority and avoid-pods annotation helpers
//! - Filter predicates that decide node eligibility

pub mod avoid_pods;
pub mod error;
pub mod filter;
pub mod node_selector;
pub mod priority;
pub mod resources;
pub mod taints;
pub mod types;

// Re-export commonly used types
pub use avoid_pods::{get_avoid_pods_from_node_annotations, AvoidPods};
pub use error::{Result, SchedulingError};
pub use filter::{default_filters, find_feasible_nodes, FilterPredicate};
pub use node_selector::{match_node_selector_terms, NodeSelectorMatcher, RequiredNodeSelector};
pub use priority::pod_priority;
pub use resources::{
    pod_limits, pod_requests, ContainerResources, ContainerType, PodResources,
    PodResourcesOptions,
};
pub use taints::{find_matching_untolerated_taint, tolerations_tolerate_taint, ToleratesTaint};
pub use types::{FilterResult, SchedulingContext};
