use crate::resources::{pod_requests, PodResources};
use crate::Result;
use fitcheck_core::{Node, Pod, ResourceList};

/// A pod prepared for filtering: parsed once, evaluated against many nodes
#[derive(Debug, Clone)]
pub struct SchedulingContext {
    /// Pod to be placed
    pub pod: Pod,
    /// Effective requests, overhead included
    pub requests: ResourceList,
}

impl SchedulingContext {
    /// Create a new scheduling context
    pub fn new(pod: Pod) -> Result<Self> {
        let resources = PodResources::try_from(&pod)?;
        let requests = pod_requests(&resources, None);
        Ok(Self { pod, requests })
    }

    /// Name of the pod, or "unknown"
    pub fn pod_name(&self) -> &str {
        self.pod.metadata.name.as_deref().unwrap_or("unknown")
    }
}

/// Name of a node, or "unknown"
pub fn node_name(node: &Node) -> &str {
    node.metadata.name.as_deref().unwrap_or("unknown")
}

/// Result of filtering a node
#[derive(Debug, Clone, PartialEq)]
pub struct FilterResult {
    /// Node name
    pub node_name: String,
    /// Whether the node passed the filter
    pub passed: bool,
    /// Reason for failure (if any)
    pub reason: Option<String>,
}

impl FilterResult {
    /// Create a passing filter result
    pub fn pass(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            passed: true,
            reason: None,
        }
    }

    /// Create a failing filter result
    pub fn fail(node_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            passed: false,
            reason: Some(reason.into()),
        }
    }
}
