use crate::node_selector::{NodeSelectorMatcher, RequiredNodeSelector};
use crate::taints::{do_not_schedule_filter, find_matching_untolerated_taint};
use crate::types::{node_name, FilterResult, SchedulingContext};
use fitcheck_core::resources::resource_list_from_k8s;
use fitcheck_core::{Node, ResourceList};
use tracing::debug;

/// Filter predicate trait
pub trait FilterPredicate: Send + Sync {
    /// Filter a node for the given pod
    fn filter(&self, context: &SchedulingContext, node: &Node) -> FilterResult;

    /// Name of the filter
    fn name(&self) -> &str;
}

/// Filter for pod resource requirements
pub struct PodFitsResources;

impl FilterPredicate for PodFitsResources {
    fn filter(&self, context: &SchedulingContext, node: &Node) -> FilterResult {
        let node_name = node_name(node);

        // Get node allocatable resources
        let allocatable = match node.status.as_ref().and_then(|s| s.allocatable.as_ref()) {
            Some(raw) => match resource_list_from_k8s(raw) {
                Ok(list) => list,
                Err(e) => {
                    return FilterResult::fail(
                        node_name,
                        format!("Invalid allocatable resources: {}", e),
                    )
                }
            },
            None => ResourceList::new(),
        };

        // Sorted so the reported shortage does not depend on map order
        let mut names: Vec<&String> = context.requests.keys().collect();
        names.sort();

        for name in names {
            let requested = &context.requests[name];
            if requested.is_zero() {
                continue;
            }

            let available = allocatable.get(name).copied().unwrap_or_default();
            debug!(
                "Node {} {}: requested {}, allocatable {}",
                node_name, name, requested, available
            );

            if *requested > available {
                return FilterResult::fail(
                    node_name,
                    format!(
                        "Insufficient {}: requested {}, available {}",
                        name, requested, available
                    ),
                );
            }
        }

        FilterResult::pass(node_name)
    }

    fn name(&self) -> &str {
        "PodFitsResources"
    }
}

/// Filter for node selector labels and required node affinity
pub struct NodeSelectorMatch<M: NodeSelectorMatcher = RequiredNodeSelector> {
    matcher: M,
}

impl NodeSelectorMatch {
    /// Match required node affinity with [`RequiredNodeSelector`]
    pub fn new() -> Self {
        Self {
            matcher: RequiredNodeSelector,
        }
    }
}

impl Default for NodeSelectorMatch {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: NodeSelectorMatcher> NodeSelectorMatch<M> {
    /// Use a custom matcher for required node affinity
    pub fn with_matcher(matcher: M) -> Self {
        Self { matcher }
    }
}

impl<M: NodeSelectorMatcher> FilterPredicate for NodeSelectorMatch<M> {
    fn filter(&self, context: &SchedulingContext, node: &Node) -> FilterResult {
        let node_name = node_name(node);

        let pod_spec = match &context.pod.spec {
            Some(spec) => spec,
            None => return FilterResult::pass(node_name),
        };

        // Check if all selector labels match
        if let Some(node_selector) = &pod_spec.node_selector {
            let node_labels = node.metadata.labels.as_ref();
            for (key, value) in node_selector {
                let node_value = node_labels.and_then(|labels| labels.get(key));

                if node_value != Some(value) {
                    return FilterResult::fail(
                        node_name,
                        format!("Node selector mismatch: {}={}", key, value),
                    );
                }
            }
        }

        let required = pod_spec
            .affinity
            .as_ref()
            .and_then(|a| a.node_affinity.as_ref())
            .and_then(|na| na.required_during_scheduling_ignored_during_execution.as_ref());

        if let Some(selector) = required {
            match self.matcher.matches(node, selector) {
                Ok(true) => {}
                Ok(false) => {
                    return FilterResult::fail(
                        node_name,
                        "Node does not match required node affinity",
                    )
                }
                Err(e) => {
                    return FilterResult::fail(node_name, format!("Invalid node affinity: {}", e))
                }
            }
        }

        FilterResult::pass(node_name)
    }

    fn name(&self) -> &str {
        "NodeSelectorMatch"
    }
}

/// Filter for taints and tolerations
pub struct TaintToleration;

impl FilterPredicate for TaintToleration {
    fn filter(&self, context: &SchedulingContext, node: &Node) -> FilterResult {
        let node_name = node_name(node);

        let taints = node
            .spec
            .as_ref()
            .and_then(|s| s.taints.as_deref())
            .unwrap_or_default();

        let tolerations = context
            .pod
            .spec
            .as_ref()
            .and_then(|s| s.tolerations.as_deref())
            .unwrap_or_default();

        // PreferNoSchedule taints only affect ranking
        match find_matching_untolerated_taint(taints, tolerations, Some(&do_not_schedule_filter)) {
            Some(taint) => FilterResult::fail(
                node_name,
                format!(
                    "Pod does not tolerate taint: {}={}:{}",
                    taint.key,
                    taint.value.as_deref().unwrap_or_default(),
                    taint.effect
                ),
            ),
            None => FilterResult::pass(node_name),
        }
    }

    fn name(&self) -> &str {
        "TaintToleration"
    }
}

/// Get default filter predicates
pub fn default_filters() -> Vec<Box<dyn FilterPredicate>> {
    vec![
        Box::new(PodFitsResources),
        Box::new(NodeSelectorMatch::new()),
        Box::new(TaintToleration),
    ]
}

/// Run `filters` against a node, stopping at the first failure
pub fn filter_node(
    context: &SchedulingContext,
    node: &Node,
    filters: &[Box<dyn FilterPredicate>],
) -> FilterResult {
    for filter in filters {
        let result = filter.filter(context, node);
        if !result.passed {
            debug!(
                "Node {} filtered out by {}: {}",
                result.node_name,
                filter.name(),
                result.reason.as_deref().unwrap_or_default()
            );
            return result;
        }
    }

    FilterResult::pass(node_name(node))
}

/// Nodes that pass every filter, in input order
pub fn find_feasible_nodes<'n>(
    context: &SchedulingContext,
    nodes: &'n [Node],
    filters: &[Box<dyn FilterPredicate>],
) -> Vec<&'n Node> {
    let feasible: Vec<&Node> = nodes
        .iter()
        .filter(|node| filter_node(context, node, filters).passed)
        .collect();

    debug!(
        "Pod {} has {} feasible nodes out of {}",
        context.pod_name(),
        feasible.len(),
        nodes.len()
    );

    feasible
}
