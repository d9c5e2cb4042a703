//! Node selector term matching for required node affinity.
//!
//! Terms are ORed together; the requirements inside one term are ANDed. A
//! term with no requirements matches nothing. A term that fails validation is
//! skipped, and its error is only reported when no other term matched.

use crate::{Result, SchedulingError};
use fitcheck_core::k8s_openapi::api::core::v1::{
    NodeSelector, NodeSelectorRequirement, NodeSelectorTerm,
};
use fitcheck_core::Node;
use std::collections::BTreeMap;

/// The only node field that may appear in `matchFields`
pub const NODE_FIELD_SELECTOR_KEY_NODE_NAME: &str = "metadata.name";

/// Evaluates a node selector against a node
pub trait NodeSelectorMatcher: Send + Sync {
    fn matches(&self, node: &Node, selector: &NodeSelector) -> Result<bool>;
}

/// Matcher for `requiredDuringSchedulingIgnoredDuringExecution` selectors
pub struct RequiredNodeSelector;

impl NodeSelectorMatcher for RequiredNodeSelector {
    fn matches(&self, node: &Node, selector: &NodeSelector) -> Result<bool> {
        let labels = node.metadata.labels.as_ref();
        let node_name = node.metadata.name.as_deref().unwrap_or_default();

        let mut errors = Vec::new();
        for (index, term) in selector.node_selector_terms.iter().enumerate() {
            match term_matches(term, labels, node_name) {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) => errors.push(format!("term {}: {}", index, e)),
            }
        }

        if errors.is_empty() {
            Ok(false)
        } else {
            Err(SchedulingError::invalid_node_selector(errors.join("; ")))
        }
    }
}

/// Check whether `node` satisfies any term of `selector`.
///
/// An absent node matches nothing.
pub fn match_node_selector_terms(node: Option<&Node>, selector: &NodeSelector) -> Result<bool> {
    match node {
        Some(node) => RequiredNodeSelector.matches(node, selector),
        None => Ok(false),
    }
}

fn term_matches(
    term: &NodeSelectorTerm,
    labels: Option<&BTreeMap<String, String>>,
    node_name: &str,
) -> std::result::Result<bool, String> {
    let expressions = term.match_expressions.as_deref().unwrap_or_default();
    let fields = term.match_fields.as_deref().unwrap_or_default();
    if expressions.is_empty() && fields.is_empty() {
        return Ok(false);
    }

    // Validate the whole term before evaluating any of it
    let label_requirements = expressions
        .iter()
        .map(LabelRequirement::parse)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let field_requirements = fields
        .iter()
        .map(FieldRequirement::parse)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(label_requirements.iter().all(|r| r.matches(labels))
        && field_requirements.iter().all(|r| r.matches(node_name)))
}

enum LabelOperator<'a> {
    In(&'a [String]),
    NotIn(&'a [String]),
    Exists,
    DoesNotExist,
    Gt(i64),
    Lt(i64),
}

struct LabelRequirement<'a> {
    key: &'a str,
    operator: LabelOperator<'a>,
}

impl<'a> LabelRequirement<'a> {
    fn parse(req: &'a NodeSelectorRequirement) -> std::result::Result<Self, String> {
        if req.key.is_empty() {
            return Err("label key must not be empty".to_string());
        }

        let values = req.values.as_deref().unwrap_or_default();
        let operator = match req.operator.as_str() {
            "In" | "NotIn" if values.is_empty() => {
                return Err(format!(
                    "{}: values must be non-empty for operator {}",
                    req.key, req.operator
                ));
            }
            "In" => LabelOperator::In(values),
            "NotIn" => LabelOperator::NotIn(values),
            "Exists" | "DoesNotExist" if !values.is_empty() => {
                return Err(format!(
                    "{}: values must be empty for operator {}",
                    req.key, req.operator
                ));
            }
            "Exists" => LabelOperator::Exists,
            "DoesNotExist" => LabelOperator::DoesNotExist,
            "Gt" | "Lt" => {
                let bound = match values {
                    [single] => single.parse::<i64>().map_err(|_| {
                        format!("{}: value {:?} is not an integer", req.key, single)
                    })?,
                    _ => {
                        return Err(format!(
                            "{}: exactly one value is required for operator {}",
                            req.key, req.operator
                        ));
                    }
                };
                if req.operator == "Gt" {
                    LabelOperator::Gt(bound)
                } else {
                    LabelOperator::Lt(bound)
                }
            }
            other => return Err(format!("{}: unsupported operator {:?}", req.key, other)),
        };

        Ok(Self {
            key: &req.key,
            operator,
        })
    }

    fn matches(&self, labels: Option<&BTreeMap<String, String>>) -> bool {
        let value = labels.and_then(|l| l.get(self.key));
        match &self.operator {
            LabelOperator::In(values) => value.is_some_and(|v| values.contains(v)),
            LabelOperator::NotIn(values) => value.map_or(true, |v| !values.contains(v)),
            LabelOperator::Exists => value.is_some(),
            LabelOperator::DoesNotExist => value.is_none(),
            LabelOperator::Gt(bound) => parse_label_int(value).is_some_and(|v| v > *bound),
            LabelOperator::Lt(bound) => parse_label_int(value).is_some_and(|v| v < *bound),
        }
    }
}

fn parse_label_int(value: Option<&String>) -> Option<i64> {
    value.and_then(|v| v.parse().ok())
}

struct FieldRequirement<'a> {
    value: &'a str,
    negated: bool,
}

impl<'a> FieldRequirement<'a> {
    fn parse(req: &'a NodeSelectorRequirement) -> std::result::Result<Self, String> {
        if req.key != NODE_FIELD_SELECTOR_KEY_NODE_NAME {
            return Err(format!("{}: not a valid field selector key", req.key));
        }

        let negated = match req.operator.as_str() {
            "In" => false,
            "NotIn" => true,
            other => {
                return Err(format!(
                    "{}: operator {:?} is not supported for fields",
                    req.key, other
                ))
            }
        };

        match req.values.as_deref().unwrap_or_default() {
            [value] => Ok(Self { value, negated }),
            _ => Err(format!(
                "{}: exactly one value is required for field selectors",
                req.key
            )),
        }
    }

    fn matches(&self, node_name: &str) -> bool {
        (node_name == self.value) != self.negated
    }
}
