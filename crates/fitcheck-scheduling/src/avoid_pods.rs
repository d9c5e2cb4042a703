//! Decoding of the node annotation listing pods the node would rather not run

use crate::{Result, SchedulingError};
use fitcheck_core::k8s_openapi::apimachinery::pkg::apis::meta::v1::{OwnerReference, Time};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Node annotation holding a JSON-encoded [`AvoidPods`]
pub const PREFER_AVOID_PODS_ANNOTATION_KEY: &str = "scheduler.alpha.kubernetes.io/preferAvoidPods";

/// Pods a node prefers not to run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvoidPods {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prefer_avoid_pods: Vec<PreferAvoidPodsEntry>,
}

/// One class of pods to avoid, and why
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferAvoidPodsEntry {
    #[serde(default)]
    pub pod_signature: PodSignature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eviction_time: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Identifies pods by the controller that owns them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSignature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_controller: Option<OwnerReference>,
}

/// Decode the avoid-pods annotation of a node.
///
/// A missing or empty annotation yields an empty [`AvoidPods`].
pub fn get_avoid_pods_from_node_annotations(
    annotations: &BTreeMap<String, String>,
) -> Result<AvoidPods> {
    match annotations
        .get(PREFER_AVOID_PODS_ANNOTATION_KEY)
        .filter(|raw| !raw.is_empty())
    {
        Some(raw) => serde_json::from_str(raw).map_err(SchedulingError::avoid_pods_decode),
        None => Ok(AvoidPods::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn annotations(value: &str) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("unrelated".to_string(), "x".to_string());
        map.insert(PREFER_AVOID_PODS_ANNOTATION_KEY.to_string(), value.to_string());
        map
    }

    #[test]
    fn test_missing_or_empty_annotation() {
        assert_eq!(
            get_avoid_pods_from_node_annotations(&BTreeMap::new()).unwrap(),
            AvoidPods::default()
        );
        assert_eq!(
            get_avoid_pods_from_node_annotations(&annotations("")).unwrap(),
            AvoidPods::default()
        );
    }

    #[test]
    fn test_decode_entries() {
        let raw = r#"{
            "preferAvoidPods": [
                {
                    "podSignature": {
                        "podController": {
                            "apiVersion": "v1",
                            "kind": "ReplicationController",
                            "name": "foo",
                            "uid": "abcdef123456",
                            "controller": true
                        }
                    },
                    "evictionTime": "2024-01-02T03:04:05Z",
                    "reason": "some reason",
                    "message": "some message"
                }
            ]
        }"#;

        let avoid = get_avoid_pods_from_node_annotations(&annotations(raw)).unwrap();
        assert_eq!(avoid.prefer_avoid_pods.len(), 1);

        let entry = &avoid.prefer_avoid_pods[0];
        let controller = entry.pod_signature.pod_controller.as_ref().unwrap();
        assert_eq!(controller.kind, "ReplicationController");
        assert_eq!(controller.uid, "abcdef123456");
        assert_eq!(controller.controller, Some(true));
        assert_eq!(
            entry.eviction_time.as_ref().unwrap().0,
            Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
        );
        assert_eq!(entry.reason.as_deref(), Some("some reason"));
    }

    #[test]
    fn test_malformed_annotation() {
        let err = get_avoid_pods_from_node_annotations(&annotations("{not json")).unwrap_err();
        assert!(matches!(err, SchedulingError::AvoidPodsDecode { .. }));
    }
}
