//! Effective resource requests and limits of a pod.
//!
//! Regular containers run side by side, so their resources are summed. Init
//! containers run one at a time before any regular container starts, so only
//! the largest of them matters, and the pod needs at least that much. Pod
//! overhead is then added on top.

use fitcheck_core::k8s_openapi::apimachinery::pkg::api::resource::Quantity as K8sQuantity;
use fitcheck_core::resources::resource_list_from_k8s;
use fitcheck_core::{Container, FitcheckError, Pod, ResourceList};
use std::collections::BTreeMap;
use std::fmt;

/// Role of a container within its pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerType {
    /// Regular (long-running) container
    Containers,
    /// Init container, run to completion before the regular containers
    InitContainers,
}

/// Parsed resources of a single container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerResources {
    pub name: String,
    pub requests: ResourceList,
    pub limits: ResourceList,
}

impl TryFrom<&Container> for ContainerResources {
    type Error = FitcheckError;

    fn try_from(container: &Container) -> Result<Self, Self::Error> {
        let parse = |raw: Option<&BTreeMap<String, K8sQuantity>>| {
            raw.map(resource_list_from_k8s)
                .transpose()
                .map(Option::unwrap_or_default)
                .map_err(|e| {
                    FitcheckError::invalid_resource(
                        format!("container {}: {}", container.name, e),
                        "Fix the container's resource quantities",
                    )
                })
        };

        let resources = container.resources.as_ref();
        Ok(Self {
            name: container.name.clone(),
            requests: parse(resources.and_then(|r| r.requests.as_ref()))?,
            limits: parse(resources.and_then(|r| r.limits.as_ref()))?,
        })
    }
}

/// Parsed resource view of a pod: what the aggregation functions read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PodResources {
    /// Regular containers, in spec order
    pub containers: Vec<ContainerResources>,
    /// Init containers, in spec order
    pub init_containers: Vec<ContainerResources>,
    /// Fixed cost of running the pod itself (sandbox, runtime)
    pub overhead: Option<ResourceList>,
}

impl TryFrom<&Pod> for PodResources {
    type Error = FitcheckError;

    fn try_from(pod: &Pod) -> Result<Self, Self::Error> {
        let spec = pod.spec.as_ref().ok_or_else(|| {
            FitcheckError::invalid_resource(
                format!(
                    "Pod {} has no spec",
                    pod.metadata.name.as_deref().unwrap_or("unknown")
                ),
                "Add a spec with at least one container",
            )
        })?;

        let containers = spec
            .containers
            .iter()
            .map(ContainerResources::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let init_containers = spec
            .init_containers
            .iter()
            .flatten()
            .map(ContainerResources::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let overhead = spec
            .overhead
            .as_ref()
            .map(resource_list_from_k8s)
            .transpose()?;

        Ok(Self {
            containers,
            init_containers,
            overhead,
        })
    }
}

/// Options for [`pod_requests`] and [`pod_limits`]
#[derive(Default)]
pub struct PodResourcesOptions<'a> {
    /// List to clear and accumulate into instead of allocating a new one.
    /// Its previous contents are discarded.
    pub reuse: Option<ResourceList>,
    /// Leave pod overhead out of the result
    pub exclude_overhead: bool,
    /// Called with each container's resources, in container order, before
    /// they are merged into the result
    pub container_fn: Option<&'a mut dyn FnMut(&ResourceList, ContainerType)>,
}

impl fmt::Debug for PodResourcesOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PodResourcesOptions")
            .field("reuse", &self.reuse)
            .field("exclude_overhead", &self.exclude_overhead)
            .field("container_fn", &self.container_fn.is_some())
            .finish()
    }
}

/// Compute the effective requests of a pod.
///
/// `None` options means a fresh list with overhead included.
pub fn pod_requests(pod: &PodResources, opts: Option<PodResourcesOptions<'_>>) -> ResourceList {
    let opts = opts.unwrap_or_default();
    let exclude_overhead = opts.exclude_overhead;
    let mut reqs = aggregate_containers(pod, opts, requests_of);

    if !exclude_overhead {
        if let Some(overhead) = &pod.overhead {
            add_resource_list(&mut reqs, overhead);
        }
    }

    reqs
}

/// Compute the effective limits of a pod.
///
/// Overhead is only added to resources that already carry a non-zero limit:
/// a missing or zero limit means unbounded and stays that way.
pub fn pod_limits(pod: &PodResources, opts: Option<PodResourcesOptions<'_>>) -> ResourceList {
    let opts = opts.unwrap_or_default();
    let exclude_overhead = opts.exclude_overhead;
    let mut limits = aggregate_containers(pod, opts, limits_of);

    if !exclude_overhead {
        if let Some(overhead) = &pod.overhead {
            for (name, quantity) in overhead {
                if let Some(value) = limits.get_mut(name) {
                    if !value.is_zero() {
                        *value += quantity;
                    }
                }
            }
        }
    }

    limits
}

fn requests_of(container: &ContainerResources) -> &ResourceList {
    &container.requests
}

fn limits_of(container: &ContainerResources) -> &ResourceList {
    &container.limits
}

/// Sum regular containers, then raise each resource to the largest init container
fn aggregate_containers(
    pod: &PodResources,
    opts: PodResourcesOptions<'_>,
    select: fn(&ContainerResources) -> &ResourceList,
) -> ResourceList {
    let PodResourcesOptions {
        reuse,
        mut container_fn,
        ..
    } = opts;

    let mut list = reuse_or_clear_resource_list(reuse);

    for container in &pod.containers {
        let resources = select(container);
        if let Some(f) = container_fn.as_mut() {
            f(resources, ContainerType::Containers);
        }
        add_resource_list(&mut list, resources);
    }

    for container in &pod.init_containers {
        let resources = select(container);
        if let Some(f) = container_fn.as_mut() {
            f(resources, ContainerType::InitContainers);
        }
        max_resource_list(&mut list, resources);
    }

    list
}

/// Add every resource in `new_list` to `list`
fn add_resource_list(list: &mut ResourceList, new_list: &ResourceList) {
    for (name, quantity) in new_list {
        match list.get_mut(name) {
            Some(value) => *value += quantity,
            None => {
                list.insert(name.clone(), *quantity);
            }
        }
    }
}

/// Set `list` to the greater of `list` and `new_list` for every resource in `new_list`
fn max_resource_list(list: &mut ResourceList, new_list: &ResourceList) {
    for (name, quantity) in new_list {
        match list.get_mut(name) {
            Some(value) => {
                if *quantity > *value {
                    *value = *quantity;
                }
            }
            None => {
                list.insert(name.clone(), *quantity);
            }
        }
    }
}

fn reuse_or_clear_resource_list(reuse: Option<ResourceList>) -> ResourceList {
    match reuse {
        Some(mut list) => {
            list.clear();
            list
        }
        None => ResourceList::with_capacity(4),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitcheck_core::k8s_openapi::api::core::v1::{PodSpec, ResourceRequirements};
    use fitcheck_core::Quantity;

    fn list(entries: &[(&str, &str)]) -> ResourceList {
        entries
            .iter()
            .map(|(name, value)| (name.to_string(), value.parse::<Quantity>().unwrap()))
            .collect()
    }

    fn container(requests: &[(&str, &str)], limits: &[(&str, &str)]) -> ContainerResources {
        ContainerResources {
            name: "c".to_string(),
            requests: list(requests),
            limits: list(limits),
        }
    }

    fn q(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    #[test]
    fn test_requests_sum_regular_containers() {
        let pod = PodResources {
            containers: vec![
                container(&[("cpu", "1"), ("memory", "1Gi")], &[]),
                container(&[("cpu", "2")], &[]),
            ],
            ..Default::default()
        };

        let reqs = pod_requests(&pod, None);
        assert_eq!(reqs, list(&[("cpu", "3"), ("memory", "1Gi")]));
    }

    #[test]
    fn test_requests_max_init_containers() {
        let pod = PodResources {
            init_containers: vec![
                container(&[("cpu", "500m"), ("memory", "2Gi")], &[]),
                container(&[("cpu", "2"), ("memory", "1Gi")], &[]),
            ],
            ..Default::default()
        };

        let reqs = pod_requests(&pod, None);
        assert_eq!(reqs, list(&[("cpu", "2"), ("memory", "2Gi")]));
    }

    #[test]
    fn test_requests_mixed_containers() {
        let pod = PodResources {
            containers: vec![
                container(&[("cpu", "1"), ("memory", "1Gi")], &[]),
                container(&[("cpu", "2")], &[]),
            ],
            init_containers: vec![container(&[("cpu", "5")], &[])],
            overhead: None,
        };

        let reqs = pod_requests(&pod, None);
        assert_eq!(reqs, list(&[("cpu", "5"), ("memory", "1Gi")]));
    }

    #[test]
    fn test_requests_init_below_sum_keeps_sum() {
        let pod = PodResources {
            containers: vec![container(&[("memory", "1Gi")], &[])],
            init_containers: vec![container(&[("memory", "1073741824")], &[])],
            ..Default::default()
        };

        let reqs = pod_requests(&pod, None);
        // Equal values are not overwritten, so the original notation survives
        assert_eq!(reqs["memory"].to_string(), "1Gi");
    }

    #[test]
    fn test_requests_overhead() {
        let pod = PodResources {
            containers: vec![container(&[("cpu", "1")], &[])],
            overhead: Some(list(&[("cpu", "250m"), ("memory", "120Mi")])),
            ..Default::default()
        };

        let reqs = pod_requests(&pod, None);
        assert_eq!(reqs, list(&[("cpu", "1250m"), ("memory", "120Mi")]));

        let reqs = pod_requests(
            &pod,
            Some(PodResourcesOptions {
                exclude_overhead: true,
                ..Default::default()
            }),
        );
        assert_eq!(reqs, list(&[("cpu", "1")]));
    }

    #[test]
    fn test_empty_pod() {
        let pod = PodResources {
            overhead: Some(list(&[("cpu", "100m")])),
            ..Default::default()
        };

        assert_eq!(pod_requests(&pod, None), list(&[("cpu", "100m")]));
        assert!(pod_limits(&pod, None).is_empty());
        assert!(pod_requests(&PodResources::default(), None).is_empty());
    }

    #[test]
    fn test_limits_overhead_only_grows_bounded_resources() {
        let pod = PodResources {
            containers: vec![
                container(&[], &[("cpu", "2")]),
                container(&[], &[("memory", "0")]),
            ],
            overhead: Some(list(&[("cpu", "1"), ("memory", "1"), ("pods", "1")])),
            ..Default::default()
        };

        let limits = pod_limits(&pod, None);
        assert_eq!(limits, list(&[("cpu", "3"), ("memory", "0")]));
        assert!(!limits.contains_key("pods"));

        let limits = pod_limits(
            &pod,
            Some(PodResourcesOptions {
                exclude_overhead: true,
                ..Default::default()
            }),
        );
        assert_eq!(limits, list(&[("cpu", "2"), ("memory", "0")]));
    }

    #[test]
    fn test_limits_use_limits_not_requests() {
        let pod = PodResources {
            containers: vec![container(&[("cpu", "1")], &[("cpu", "4")])],
            init_containers: vec![container(&[("cpu", "8")], &[("cpu", "6")])],
            ..Default::default()
        };

        assert_eq!(pod_limits(&pod, None), list(&[("cpu", "6")]));
        assert_eq!(pod_requests(&pod, None), list(&[("cpu", "8")]));
    }

    #[test]
    fn test_reuse_clears_previous_contents() {
        let pod = PodResources {
            containers: vec![container(&[("cpu", "1")], &[])],
            overhead: Some(list(&[("memory", "64Mi")])),
            ..Default::default()
        };

        let mut stale = list(&[("cpu", "10"), ("example.com/gpu", "2")]);
        stale.reserve(16);
        let capacity = stale.capacity();

        let first = pod_requests(
            &pod,
            Some(PodResourcesOptions {
                reuse: Some(stale),
                ..Default::default()
            }),
        );
        assert_eq!(first, list(&[("cpu", "1"), ("memory", "64Mi")]));
        assert!(first.capacity() >= capacity);

        let expected = first.clone();
        let second = pod_requests(
            &pod,
            Some(PodResourcesOptions {
                reuse: Some(first),
                ..Default::default()
            }),
        );
        assert_eq!(second, expected);
    }

    #[test]
    fn test_container_fn_sees_each_container_in_order() {
        let pod = PodResources {
            containers: vec![
                container(&[("cpu", "1")], &[("cpu", "2")]),
                container(&[("cpu", "3")], &[]),
            ],
            init_containers: vec![container(&[("cpu", "4")], &[])],
            ..Default::default()
        };

        let mut seen = Vec::new();
        let mut record = |res: &ResourceList, kind: ContainerType| {
            seen.push((res.get("cpu").map(Quantity::value), kind));
        };
        pod_requests(
            &pod,
            Some(PodResourcesOptions {
                container_fn: Some(&mut record),
                ..Default::default()
            }),
        );
        assert_eq!(
            seen,
            vec![
                (Some(1), ContainerType::Containers),
                (Some(3), ContainerType::Containers),
                (Some(4), ContainerType::InitContainers),
            ]
        );

        let mut kinds = Vec::new();
        let mut record = |res: &ResourceList, kind: ContainerType| {
            kinds.push((res.len(), kind));
        };
        pod_limits(
            &pod,
            Some(PodResourcesOptions {
                container_fn: Some(&mut record),
                ..Default::default()
            }),
        );
        assert_eq!(
            kinds,
            vec![
                (1, ContainerType::Containers),
                (0, ContainerType::Containers),
                (0, ContainerType::InitContainers),
            ]
        );
    }

    #[test]
    fn test_output_is_independent_of_input() {
        let pod = PodResources {
            containers: vec![container(&[("cpu", "1"), ("memory", "1Gi")], &[])],
            init_containers: vec![container(&[("cpu", "2")], &[])],
            overhead: Some(list(&[("memory", "1Mi")])),
        };
        let before = pod.clone();

        let mut reqs = pod_requests(&pod, None);
        if let Some(cpu) = reqs.get_mut("cpu") {
            *cpu += q("10");
        }
        if let Some(memory) = reqs.get_mut("memory") {
            *memory += q("10Gi");
        }

        assert_eq!(pod, before);
        assert_eq!(pod.init_containers[0].requests["cpu"], q("2"));
    }

    fn k8s_container(name: &str, requests: &[(&str, &str)]) -> Container {
        let requests: BTreeMap<String, K8sQuantity> = requests
            .iter()
            .map(|(n, v)| (n.to_string(), K8sQuantity(v.to_string())))
            .collect();
        Container {
            name: name.to_string(),
            resources: Some(ResourceRequirements {
                requests: Some(requests),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_pod_resources_from_pod() {
        let mut pod = Pod::default();
        pod.metadata.name = Some("web".to_string());
        pod.spec = Some(PodSpec {
            containers: vec![
                k8s_container("app", &[("cpu", "500m"), ("memory", "128Mi")]),
                Container {
                    name: "sidecar".to_string(),
                    ..Default::default()
                },
            ],
            init_containers: Some(vec![k8s_container("migrate", &[("cpu", "1")])]),
            overhead: Some(
                [("cpu".to_string(), K8sQuantity("100m".to_string()))]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        });

        let resources = PodResources::try_from(&pod).unwrap();
        assert_eq!(resources.containers.len(), 2);
        assert_eq!(resources.containers[1].name, "sidecar");
        assert!(resources.containers[1].requests.is_empty());
        assert_eq!(resources.init_containers[0].name, "migrate");

        let reqs = pod_requests(&resources, None);
        assert_eq!(reqs, list(&[("cpu", "1100m"), ("memory", "128Mi")]));
    }

    #[test]
    fn test_pod_resources_errors() {
        assert!(matches!(
            PodResources::try_from(&Pod::default()),
            Err(FitcheckError::InvalidResource { .. })
        ));

        let mut pod = Pod::default();
        pod.spec = Some(PodSpec {
            containers: vec![k8s_container("app", &[("cpu", "lots")])],
            ..Default::default()
        });
        let err = PodResources::try_from(&pod).unwrap_err();
        assert!(err.to_string().contains("container app"));
    }
}
