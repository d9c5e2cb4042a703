use fitcheck_core::Pod;

/// Priority of pods created before any default priority class existed
pub const DEFAULT_POD_PRIORITY: i32 = 0;

/// Priority of the given pod, falling back to [`DEFAULT_POD_PRIORITY`]
pub fn pod_priority(pod: &Pod) -> i32 {
    pod.spec
        .as_ref()
        .and_then(|spec| spec.priority)
        .unwrap_or(DEFAULT_POD_PRIORITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitcheck_core::k8s_openapi::api::core::v1::PodSpec;

    #[test]
    fn test_pod_priority() {
        let mut pod = Pod::default();
        assert_eq!(pod_priority(&pod), DEFAULT_POD_PRIORITY);

        pod.spec = Some(PodSpec::default());
        assert_eq!(pod_priority(&pod), DEFAULT_POD_PRIORITY);

        pod.spec.as_mut().unwrap().priority = Some(2_000_000_000);
        assert_eq!(pod_priority(&pod), 2_000_000_000);

        pod.spec.as_mut().unwrap().priority = Some(-10);
        assert_eq!(pod_priority(&pod), -10);
    }
}
