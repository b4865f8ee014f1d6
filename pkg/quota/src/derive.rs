//! Effective quota derivation: merge a namespace's explicit override with its
//! project's default template.

use pkg_types::quota::{ContainerResourceLimit, ResourceQuotaLimit};

/// Effective aggregate quota for a namespace.
///
/// The project template defines which resources a namespace quota may carry:
/// - no template: `None`, whatever the namespace requested;
/// - template only: the template unchanged;
/// - both: every template key, taking the requested value where one is given.
///   Requested keys the template does not declare are dropped.
pub fn derive_namespace_quota(
    requested: Option<&ResourceQuotaLimit>,
    project_default: Option<&ResourceQuotaLimit>,
) -> Option<ResourceQuotaLimit> {
    match (requested, project_default) {
        (_, None) => None,
        (None, Some(default)) => Some(default.clone()),
        (Some(requested), Some(default)) => Some(complete_quota(requested, default)),
    }
}

fn complete_quota(
    requested: &ResourceQuotaLimit,
    default: &ResourceQuotaLimit,
) -> ResourceQuotaLimit {
    let requested = requested.to_resource_list();
    let mut merged = default.to_resource_list();
    for (name, value) in merged.iter_mut() {
        if let Some(v) = requested.get(name) {
            *value = v.clone();
        }
    }
    ResourceQuotaLimit::from_resource_list(&merged)
}

/// Overlay the namespace's container limits onto the project template.
///
/// Every template key takes the namespace value if it declares one. Returns
/// `None` ("no override") when the result is the template unchanged.
pub fn merge_container_limit(
    namespace: &ContainerResourceLimit,
    template: &ContainerResourceLimit,
) -> Option<ContainerResourceLimit> {
    let overrides = namespace.to_resource_list();
    let original = template.to_resource_list();
    let mut merged = original.clone();
    for (name, value) in merged.iter_mut() {
        if let Some(v) = overrides.get(name) {
            *value = v.clone();
        }
    }
    if merged == original {
        return None;
    }
    Some(ContainerResourceLimit::from_resource_list(&merged))
}

/// Effective container default limit for a namespace. An effective limit with
/// nothing set is `None`.
pub fn derive_container_limit(
    namespace: Option<&ContainerResourceLimit>,
    template: Option<&ContainerResourceLimit>,
) -> Option<ContainerResourceLimit> {
    let effective = match (namespace, template) {
        (Some(ns), Some(template)) => {
            Some(merge_container_limit(ns, template).unwrap_or_else(|| template.clone()))
        }
        (Some(ns), None) => Some(ns.clone()),
        (None, Some(template)) => Some(template.clone()),
        (None, None) => None,
    };
    effective.filter(|limit| !limit.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pods(n: &str) -> ResourceQuotaLimit {
        ResourceQuotaLimit {
            pods: Some(n.into()),
            ..Default::default()
        }
    }

    #[test]
    fn template_only_applies_unmodified() {
        let default = pods("2");
        assert_eq!(derive_namespace_quota(None, Some(&default)), Some(default));
    }

    #[test]
    fn no_template_means_no_quota() {
        assert_eq!(derive_namespace_quota(Some(&pods("5")), None), None);
        assert_eq!(derive_namespace_quota(None, None), None);
    }

    #[test]
    fn requested_value_wins_for_template_keys() {
        let default = ResourceQuotaLimit {
            pods: Some("2".into()),
            limits_cpu: Some("1".into()),
            ..Default::default()
        };
        let effective = derive_namespace_quota(Some(&pods("1")), Some(&default)).unwrap();
        assert_eq!(effective.pods.as_deref(), Some("1"));
        assert_eq!(effective.limits_cpu.as_deref(), Some("1"));
    }

    #[test]
    fn keys_outside_template_are_dropped() {
        let requested = ResourceQuotaLimit {
            pods: Some("1".into()),
            secrets: Some("10".into()),
            ..Default::default()
        };
        let effective = derive_namespace_quota(Some(&requested), Some(&pods("2"))).unwrap();
        assert_eq!(effective, pods("1"));
        assert!(effective.secrets.is_none());
    }

    #[test]
    fn container_merge_overrides_template_keys() {
        let template = ContainerResourceLimit {
            limits_cpu: Some("500m".into()),
            limits_memory: Some("256Mi".into()),
            ..Default::default()
        };
        let ns = ContainerResourceLimit {
            limits_cpu: Some("1".into()),
            requests_cpu: Some("100m".into()),
            ..Default::default()
        };
        let merged = merge_container_limit(&ns, &template).unwrap();
        assert_eq!(merged.limits_cpu.as_deref(), Some("1"));
        assert_eq!(merged.limits_memory.as_deref(), Some("256Mi"));
        assert!(merged.requests_cpu.is_none());
    }

    #[test]
    fn container_merge_identical_to_template_is_no_override() {
        let template = ContainerResourceLimit {
            limits_cpu: Some("500m".into()),
            ..Default::default()
        };
        assert_eq!(merge_container_limit(&template.clone(), &template), None);
        assert_eq!(
            derive_container_limit(Some(&template), Some(&template)),
            Some(template)
        );
    }

    #[test]
    fn container_limit_sides() {
        let limit = ContainerResourceLimit {
            requests_memory: Some("64Mi".into()),
            ..Default::default()
        };
        assert_eq!(derive_container_limit(Some(&limit), None), Some(limit.clone()));
        assert_eq!(derive_container_limit(None, Some(&limit)), Some(limit));
        assert_eq!(derive_container_limit(None, None), None);
        assert_eq!(
            derive_container_limit(Some(&ContainerResourceLimit::default()), None),
            None
        );
    }
}
