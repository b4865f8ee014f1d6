//! Conversion of effective limits into object specs, and the create / update /
//! delete decision against what is currently stored.

use pkg_types::limit_range::{LimitRangeItem, LimitRangeSpec, LimitType};
use pkg_types::quantity::QuantityError;
use pkg_types::quota::{ContainerResourceLimit, ResourceQuotaLimit, ResourceQuotaSpec};
use pkg_types::resources::{ResourceAmountSet, ResourceList};

/// What to do with a namespace's derived object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOp {
    NoOp,
    Create,
    Update,
    Delete,
}

/// Quota spec with every quantity validated and rendered canonically.
pub fn quota_spec(limit: &ResourceQuotaLimit) -> Result<ResourceQuotaSpec, QuantityError> {
    let hard = ResourceAmountSet::from_list(&limit.to_resource_list())?.to_list();
    Ok(ResourceQuotaSpec { hard })
}

/// Limit range spec with a single `Container` item: `limits.*` resources become
/// defaults, `requests.*` resources become default requests.
pub fn limit_range_spec(limit: &ContainerResourceLimit) -> Result<LimitRangeSpec, QuantityError> {
    let mut default = ResourceList::new();
    let mut default_request = ResourceList::new();
    for (name, value) in ResourceAmountSet::from_list(&limit.to_resource_list())?.to_list() {
        if let Some(resource) = name.strip_prefix("limits.") {
            default.insert(resource.to_string(), value);
        } else if let Some(resource) = name.strip_prefix("requests.") {
            default_request.insert(resource.to_string(), value);
        }
    }
    Ok(LimitRangeSpec {
        limits: vec![LimitRangeItem {
            limit_type: LimitType::Container,
            default,
            default_request,
        }],
    })
}

/// Quantity-semantic equality of two resource lists ("1000m" == "1").
/// A stored list that no longer parses never equals the desired one.
fn lists_equal(existing: &ResourceList, desired: &ResourceList) -> Result<bool, QuantityError> {
    let desired = ResourceAmountSet::from_list(desired)?;
    Ok(ResourceAmountSet::from_list(existing).is_ok_and(|existing| existing == desired))
}

/// Decide the resource quota operation. An empty desired spec counts as none.
pub fn decide_quota_op(
    existing: Option<&ResourceQuotaSpec>,
    desired: Option<&ResourceQuotaSpec>,
) -> Result<SyncOp, QuantityError> {
    let desired = desired.filter(|spec| !spec.hard.is_empty());
    Ok(match (existing, desired) {
        (None, None) => SyncOp::NoOp,
        (None, Some(_)) => SyncOp::Create,
        (Some(_), None) => SyncOp::Delete,
        (Some(existing), Some(desired)) => {
            if lists_equal(&existing.hard, &desired.hard)? {
                SyncOp::NoOp
            } else {
                SyncOp::Update
            }
        }
    })
}

/// Decide the limit range operation. Only the first item's `default` and
/// `default_request` are compared.
pub fn decide_limit_range_op(
    existing: Option<&LimitRangeSpec>,
    desired: Option<&LimitRangeSpec>,
) -> Result<SyncOp, QuantityError> {
    Ok(match (existing, desired) {
        (None, None) => SyncOp::NoOp,
        (None, Some(_)) => SyncOp::Create,
        (Some(_), None) => SyncOp::Delete,
        (Some(existing), Some(desired)) => {
            if limits_changed(&existing.limits, &desired.limits)? {
                SyncOp::Update
            } else {
                SyncOp::NoOp
            }
        }
    })
}

fn limits_changed(
    existing: &[LimitRangeItem],
    desired: &[LimitRangeItem],
) -> Result<bool, QuantityError> {
    if existing.len() != desired.len() {
        return Ok(true);
    }
    let (Some(existing), Some(desired)) = (existing.first(), desired.first()) else {
        return Ok(true);
    };
    Ok(!lists_equal(&existing.default_request, &desired.default_request)?
        || !lists_equal(&existing.default, &desired.default)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hard(pairs: &[(&str, &str)]) -> ResourceQuotaSpec {
        ResourceQuotaSpec {
            hard: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn quota_decisions() {
        let two = hard(&[("pods", "2")]);
        let empty = hard(&[]);
        assert_eq!(decide_quota_op(None, None).unwrap(), SyncOp::NoOp);
        assert_eq!(decide_quota_op(None, Some(&empty)).unwrap(), SyncOp::NoOp);
        assert_eq!(decide_quota_op(None, Some(&two)).unwrap(), SyncOp::Create);
        assert_eq!(decide_quota_op(Some(&two), Some(&empty)).unwrap(), SyncOp::Delete);
        assert_eq!(decide_quota_op(Some(&two), None).unwrap(), SyncOp::Delete);
        assert_eq!(
            decide_quota_op(Some(&two), Some(&hard(&[("pods", "3")]))).unwrap(),
            SyncOp::Update
        );
    }

    #[test]
    fn unchanged_means_quantity_equal() {
        let existing = hard(&[("limits.cpu", "1000m")]);
        let desired = hard(&[("limits.cpu", "1")]);
        assert_eq!(
            decide_quota_op(Some(&existing), Some(&desired)).unwrap(),
            SyncOp::NoOp
        );
        // A new key is a change even when shared keys match.
        let desired = hard(&[("limits.cpu", "1"), ("pods", "1")]);
        assert_eq!(
            decide_quota_op(Some(&existing), Some(&desired)).unwrap(),
            SyncOp::Update
        );
    }

    #[test]
    fn quota_spec_is_canonical() {
        let limit = ResourceQuotaLimit {
            limits_cpu: Some("2000m".into()),
            requests_memory: Some("1024Mi".into()),
            ..Default::default()
        };
        let spec = quota_spec(&limit).unwrap();
        assert_eq!(spec.hard.get("limits.cpu").map(String::as_str), Some("2"));
        assert_eq!(spec.hard.get("requests.memory").map(String::as_str), Some("1Gi"));

        let bad = ResourceQuotaLimit {
            pods: Some("many".into()),
            ..Default::default()
        };
        assert!(quota_spec(&bad).is_err());
    }

    #[test]
    fn limit_range_spec_splits_requests_and_limits() {
        let limit = ContainerResourceLimit {
            requests_cpu: Some("100m".into()),
            limits_cpu: Some("500m".into()),
            limits_memory: Some("256Mi".into()),
            ..Default::default()
        };
        let spec = limit_range_spec(&limit).unwrap();
        assert_eq!(spec.limits.len(), 1);
        let item = &spec.limits[0];
        assert_eq!(item.limit_type, LimitType::Container);
        assert_eq!(item.default.get("cpu").map(String::as_str), Some("500m"));
        assert_eq!(item.default.get("memory").map(String::as_str), Some("256Mi"));
        assert_eq!(item.default_request.get("cpu").map(String::as_str), Some("100m"));
        assert!(item.default_request.get("memory").is_none());
    }

    #[test]
    fn limit_range_decisions() {
        let small = limit_range_spec(&ContainerResourceLimit {
            limits_cpu: Some("500m".into()),
            ..Default::default()
        })
        .unwrap();
        let same = limit_range_spec(&ContainerResourceLimit {
            limits_cpu: Some("0.5".into()),
            ..Default::default()
        })
        .unwrap();
        let large = limit_range_spec(&ContainerResourceLimit {
            limits_cpu: Some("1".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(decide_limit_range_op(None, Some(&small)).unwrap(), SyncOp::Create);
        assert_eq!(decide_limit_range_op(Some(&small), None).unwrap(), SyncOp::Delete);
        assert_eq!(decide_limit_range_op(Some(&small), Some(&same)).unwrap(), SyncOp::NoOp);
        assert_eq!(decide_limit_range_op(Some(&small), Some(&large)).unwrap(), SyncOp::Update);
        assert_eq!(
            decide_limit_range_op(Some(&LimitRangeSpec::default()), Some(&small)).unwrap(),
            SyncOp::Update
        );
    }
}
