//! Does a namespace quota, together with its siblings, fit under the project cap?

use pkg_types::quantity::{Quantity, QuantityError};
use pkg_types::quota::ResourceQuotaLimit;
use pkg_types::resources::ResourceAmountSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaFit {
    Fits,
    /// Total of candidate and siblings, restricted to the offending resources.
    Exceeded(ResourceAmountSet),
}

impl QuotaFit {
    pub fn fits(&self) -> bool {
        matches!(self, QuotaFit::Fits)
    }

    pub fn exceeded(&self) -> Option<&ResourceAmountSet> {
        match self {
            QuotaFit::Fits => None,
            QuotaFit::Exceeded(set) => Some(set),
        }
    }
}

/// Check `candidate` plus every sibling limit against `project_limit`.
///
/// A resource is exceeded when the sum is greater than the cap (the sum may
/// equal it), or when the candidate itself declares a negative amount.
/// Resources the cap does not declare are unconstrained.
pub fn is_quota_fit(
    candidate: &ResourceQuotaLimit,
    siblings: &[ResourceQuotaLimit],
    project_limit: &ResourceQuotaLimit,
) -> Result<QuotaFit, QuantityError> {
    let candidate = ResourceAmountSet::from_list(&candidate.to_resource_list())?;
    let cap = ResourceAmountSet::from_list(&project_limit.to_resource_list())?;

    let mut total = candidate.clone();
    for sibling in siblings {
        total.add(&ResourceAmountSet::from_list(&sibling.to_resource_list())?);
    }

    let mut exceeded = total.exceeded_keys(&cap);
    for key in candidate.negative_keys() {
        if !exceeded.contains(&key) {
            exceeded.push(key);
        }
    }

    if exceeded.is_empty() {
        Ok(QuotaFit::Fits)
    } else {
        Ok(QuotaFit::Exceeded(total.mask(&exceeded)))
    }
}

/// Copy of `limit` with every exceeded resource set to zero.
pub fn zero_out_exceeded(
    limit: &ResourceQuotaLimit,
    exceeded: &ResourceAmountSet,
) -> ResourceQuotaLimit {
    let mut list = limit.to_resource_list();
    for name in exceeded.keys() {
        list.insert(name.clone(), Quantity::zero().to_string());
    }
    ResourceQuotaLimit::from_resource_list(&list)
}

/// Status message recorded on a namespace whose quota does not fit.
pub fn exceeded_message(exceeded: &ResourceAmountSet) -> String {
    format!("Resource quota [{}] exceeds project limit", exceeded)
}
