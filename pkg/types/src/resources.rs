use std::collections::BTreeMap;
use std::fmt;

use crate::quantity::{Quantity, QuantityError};

/// Sparse resource-name → quantity-string map, as stored on objects.
pub type ResourceList = BTreeMap<String, String>;

/// Canonical sparse resource-name → `Quantity` map used for quota arithmetic.
///
/// Keys are kept sorted so that rendering and exceeded-key reporting are
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceAmountSet(BTreeMap<String, Quantity>);

impl ResourceAmountSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every quantity in `list`. Fails on the first malformed value.
    pub fn from_list(list: &ResourceList) -> Result<Self, QuantityError> {
        list.iter()
            .map(|(name, value)| Quantity::parse(value).map(|q| (name.clone(), q)))
            .collect()
    }

    pub fn to_list(&self) -> ResourceList {
        self.0
            .iter()
            .map(|(name, q)| (name.clone(), q.to_string()))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&Quantity> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Quantity)> {
        self.0.iter()
    }

    /// Elementwise add. A key appears in the result if either side declares it.
    pub fn add(&mut self, other: &ResourceAmountSet) {
        for (name, q) in &other.0 {
            self.0
                .entry(name.clone())
                .and_modify(|existing| *existing = *existing + *q)
                .or_insert(*q);
        }
    }

    /// Keys declared on both sides where `self` is greater than `cap`.
    /// Keys absent from `cap` are unconstrained.
    pub fn exceeded_keys(&self, cap: &ResourceAmountSet) -> Vec<String> {
        self.0
            .iter()
            .filter(|(name, q)| cap.0.get(*name).is_some_and(|limit| *q > limit))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn negative_keys(&self) -> Vec<String> {
        self.0
            .iter()
            .filter(|(_, q)| q.is_negative())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Projection onto `keys`; keys not present in `self` are skipped.
    pub fn mask<S: AsRef<str>>(&self, keys: &[S]) -> ResourceAmountSet {
        keys.iter()
            .filter_map(|k| {
                self.0
                    .get_key_value(k.as_ref())
                    .map(|(name, q)| (name.clone(), *q))
            })
            .collect()
    }
}

impl FromIterator<(String, Quantity)> for ResourceAmountSet {
    fn from_iter<I: IntoIterator<Item = (String, Quantity)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for ResourceAmountSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(name, q)| format!("{}={}", name, q))
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(pairs: &[(&str, &str)]) -> ResourceAmountSet {
        let list: ResourceList = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ResourceAmountSet::from_list(&list).unwrap()
    }

    #[test]
    fn add_unions_keys() {
        let mut sum = set(&[("pods", "2"), ("limits.cpu", "500m")]);
        sum.add(&set(&[("pods", "2"), ("requests.memory", "1Gi")]));
        assert_eq!(sum.get("pods"), Some(&Quantity::from_units(4)));
        assert_eq!(sum.len(), 3);
        assert_eq!(sum.to_string(), "limits.cpu=500m,pods=4,requests.memory=1Gi");
    }

    #[test]
    fn exceeded_keys_uses_less_or_equal() {
        let cap = set(&[("pods", "3"), ("limits.cpu", "1")]);
        assert!(set(&[("pods", "3"), ("limits.cpu", "1000m")]).exceeded_keys(&cap).is_empty());
        assert_eq!(set(&[("pods", "4")]).exceeded_keys(&cap), vec!["pods"]);
        // Not declared by the cap: unconstrained.
        assert!(set(&[("secrets", "100")]).exceeded_keys(&cap).is_empty());
    }

    #[test]
    fn negative_keys_and_mask() {
        let s = set(&[("pods", "-1"), ("services", "2")]);
        assert_eq!(s.negative_keys(), vec!["pods"]);
        let masked = s.mask(&["services", "secrets"]);
        assert_eq!(masked.to_string(), "services=2");
    }

    #[test]
    fn from_list_reports_bad_quantity() {
        let mut list = ResourceList::new();
        list.insert("pods".into(), "lots".into());
        assert!(ResourceAmountSet::from_list(&list).is_err());
    }
}
