//! Project → member namespace index.
//!
//! Fed from the store's change stream by the controller manager. Lookups are
//! lock-free map reads and only eventually consistent with the store; callers
//! that need the authoritative copy of a member re-read it from the store.

use dashmap::DashMap;
use std::collections::HashMap;

use pkg_types::namespace::Namespace;

#[derive(Debug, Default)]
pub struct NamespaceIndex {
    /// project id → namespace name → latest snapshot
    by_project: DashMap<String, HashMap<String, Namespace>>,
    /// namespace name → project id
    project_of: DashMap<String, String>,
}

impl NamespaceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest snapshot of a namespace. Returns the project it
    /// belonged to before when that differs from its current project.
    pub fn upsert(&self, ns: &Namespace) -> Option<String> {
        let previous = match &ns.project_id {
            Some(project_id) => self.project_of.insert(ns.name.clone(), project_id.clone()),
            None => self.project_of.remove(&ns.name).map(|(_, p)| p),
        };

        let moved_from = previous.filter(|prev| Some(prev) != ns.project_id.as_ref());
        if let Some(prev) = &moved_from {
            self.detach(prev, &ns.name);
        }
        if let Some(project_id) = &ns.project_id {
            self.by_project
                .entry(project_id.clone())
                .or_default()
                .insert(ns.name.clone(), ns.clone());
        }
        moved_from
    }

    /// Forget a namespace, returning its last snapshot if it had a project.
    pub fn remove(&self, name: &str) -> Option<Namespace> {
        let (_, project_id) = self.project_of.remove(name)?;
        let snapshot = self
            .by_project
            .get_mut(&project_id)
            .and_then(|mut members| members.remove(name));
        self.by_project
            .remove_if(&project_id, |_, members| members.is_empty());
        snapshot
    }

    /// Snapshots of every namespace currently known to belong to `project_id`.
    pub fn by_project(&self, project_id: &str) -> Vec<Namespace> {
        self.by_project
            .get(project_id)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn project_of(&self, name: &str) -> Option<String> {
        self.project_of.get(name).map(|p| p.value().clone())
    }

    /// Replace the whole index with `namespaces`.
    pub fn rebuild(&self, namespaces: impl IntoIterator<Item = Namespace>) {
        self.by_project.clear();
        self.project_of.clear();
        for ns in namespaces {
            self.upsert(&ns);
        }
    }

    fn detach(&self, project_id: &str, name: &str) {
        if let Some(mut members) = self.by_project.get_mut(project_id) {
            members.remove(name);
        }
        self.by_project
            .remove_if(project_id, |_, members| members.is_empty());
    }
}
