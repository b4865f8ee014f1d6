use pkg_constants::state::EVENT_LOG_CAPACITY;
use pkg_state::client::StateStore;
use pkg_state::index::NamespaceIndex;
use pkg_types::namespace::Namespace;
use pkg_types::project::Project;
use pkg_types::quota::{NamespaceResourceQuota, ProjectResourceQuota, ResourceQuotaLimit};

pub(crate) async fn store() -> StateStore {
    StateStore::in_memory(EVENT_LOG_CAPACITY).await.unwrap()
}

pub(crate) fn limit(pairs: &[(&str, &str)]) -> ResourceQuotaLimit {
    ResourceQuotaLimit::from_resource_list(
        &pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

/// A project with an optional aggregate cap and namespace default template.
pub(crate) fn project(
    id: &str,
    cap: Option<&[(&str, &str)]>,
    default: Option<&[(&str, &str)]>,
) -> Project {
    let mut project = Project::new(id);
    project.spec.resource_quota = cap.map(|pairs| ProjectResourceQuota {
        limit: limit(pairs),
        used_limit: ResourceQuotaLimit::default(),
    });
    project.spec.namespace_default_resource_quota =
        default.map(|pairs| NamespaceResourceQuota { limit: limit(pairs) });
    project
}

/// Store a namespace and register it in the index.
pub(crate) async fn add_namespace(
    store: &StateStore,
    index: &NamespaceIndex,
    ns: Namespace,
) -> Namespace {
    let ns = store.create_resource(ns).await.unwrap();
    index.upsert(&ns);
    ns
}

pub(crate) async fn get_namespace(store: &StateStore, name: &str) -> Namespace {
    store
        .get_resource(&Namespace::key_for(name))
        .await
        .unwrap()
        .unwrap()
}

pub(crate) async fn get_project(store: &StateStore, id: &str) -> Project {
    store
        .get_resource(&Project::key_for(id))
        .await
        .unwrap()
        .unwrap()
}
