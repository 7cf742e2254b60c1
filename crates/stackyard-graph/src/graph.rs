//! Resource graph model
//!
//! A [`Graph`] records, per (project, workspace), every managed resource and
//! its latest apply status. Resources sit in exactly one of three category
//! collections; a derived index maps each id to its category so lookups and
//! removals need no search. The index is never persisted and is rebuilt with
//! [`GraphResources::update_resource_index`] after loading.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use stackyard_core::validate_scope;

use crate::error::{GraphError, Result};

/// Collection a resource belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceCategory {
    /// The application's primary deployable unit
    Workload,
    /// Something the workload depends on
    Dependency,
    Other,
}

impl ResourceCategory {
    /// Categories in lookup precedence order
    pub const ALL: [ResourceCategory; 3] = [Self::Workload, Self::Dependency, Self::Other];
}

impl std::fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Workload => "workload",
            Self::Dependency => "dependency",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// Latest apply outcome of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GraphResourceStatus {
    ApplySucceed,
    /// Initial status until the apply engine reports success
    #[default]
    ApplyFail,
}

/// Apply-status marker for one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphResource {
    pub id: String,

    /// Kind or Terraform resource type
    #[serde(rename = "type", default)]
    pub resource_type: String,

    #[serde(default)]
    pub name: String,

    /// Provider-side identifier, such as an ARN; empty for Kubernetes
    #[serde(default)]
    pub cloud_resource_id: String,

    #[serde(default)]
    pub status: GraphResourceStatus,

    /// Ids this resource depends on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    /// Ids depending on this resource
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependents: Vec<String>,
}

impl GraphResource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resource_type: String::new(),
            name: String::new(),
            cloud_resource_id: String::new(),
            status: GraphResourceStatus::ApplyFail,
            dependencies: Vec::new(),
            dependents: Vec::new(),
        }
    }
}

/// Index entry: where a resource lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    pub id: String,
    pub category: ResourceCategory,
}

type Collection = BTreeMap<String, GraphResource>;

/// The three disjoint category collections and their index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphResources {
    #[serde(default)]
    pub workload_resources: Collection,

    #[serde(default)]
    pub dependency_resources: Collection,

    #[serde(default)]
    pub other_resources: Collection,

    #[serde(skip)]
    resource_index: BTreeMap<String, ResourceEntry>,
}

impl GraphResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(&self, category: ResourceCategory) -> &Collection {
        match category {
            ResourceCategory::Workload => &self.workload_resources,
            ResourceCategory::Dependency => &self.dependency_resources,
            ResourceCategory::Other => &self.other_resources,
        }
    }

    fn collection_mut(&mut self, category: ResourceCategory) -> &mut Collection {
        match category {
            ResourceCategory::Workload => &mut self.workload_resources,
            ResourceCategory::Dependency => &mut self.dependency_resources,
            ResourceCategory::Other => &mut self.other_resources,
        }
    }

    /// Add or replace a resource in `category`, re-deriving its index entry
    ///
    /// A resource already filed under another category is moved.
    pub fn add_graph_resource(&mut self, resource: GraphResource, category: ResourceCategory) {
        match self.category_of(&resource.id) {
            Some(previous) if previous != category => {
                self.collection_mut(previous).remove(&resource.id);
            }
            _ => {}
        }
        let id = resource.id.clone();
        self.collection_mut(category).insert(id.clone(), resource);
        self.resource_index
            .insert(id.clone(), ResourceEntry { id, category });
    }

    /// Rebuild the index from the category collections
    ///
    /// An id found in more than one collection is kept in the first by
    /// [`ResourceCategory::ALL`] order and dropped from the others.
    pub fn update_resource_index(&mut self) {
        self.resource_index.clear();
        for category in ResourceCategory::ALL {
            let ids: Vec<String> = self.collection(category).keys().cloned().collect();
            for id in ids {
                if let Some(entry) = self.resource_index.get(&id) {
                    warn!(
                        id = %id,
                        kept = %entry.category,
                        dropped = %category,
                        "resource filed under two categories"
                    );
                    self.collection_mut(category).remove(&id);
                    continue;
                }
                self.resource_index
                    .insert(id.clone(), ResourceEntry { id, category });
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.resource_index.contains_key(id)
    }

    pub fn category_of(&self, id: &str) -> Option<ResourceCategory> {
        self.resource_index.get(id).map(|entry| entry.category)
    }

    pub fn resource_index(&self) -> &BTreeMap<String, ResourceEntry> {
        &self.resource_index
    }

    pub fn find_graph_resource_by_id(&self, id: &str) -> Option<&GraphResource> {
        let category = self.category_of(id)?;
        self.collection(category).get(id)
    }

    pub fn find_graph_resource_by_id_mut(&mut self, id: &str) -> Option<&mut GraphResource> {
        let category = self.category_of(id)?;
        self.collection_mut(category).get_mut(id)
    }

    /// The collection holding `id`
    pub fn find_graph_resource_collection_by_id(&self, id: &str) -> Option<&Collection> {
        self.category_of(id).map(|category| self.collection(category))
    }

    /// Remove a resource from its collection and from the index
    ///
    /// The removed id is also dropped from the links of its neighbours.
    pub fn remove_resource(&mut self, id: &str) -> Option<GraphResource> {
        let entry = self.resource_index.remove(id)?;
        let removed = self.collection_mut(entry.category).remove(id)?;
        for neighbour in removed.dependencies.iter().chain(&removed.dependents) {
            if let Some(resource) = self.find_graph_resource_by_id_mut(neighbour) {
                resource.dependencies.retain(|other| other != id);
                resource.dependents.retain(|other| other != id);
            }
        }
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.resource_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resource_index.is_empty()
    }
}

/// Resource graph for one (project, workspace)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Graph {
    pub project: String,
    pub workspace: String,
    #[serde(default)]
    pub resources: GraphResources,
}

impl Graph {
    pub fn new(project: impl Into<String>, workspace: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            workspace: workspace.into(),
            resources: GraphResources::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_scope(&self.project, &self.workspace)?;
        Ok(())
    }

    /// Record the apply outcome of a resource
    pub fn update_resource_status(&mut self, id: &str, status: GraphResourceStatus) -> Result<()> {
        let resource = self
            .resources
            .find_graph_resource_by_id_mut(id)
            .ok_or_else(|| GraphError::ResourceNotFound { id: id.to_string() })?;
        resource.status = status;
        Ok(())
    }
}
