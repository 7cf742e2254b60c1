//! Resource, Spec and State value types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Extension key marking a resource as the application's primary workload
pub const WORKLOAD_EXTENSION_KEY: &str = "stackyard.io/is-workload";

/// Attribute holding the Kubernetes kind of a resource
pub const KIND_ATTRIBUTE: &str = "kind";

/// Medium a resource is applied through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Kubernetes,
    Terraform,
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kubernetes => write!(f, "Kubernetes"),
            Self::Terraform => write!(f, "Terraform"),
        }
    }
}

/// A single infrastructure resource
///
/// The `id` is produced by the generator layer and is the join key between
/// a [`Spec`] and a [`State`]:
/// - Kubernetes: `apiVersion:kind:namespace:name` (namespace omitted for
///   cluster-scoped kinds)
/// - Terraform: `namespace:provider:type:name`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,

    #[serde(rename = "type")]
    pub resource_type: ResourceType,

    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, Value>,
}

impl Resource {
    pub fn new(id: impl Into<String>, resource_type: ResourceType) -> Self {
        Self {
            id: id.into(),
            resource_type,
            attributes: BTreeMap::new(),
            depends_on: Vec::new(),
            extensions: BTreeMap::new(),
        }
    }

    /// Set an attribute (builder style)
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set an extension (builder style)
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// Add a dependency (builder style)
    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.depends_on.push(id.into());
        self
    }

    /// Flag this resource as the primary workload
    pub fn as_workload(self) -> Self {
        self.with_extension(WORKLOAD_EXTENSION_KEY, true)
    }

    /// Kubernetes kind, read from the `kind` attribute
    pub fn kind(&self) -> Option<&str> {
        self.attributes.get(KIND_ATTRIBUTE).and_then(Value::as_str)
    }

    /// Whether the workload extension is set
    ///
    /// Accepts both a boolean `true` and the string `"true"`.
    pub fn is_workload(&self) -> bool {
        match self.extensions.get(WORKLOAD_EXTENSION_KEY) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }
}

/// Desired resources for one release attempt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spec {
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// Resources known to exist after the last apply or destroy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    #[serde(default)]
    pub resources: Vec<Resource>,
}

macro_rules! resource_collection {
    ($ty:ty) => {
        impl $ty {
            pub fn new(resources: Vec<Resource>) -> Self {
                Self { resources }
            }

            pub fn is_empty(&self) -> bool {
                self.resources.is_empty()
            }

            pub fn len(&self) -> usize {
                self.resources.len()
            }

            /// Find a resource by id
            pub fn find(&self, id: &str) -> Option<&Resource> {
                self.resources.iter().find(|r| r.id == id)
            }
        }
    };
}

resource_collection!(Spec);
resource_collection!(State);
