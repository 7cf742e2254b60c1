//! Kind-precedence dependency ordering for Kubernetes resources
//!
//! Appliers walk `dependsOn` edges to decide what to apply (or delete) first.
//! The orderer injects those edges from a fixed precedence over Kubernetes
//! kinds: every resource depends on all resources whose kind comes strictly
//! before its own.
//!
//! ```text
//! precedence: Namespace < Service < Deployment
//!
//! Namespace/shop     dependsOn: []
//! Service/web        dependsOn: [Namespace/shop]
//! Deployment/web     dependsOn: [Namespace/shop, Service/web]
//! ```
//!
//! The orderer appends and never de-duplicates, so it must run exactly once
//! per spec-generation pass.

use std::collections::HashMap;

use tracing::debug;

use crate::resource::{Resource, ResourceType};

/// Default Kubernetes kind precedence
pub const DEFAULT_ORDERED_KINDS: &[&str] = &[
    "Namespace",
    "ResourceQuota",
    "StorageClass",
    "CustomResourceDefinition",
    "ServiceAccount",
    "PodSecurityPolicy",
    "Role",
    "ClusterRole",
    "RoleBinding",
    "ClusterRoleBinding",
    "ConfigMap",
    "Secret",
    "Endpoints",
    "Service",
    "LimitRange",
    "PriorityClass",
    "PersistentVolume",
    "PersistentVolumeClaim",
    "Deployment",
    "StatefulSet",
    "CronJob",
    "PodDisruptionBudget",
    "MutatingWebhookConfiguration",
    "ValidatingWebhookConfiguration",
];

/// What a resource whose kind is absent from the precedence list depends on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownKindPolicy {
    /// Depend on every listed kind (compatible with existing dependency graphs)
    #[default]
    DependOnAll,
    /// Leave the resource without injected dependencies
    NoDependencies,
}

/// Kind precedence used to inject `dependsOn` edges
#[derive(Debug, Clone)]
pub struct OrderedKinds {
    kinds: Vec<String>,
    unknown_kind: UnknownKindPolicy,
}

impl Default for OrderedKinds {
    fn default() -> Self {
        Self::new(DEFAULT_ORDERED_KINDS.iter().copied())
    }
}

impl OrderedKinds {
    pub fn new<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kinds: kinds.into_iter().map(Into::into).collect(),
            unknown_kind: UnknownKindPolicy::default(),
        }
    }

    pub fn with_unknown_kind_policy(mut self, policy: UnknownKindPolicy) -> Self {
        self.unknown_kind = policy;
        self
    }

    pub fn kinds(&self) -> &[String] {
        &self.kinds
    }

    /// Kinds a resource of `kind` must wait for
    ///
    /// Walks the list from the start and stops at the first exact match.
    pub fn preceding_kinds(&self, kind: &str) -> &[String] {
        match self.kinds.iter().position(|k| k == kind) {
            Some(idx) => &self.kinds[..idx],
            None => match self.unknown_kind {
                UnknownKindPolicy::DependOnAll => &self.kinds,
                UnknownKindPolicy::NoDependencies => &[],
            },
        }
    }

    /// Append kind-precedence dependencies to every Kubernetes resource
    ///
    /// Resources of the same kind never depend on each other. Existing
    /// `dependsOn` entries are kept and new ones appended after them.
    pub fn order(&self, resources: &mut [Resource]) {
        let mut ids_by_kind: HashMap<String, Vec<String>> = HashMap::new();
        for resource in resources.iter() {
            if resource.resource_type != ResourceType::Kubernetes {
                continue;
            }
            if let Some(kind) = resource.kind() {
                ids_by_kind
                    .entry(kind.to_string())
                    .or_default()
                    .push(resource.id.clone());
            }
        }

        for resource in resources.iter_mut() {
            if resource.resource_type != ResourceType::Kubernetes {
                continue;
            }
            let kind = resource.kind().unwrap_or_default().to_string();
            let before = resource.depends_on.len();
            for preceding in self.preceding_kinds(&kind) {
                if let Some(ids) = ids_by_kind.get(preceding) {
                    resource.depends_on.extend(ids.iter().cloned());
                }
            }
            debug!(
                resource = %resource.id,
                kind = %kind,
                added = resource.depends_on.len() - before,
                "injected kind dependencies"
            );
        }
    }
}
