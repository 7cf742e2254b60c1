//! Validation run before any release is persisted

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::error::{CoreError, Result};
use crate::release::Release;
use crate::resource::{Resource, Spec, State};

/// Validate a release and the resources it carries
pub fn validate_release(release: &Release) -> Result<()> {
    if release.project.is_empty() {
        return Err(CoreError::EmptyProject);
    }
    if release.workspace.is_empty() {
        return Err(CoreError::EmptyWorkspace);
    }
    if release.revision == 0 {
        return Err(CoreError::EmptyRevision);
    }
    if release.stack.is_empty() {
        return Err(CoreError::EmptyStack);
    }
    let spec = release.spec.as_ref().ok_or(CoreError::EmptySpec)?;
    validate_spec(spec)?;
    let state = release.state.as_ref().ok_or(CoreError::EmptyState)?;
    validate_state(state)?;
    if release.create_time == DateTime::<Utc>::default() {
        return Err(CoreError::EmptyCreateTime);
    }
    if release.modified_time == DateTime::<Utc>::default() {
        return Err(CoreError::EmptyModifiedTime);
    }
    Ok(())
}

pub fn validate_spec(spec: &Spec) -> Result<()> {
    validate_resources(&spec.resources)
}

pub fn validate_state(state: &State) -> Result<()> {
    validate_resources(&state.resources)
}

/// Every resource needs a non-empty id, unique within the collection
pub fn validate_resources(resources: &[Resource]) -> Result<()> {
    let mut seen = HashSet::with_capacity(resources.len());
    for resource in resources {
        if resource.id.is_empty() {
            return Err(CoreError::EmptyResourceId);
        }
        if !seen.insert(resource.id.as_str()) {
            return Err(CoreError::DuplicateResourceKey {
                id: resource.id.clone(),
            });
        }
    }
    Ok(())
}

/// Validate the (project, workspace) scope shared by releases and graphs
pub fn validate_scope(project: &str, workspace: &str) -> Result<()> {
    if project.is_empty() {
        return Err(CoreError::EmptyProject);
    }
    if workspace.is_empty() {
        return Err(CoreError::EmptyWorkspace);
    }
    Ok(())
}
