//! Categorize a spec's resources into a graph

use std::collections::HashMap;
use tracing::debug;

use stackyard_core::Resource;

use crate::error::Result;
use crate::graph::{Graph, GraphResource, GraphResourceStatus, ResourceCategory};
use crate::info::get_resource_info;

/// Add the not-yet-tracked resources of a spec to `graph`
///
/// The first workload not already in the graph is filed under
/// [`ResourceCategory::Workload`] together with its untracked dependencies
/// under [`ResourceCategory::Dependency`]; every other untracked resource is
/// filed under [`ResourceCategory::Other`]. New entries start as
/// `ApplyFail`. Existing entries keep their status and category, but the
/// dependency links of every resource passed in are refreshed.
pub fn generate_graph(resources: &[Resource], graph: &mut Graph) -> Result<()> {
    let by_id: HashMap<&str, &Resource> = resources.iter().map(|r| (r.id.as_str(), r)).collect();

    let workload = resources
        .iter()
        .find(|r| r.is_workload() && !graph.resources.contains(&r.id));

    if let Some(workload) = workload {
        add(graph, workload, ResourceCategory::Workload)?;
        for dependency_id in &workload.depends_on {
            if graph.resources.contains(dependency_id) {
                continue;
            }
            match by_id.get(dependency_id.as_str()) {
                Some(dependency) => add(graph, dependency, ResourceCategory::Dependency)?,
                None => debug!(
                    workload = %workload.id,
                    dependency = %dependency_id,
                    "dependency not in spec"
                ),
            }
        }
    }

    for resource in resources {
        if !graph.resources.contains(&resource.id) {
            add(graph, resource, ResourceCategory::Other)?;
        }
    }

    link(resources, graph);
    Ok(())
}

fn add(graph: &mut Graph, resource: &Resource, category: ResourceCategory) -> Result<()> {
    let info = get_resource_info(resource)?;
    let entry = GraphResource {
        id: resource.id.clone(),
        resource_type: info.resource_type,
        name: info.resource_name,
        cloud_resource_id: info.cloud_resource_id,
        status: GraphResourceStatus::ApplyFail,
        dependencies: Vec::new(),
        dependents: Vec::new(),
    };
    debug!(id = %resource.id, %category, "adding resource to graph");
    graph.resources.add_graph_resource(entry, category);
    Ok(())
}

/// Mirror `dependsOn` edges between tracked resources
///
/// Edges dropped since the last pass are removed from both ends.
fn link(resources: &[Resource], graph: &mut Graph) {
    for resource in resources {
        if !graph.resources.contains(&resource.id) {
            continue;
        }

        let mut dependencies: Vec<String> = resource
            .depends_on
            .iter()
            .filter(|id| graph.resources.contains(id))
            .cloned()
            .collect();
        dependencies.sort();
        dependencies.dedup();

        let previous = graph
            .resources
            .find_graph_resource_by_id(&resource.id)
            .map(|entry| entry.dependencies.clone())
            .unwrap_or_default();
        for dropped in previous.iter().filter(|id| !dependencies.contains(*id)) {
            if let Some(target) = graph.resources.find_graph_resource_by_id_mut(dropped) {
                target.dependents.retain(|id| id != &resource.id);
            }
        }

        for dependency in &dependencies {
            if let Some(target) = graph.resources.find_graph_resource_by_id_mut(dependency) {
                if !target.dependents.contains(&resource.id) {
                    target.dependents.push(resource.id.clone());
                }
            }
        }
        if let Some(entry) = graph.resources.find_graph_resource_by_id_mut(&resource.id) {
            entry.dependencies = dependencies;
        }
    }
}
