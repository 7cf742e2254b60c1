//! Display information parsed from resource ids
//!
//! Ids are colon-separated:
//! - Kubernetes: `apiVersion:kind:namespace:name`, or `apiVersion:kind:name`
//!   for cluster-scoped kinds
//! - Terraform: `namespace:provider:type:name`
//!
//! The `apiVersion` of grouped Kubernetes kinds (`apps/v1`) contains no colon,
//! so the segment count is unambiguous.

use serde_json::Value;
use stackyard_core::{Resource, ResourceType};

use crate::error::{GraphError, Result};

/// Separator between id segments
pub const ID_SEPARATOR: char = ':';

/// What a resource is, for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    /// Kubernetes kind or Terraform resource type
    pub resource_type: String,
    /// Provider-side identifier; empty for Kubernetes and for resources not
    /// yet created
    pub cloud_resource_id: String,
    pub resource_name: String,
}

/// Attribute carrying the provider-side id, by Terraform provider
fn cloud_id_attribute(provider: &str) -> Option<&'static str> {
    match provider {
        "aws" => Some("arn"),
        "azurerm" | "alicloud" | "google" => Some("id"),
        _ => None,
    }
}

/// Parse a resource's id into its type, name and cloud resource id
pub fn get_resource_info(resource: &Resource) -> Result<ResourceInfo> {
    let mut segments: Vec<&str> = resource.id.split(ID_SEPARATOR).collect();

    if resource.resource_type == ResourceType::Kubernetes && segments.len() == 3 {
        segments.insert(2, "");
    }
    if segments.len() != 4 {
        return Err(GraphError::InvalidResourceId {
            id: resource.id.clone(),
            reason: format!("expected 4 segments, found {}", segments.len()),
        });
    }

    match resource.resource_type {
        ResourceType::Kubernetes => Ok(ResourceInfo {
            resource_type: segments[1].to_string(),
            cloud_resource_id: String::new(),
            resource_name: segments[3].to_string(),
        }),
        ResourceType::Terraform => {
            let provider = segments[1];
            let attribute =
                cloud_id_attribute(provider).ok_or_else(|| GraphError::UnsupportedProvider {
                    id: resource.id.clone(),
                    provider: provider.to_string(),
                })?;
            let cloud_resource_id = match resource.attributes.get(attribute) {
                Some(Value::String(id)) => id.clone(),
                _ => String::new(),
            };
            Ok(ResourceInfo {
                resource_type: segments[2].to_string(),
                cloud_resource_id,
                resource_name: segments[3].to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaced_kubernetes() {
        let resource = Resource::new("apps/v1:Deployment:shop:web", ResourceType::Kubernetes);
        assert_eq!(
            get_resource_info(&resource).unwrap(),
            ResourceInfo {
                resource_type: "Deployment".to_string(),
                cloud_resource_id: String::new(),
                resource_name: "web".to_string(),
            }
        );
    }

    #[test]
    fn test_cluster_scoped_kubernetes() {
        let resource = Resource::new("v1:Namespace:shop", ResourceType::Kubernetes);
        let info = get_resource_info(&resource).unwrap();
        assert_eq!(info.resource_type, "Namespace");
        assert_eq!(info.resource_name, "shop");
    }

    #[test]
    fn test_aws_uses_arn() {
        let resource = Resource::new(
            "hashicorp:aws:aws_db_instance:orders",
            ResourceType::Terraform,
        )
        .with_attribute("arn", "arn:aws:rds:eu-west-1:123456789012:db:orders")
        .with_attribute("id", "orders");

        let info = get_resource_info(&resource).unwrap();
        assert_eq!(info.resource_type, "aws_db_instance");
        assert_eq!(info.resource_name, "orders");
        assert_eq!(
            info.cloud_resource_id,
            "arn:aws:rds:eu-west-1:123456789012:db:orders"
        );
    }

    #[test]
    fn test_id_attribute_providers() {
        for provider in ["azurerm", "alicloud", "google"] {
            let resource = Resource::new(
                format!("hashicorp:{provider}:bucket:assets"),
                ResourceType::Terraform,
            )
            .with_attribute("id", "assets-123");
            assert_eq!(
                get_resource_info(&resource).unwrap().cloud_resource_id,
                "assets-123",
                "{provider}"
            );
        }
    }

    #[test]
    fn test_not_yet_created_has_empty_cloud_id() {
        let resource = Resource::new("hashicorp:aws:aws_s3_bucket:assets", ResourceType::Terraform);
        assert_eq!(get_resource_info(&resource).unwrap().cloud_resource_id, "");
    }

    #[test]
    fn test_unsupported_provider() {
        let resource = Resource::new("hashicorp:random:random_password:db", ResourceType::Terraform);
        assert!(matches!(
            get_resource_info(&resource),
            Err(GraphError::UnsupportedProvider { provider, .. }) if provider == "random"
        ));
    }

    #[test]
    fn test_invalid_shapes() {
        for (id, resource_type) in [
            ("v1:Namespace", ResourceType::Kubernetes),
            ("a:b:c:d:e", ResourceType::Kubernetes),
            ("aws:aws_s3_bucket:assets", ResourceType::Terraform),
        ] {
            let resource = Resource::new(id, resource_type);
            assert!(
                matches!(
                    get_resource_info(&resource),
                    Err(GraphError::InvalidResourceId { .. })
                ),
                "{id}"
            );
        }
    }
}
