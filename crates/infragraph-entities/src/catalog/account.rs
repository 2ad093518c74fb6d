//! Account nodes, synthesised from the tenants of other entities

use crate::entity::{Entity, GraphComponent, ResourceComponent, TenantComponent};

pub const ENTITY_TYPE: &str = "aws-account";

pub fn account_entity(tenant: &TenantComponent) -> Entity {
    Entity::new(
        GraphComponent {
            id: tenant.tenant_id.clone(),
            label: format!("Account {}", tenant.tenant_id),
            node_type: ENTITY_TYPE.to_string(),
            parent: None,
            coords: None,
        },
        ResourceComponent {
            id: tenant.tenant_id.clone(),
            name: tenant.tenant_id.clone(),
            category: "account".to_string(),
            subcategory: None,
            description: tenant.partition.as_ref().map(|p| format!("partition {p}")),
            policy: None,
        },
        tenant.clone(),
    )
}
