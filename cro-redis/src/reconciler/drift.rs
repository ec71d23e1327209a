//! Drift detection between the desired create request and the live group.
//!
//! Only node type and snapshot retention can be modified in place.

use crate::clients::{CreateReplicationGroupInput, ModifyReplicationGroupInput, ReplicationGroup};

/// A modify request with only the changed fields, or `None` if nothing differs.
pub fn build_update_strategy(
    desired: &CreateReplicationGroupInput,
    found: &ReplicationGroup,
) -> Option<ModifyReplicationGroupInput> {
    let mut update = ModifyReplicationGroupInput {
        replication_group_id: found.replication_group_id.clone(),
        ..Default::default()
    };
    let mut changed = false;

    if desired.cache_node_type.is_some() && desired.cache_node_type != found.cache_node_type {
        update.cache_node_type = desired.cache_node_type.clone();
        changed = true;
    }
    if desired.snapshot_retention_limit.is_some()
        && desired.snapshot_retention_limit != found.snapshot_retention_limit
    {
        update.snapshot_retention_limit = desired.snapshot_retention_limit;
        changed = true;
    }

    changed.then_some(update)
}
