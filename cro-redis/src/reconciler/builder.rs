//! Fills strategy requests with provider defaults.
//!
//! Defaults only apply to unset fields, so values from the strategy win.

use crate::clients::{CreateReplicationGroupInput, DeleteReplicationGroupInput};

pub const DEFAULT_CACHE_NODE_TYPE: &str = "cache.t2.micro";
pub const DEFAULT_ENGINE: &str = "redis";
pub const DEFAULT_ENGINE_VERSION: &str = "3.2.10";
pub const DEFAULT_DESCRIPTION: &str = "A Redis replication group";
pub const DEFAULT_NUM_CACHE_CLUSTERS: i64 = 2;
pub const DEFAULT_SNAPSHOT_RETENTION: i64 = 30;

/// Complete a create request. `cache_name` is the deterministic identifier used
/// when the strategy does not pin one.
pub fn build_create_config(
    mut config: CreateReplicationGroupInput,
    cache_name: &str,
) -> CreateReplicationGroupInput {
    config.automatic_failover_enabled.get_or_insert(true);
    config.engine.get_or_insert_with(|| DEFAULT_ENGINE.to_string());
    config.cache_node_type.get_or_insert_with(|| DEFAULT_CACHE_NODE_TYPE.to_string());
    config.replication_group_description.get_or_insert_with(|| DEFAULT_DESCRIPTION.to_string());
    config.engine_version.get_or_insert_with(|| DEFAULT_ENGINE_VERSION.to_string());
    config.num_cache_clusters.get_or_insert(DEFAULT_NUM_CACHE_CLUSTERS);
    config.snapshot_retention_limit.get_or_insert(DEFAULT_SNAPSHOT_RETENTION);
    config.replication_group_id.get_or_insert_with(|| cache_name.to_string());
    config
}

/// Complete a delete request.
///
/// The group id mirrors the create request. A final snapshot identifier that is
/// present but empty is replaced by `snapshot_name`; an absent one stays absent.
pub fn build_delete_config(
    mut config: DeleteReplicationGroupInput,
    create: &CreateReplicationGroupInput,
    cache_name: &str,
    snapshot_name: &str,
) -> DeleteReplicationGroupInput {
    if config.replication_group_id.is_none() {
        config.replication_group_id = Some(
            create
                .replication_group_id
                .clone()
                .unwrap_or_else(|| cache_name.to_string()),
        );
    }
    config.retain_primary_cluster.get_or_insert(false);
    if config.final_snapshot_identifier.as_deref() == Some("") {
        config.final_snapshot_identifier = Some(snapshot_name.to_string());
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_defaults_fill_unset_fields() {
        let config = build_create_config(CreateReplicationGroupInput::default(), "c-ns-cache");

        assert_eq!(config.replication_group_id.as_deref(), Some("c-ns-cache"));
        assert_eq!(config.cache_node_type.as_deref(), Some("cache.t2.micro"));
        assert_eq!(config.engine.as_deref(), Some("redis"));
        assert_eq!(config.engine_version.as_deref(), Some("3.2.10"));
        assert_eq!(
            config.replication_group_description.as_deref(),
            Some("A Redis replication group")
        );
        assert_eq!(config.num_cache_clusters, Some(2));
        assert_eq!(config.automatic_failover_enabled, Some(true));
        assert_eq!(config.snapshot_retention_limit, Some(30));
    }

    #[test]
    fn test_create_overrides_win() {
        let partial = CreateReplicationGroupInput {
            replication_group_id: Some("pinned".to_string()),
            cache_node_type: Some("cache.m5.large".to_string()),
            snapshot_retention_limit: Some(7),
            num_cache_clusters: Some(3),
            ..Default::default()
        };
        let config = build_create_config(partial, "generated");

        assert_eq!(config.replication_group_id.as_deref(), Some("pinned"));
        assert_eq!(config.cache_node_type.as_deref(), Some("cache.m5.large"));
        assert_eq!(config.snapshot_retention_limit, Some(7));
        assert_eq!(config.num_cache_clusters, Some(3));
    }

    #[test]
    fn test_create_is_stable_across_ticks() {
        let a = build_create_config(CreateReplicationGroupInput::default(), "c-ns-cache");
        let b = build_create_config(CreateReplicationGroupInput::default(), "c-ns-cache");
        assert_eq!(a, b);
    }

    #[test]
    fn test_delete_mirrors_create_identifier() {
        let create = build_create_config(CreateReplicationGroupInput::default(), "c-ns-cache");
        let delete = build_delete_config(
            DeleteReplicationGroupInput::default(),
            &create,
            "c-ns-cache",
            "c-ns-cache-1700000000",
        );

        assert_eq!(delete.replication_group_id.as_deref(), Some("c-ns-cache"));
        assert_eq!(delete.retain_primary_cluster, Some(false));
        assert_eq!(delete.final_snapshot_identifier, None);
    }

    #[test]
    fn test_delete_empty_snapshot_identifier_gets_generated_name() {
        let create = build_create_config(CreateReplicationGroupInput::default(), "c-ns-cache");
        let partial = DeleteReplicationGroupInput {
            final_snapshot_identifier: Some(String::new()),
            ..Default::default()
        };
        let delete = build_delete_config(partial, &create, "c-ns-cache", "c-ns-cache-1700000000");

        assert_eq!(
            delete.final_snapshot_identifier.as_deref(),
            Some("c-ns-cache-1700000000")
        );
    }

    #[test]
    fn test_delete_explicit_snapshot_identifier_kept() {
        let create = build_create_config(CreateReplicationGroupInput::default(), "c-ns-cache");
        let partial = DeleteReplicationGroupInput {
            final_snapshot_identifier: Some("keep-me".to_string()),
            retain_primary_cluster: Some(true),
            ..Default::default()
        };
        let delete = build_delete_config(partial, &create, "c-ns-cache", "generated");

        assert_eq!(delete.final_snapshot_identifier.as_deref(), Some("keep-me"));
        assert_eq!(delete.retain_primary_cluster, Some(true));
    }
}
