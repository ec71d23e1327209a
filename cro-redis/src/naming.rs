//! Deterministic infrastructure names.
//!
//! Names are derived from the cluster identifier and the resource's
//! namespace/name so every tick, on every process, computes the same id.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::types::ObjectMeta;

/// Maximum length of ElastiCache replication group and snapshot identifiers we generate.
pub const DEFAULT_AWS_IDENTIFIER_LENGTH: usize = 40;

const HASH_LENGTH: usize = 8;

/// `<clusterID>-<namespace>-<name>`, shortened to `max_len`.
pub fn build_infra_name(cluster_id: &str, meta: &ObjectMeta, max_len: usize) -> String {
    shorten_string(
        &format!("{}-{}-{}", cluster_id, meta.namespace, meta.name),
        max_len,
    )
}

/// Like [`build_infra_name`] with the unix timestamp of `now` appended before shortening.
pub fn build_timestamped_infra_name(
    cluster_id: &str,
    meta: &ObjectMeta,
    max_len: usize,
    now: DateTime<Utc>,
) -> String {
    shorten_string(
        &format!(
            "{}-{}-{}-{}",
            cluster_id,
            meta.namespace,
            meta.name,
            now.timestamp()
        ),
        max_len,
    )
}

/// Lowercase, replace anything but ASCII alphanumerics with single hyphens, and
/// fit into `max_len`. Over-long names keep a prefix plus a digest of the input,
/// so distinct inputs sharing a prefix stay distinct.
pub fn shorten_string(s: &str, max_len: usize) -> String {
    let mut sanitized = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            sanitized.push(c.to_ascii_lowercase());
        } else if !sanitized.is_empty() && !sanitized.ends_with('-') {
            sanitized.push('-');
        }
    }
    let sanitized = sanitized.trim_end_matches('-');

    if sanitized.len() <= max_len {
        return sanitized.to_string();
    }

    let digest = hex::encode(Sha256::digest(s.as_bytes()));
    if max_len <= HASH_LENGTH + 1 {
        return digest[..max_len].to_string();
    }

    let prefix = sanitized[..max_len - HASH_LENGTH - 1].trim_end_matches('-');
    format!("{}-{}", prefix, &digest[..HASH_LENGTH])
}
