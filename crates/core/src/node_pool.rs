//! Node liveness rules and node field validation.
//!
//! Pure functions shared by the heartbeat handler, the offline sweep, and the
//! claim query's liveness filter.

use std::net::IpAddr;

use chrono::Duration;

use crate::error::CoreError;
use crate::status::NodeStatus;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default interval between node heartbeats and between sweeps.
pub const DEFAULT_HEARTBEAT_PERIOD_SECS: u64 = 30;

/// A node is offline after this many missed heartbeat periods.
pub const DEFAULT_OFFLINE_TIMEOUT_MULTIPLIER: u32 = 3;

/// How far ahead of the server clock a reported heartbeat may be.
pub const MAX_HEARTBEAT_SKEW_SECS: i64 = 60;

/// Maximum length of a node name.
const MAX_NAME_LEN: usize = 128;

/// Maximum length of a node address.
const MAX_ADDRESS_LEN: usize = 255;

/// Maximum number of tags a node (or prompt) may have.
const MAX_TAGS: usize = 32;

/// Maximum length of a single tag.
const MAX_TAG_LEN: usize = 64;

// ---------------------------------------------------------------------------
// Liveness
// ---------------------------------------------------------------------------

/// Heartbeat age after which a node is considered offline.
pub fn offline_timeout(heartbeat_period_secs: u64, multiplier: u32) -> Duration {
    let secs = heartbeat_period_secs.saturating_mul(u64::from(multiplier));
    Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1000))
}

/// Whether a node with the given last heartbeat has gone stale.
///
/// A node that never sent a heartbeat is stale.
pub fn is_stale(last_heartbeat: Option<Timestamp>, now: Timestamp, timeout: Duration) -> bool {
    match last_heartbeat {
        Some(at) => now - at > timeout,
        None => true,
    }
}

/// Resolve the timestamp a heartbeat should record.
///
/// An absent timestamp means "now"; one too far in the future is rejected.
pub fn resolve_heartbeat_timestamp(
    reported: Option<Timestamp>,
    now: Timestamp,
) -> Result<Timestamp, CoreError> {
    let Some(at) = reported else {
        return Ok(now);
    };
    if at - now > Duration::seconds(MAX_HEARTBEAT_SKEW_SECS) {
        return Err(CoreError::Validation(format!(
            "Heartbeat timestamp {at} is more than {MAX_HEARTBEAT_SKEW_SECS}s ahead of server time"
        )));
    }
    Ok(at)
}

/// Status to store after a heartbeat.
///
/// A node that holds a processing issue stays `running` whatever it reports.
/// Otherwise a live node is `idle`, unless it announces it is going `offline`.
pub fn reconcile_heartbeat_status(reported: NodeStatus, holds_processing_issue: bool) -> NodeStatus {
    if holds_processing_issue {
        return NodeStatus::Running;
    }
    match reported {
        NodeStatus::Offline => NodeStatus::Offline,
        NodeStatus::Idle | NodeStatus::Running => NodeStatus::Idle,
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a node name.
///
/// Rules:
/// - Must not be empty.
/// - Must not exceed `MAX_NAME_LEN` characters.
/// - Must contain only alphanumeric, hyphen, underscore, or dot characters.
pub fn validate_node_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::Validation(
            "Node name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Node name must not exceed {MAX_NAME_LEN} characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(CoreError::Validation(
            "Node name may only contain alphanumeric, hyphen, underscore, or dot characters"
                .to_string(),
        ));
    }
    Ok(())
}

/// Validate a node address: an IP literal or a DNS host name.
pub fn validate_node_address(ip: &str) -> Result<(), CoreError> {
    if ip.parse::<IpAddr>().is_ok() {
        return Ok(());
    }
    let valid_host = !ip.is_empty()
        && ip.len() <= MAX_ADDRESS_LEN
        && ip.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });
    if !valid_host {
        return Err(CoreError::Validation(format!(
            "Invalid node address: \"{ip}\""
        )));
    }
    Ok(())
}

/// Validate a set of tags.
///
/// Rules:
/// - At most `MAX_TAGS` tags.
/// - Each tag must not be empty and must not exceed `MAX_TAG_LEN` characters.
/// - No duplicates.
pub fn validate_tags(tags: &[String]) -> Result<(), CoreError> {
    if tags.len() > MAX_TAGS {
        return Err(CoreError::Validation(format!(
            "At most {MAX_TAGS} tags are allowed"
        )));
    }
    for (i, tag) in tags.iter().enumerate() {
        if tag.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "Tag at index {i} must not be empty"
            )));
        }
        if tag.len() > MAX_TAG_LEN {
            return Err(CoreError::Validation(format!(
                "Tag at index {i} exceeds {MAX_TAG_LEN} characters"
            )));
        }
    }

    let mut seen = std::collections::HashSet::with_capacity(tags.len());
    for tag in tags {
        if !seen.insert(tag.as_str()) {
            return Err(CoreError::Validation(format!(
                "Duplicate tag: \"{tag}\""
            )));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    // -- liveness -------------------------------------------------------------

    #[test]
    fn default_timeout_is_ninety_seconds() {
        let timeout = offline_timeout(
            DEFAULT_HEARTBEAT_PERIOD_SECS,
            DEFAULT_OFFLINE_TIMEOUT_MULTIPLIER,
        );
        assert_eq!(timeout, Duration::seconds(90));
    }

    #[test]
    fn never_seen_node_is_stale() {
        assert!(is_stale(None, now(), Duration::seconds(90)));
    }

    #[test]
    fn staleness_boundary() {
        let timeout = Duration::seconds(90);
        assert!(!is_stale(Some(now() - Duration::seconds(90)), now(), timeout));
        assert!(is_stale(Some(now() - Duration::seconds(91)), now(), timeout));
    }

    #[test]
    fn absent_timestamp_means_now() {
        assert_eq!(resolve_heartbeat_timestamp(None, now()).unwrap(), now());
    }

    #[test]
    fn future_timestamp_rejected() {
        let at = now() + Duration::seconds(MAX_HEARTBEAT_SKEW_SECS + 1);
        assert!(resolve_heartbeat_timestamp(Some(at), now()).is_err());
        let close = now() + Duration::seconds(5);
        assert_eq!(resolve_heartbeat_timestamp(Some(close), now()).unwrap(), close);
    }

    #[test]
    fn processing_node_stays_running() {
        for reported in NodeStatus::ALL {
            assert_eq!(
                reconcile_heartbeat_status(*reported, true),
                NodeStatus::Running
            );
        }
    }

    #[test]
    fn free_node_reports_idle() {
        assert_eq!(
            reconcile_heartbeat_status(NodeStatus::Running, false),
            NodeStatus::Idle
        );
        assert_eq!(
            reconcile_heartbeat_status(NodeStatus::Idle, false),
            NodeStatus::Idle
        );
        assert_eq!(
            reconcile_heartbeat_status(NodeStatus::Offline, false),
            NodeStatus::Offline
        );
    }

    // -- validate_node_name ---------------------------------------------------

    #[test]
    fn valid_node_names() {
        assert!(validate_node_name("node-01").is_ok());
        assert!(validate_node_name("build_box.eu").is_ok());
    }

    #[test]
    fn invalid_node_names() {
        assert!(validate_node_name("").is_err());
        assert!(validate_node_name("has space").is_err());
        assert!(validate_node_name(&"n".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    // -- validate_node_address ------------------------------------------------

    #[test]
    fn addresses() {
        assert!(validate_node_address("10.0.0.7").is_ok());
        assert!(validate_node_address("::1").is_ok());
        assert!(validate_node_address("worker-3.internal").is_ok());
        assert!(validate_node_address("").is_err());
        assert!(validate_node_address("bad host").is_err());
        assert!(validate_node_address("-lead.example").is_err());
    }

    // -- validate_tags --------------------------------------------------------

    #[test]
    fn valid_tags() {
        let tags = vec!["gpu".to_string(), "linux".to_string()];
        assert!(validate_tags(&tags).is_ok());
        assert!(validate_tags(&[]).is_ok());
    }

    #[test]
    fn blank_tag_rejected() {
        assert!(validate_tags(&["  ".to_string()]).is_err());
    }

    #[test]
    fn duplicate_tag_rejected() {
        let tags = vec!["gpu".to_string(), "gpu".to_string()];
        let err = validate_tags(&tags).unwrap_err();
        assert!(err.to_string().contains("Duplicate tag"));
    }

    #[test]
    fn too_many_tags_rejected() {
        let tags: Vec<String> = (0..=MAX_TAGS).map(|i| format!("t{i}")).collect();
        assert!(validate_tags(&tags).is_err());
    }
}
