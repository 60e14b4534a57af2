//! Key layout of the coordination store.

use crate::domain::models::FileKind;

/// Agent registry root; children are keyed by agent id
pub const AGENTS: &str = "agents";

/// Inbox entry for one request
pub fn request(agent_id: &str, request_id: &str) -> String {
    format!("requests/{agent_id}/{request_id}")
}

/// Status record the agent overwrites while working on a request
pub fn status(request_id: &str) -> String {
    format!("status/{request_id}")
}

/// Build metadata
pub fn binary(build_id: &str) -> String {
    format!("binaries/{build_id}")
}

/// Base64 payload of one artifact when stored inline
pub fn payload(build_id: &str, kind: FileKind) -> String {
    format!("binaries/{build_id}/payloads/{kind}")
}

/// Audit trail root for one log id
pub fn logs(log_id: &str) -> String {
    format!("logs/{log_id}")
}

/// One audit entry
pub fn log_event(log_id: &str, key: &str) -> String {
    format!("logs/{log_id}/{key}")
}

/// Non-empty path segments
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// True when one path is an ancestor of (or equal to) the other
pub fn overlaps(a: &[&str], b: &[&str]) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        assert_eq!(request("a1", "r1"), "requests/a1/r1");
        assert_eq!(status("r1"), "status/r1");
        assert_eq!(payload("B1", FileKind::Hex), "binaries/B1/payloads/hex");
        assert_eq!(log_event("L1", "k"), "logs/L1/k");
    }

    #[test]
    fn test_segments_ignore_extra_slashes() {
        assert_eq!(segments("/status//r1/"), vec!["status", "r1"]);
        assert!(segments("").is_empty());
    }

    #[test]
    fn test_overlaps() {
        assert!(overlaps(&["status", "r1"], &["status"]));
        assert!(overlaps(&["status"], &["status", "r1", "progress"]));
        assert!(overlaps(&[], &["agents"]));
        assert!(!overlaps(&["status", "r1"], &["status", "r2"]));
        assert!(!overlaps(&["agents"], &["status"]));
    }
}
