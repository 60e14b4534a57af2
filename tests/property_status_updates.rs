//! Property tests for status tracking
//!
//! Feeds arbitrary well-formed status sequences through the tracker and
//! checks the audit trail it produces.

use buildrelay::domain::models::{JobStatus, MonitorPhase, StatusRecord};
use buildrelay::services::{StatusTracker, TerminalStatus};
use chrono::Utc;
use proptest::prelude::*;

fn record(status: JobStatus, log_id: Option<&str>) -> StatusRecord {
    let mut record = StatusRecord::new(status);
    record.log_id = log_id.map(str::to_string);
    record
}

/// Unacknowledged `queued` records, then a non-decreasing run of
/// `queued`/`processing` records carrying a log id.
fn status_run() -> impl Strategy<Value = (usize, Vec<JobStatus>)> {
    (0usize..3, 0usize..5, 0usize..5).prop_map(|(silent, queued, processing)| {
        let mut statuses = vec![JobStatus::Queued; queued];
        statuses.extend(std::iter::repeat(JobStatus::Processing).take(processing));
        (silent, statuses)
    })
}

fn expected_types(statuses: &[JobStatus], terminal: JobStatus) -> Vec<String> {
    let mut types = vec![
        "request_submitted".to_string(),
        "acknowledgment_received".to_string(),
    ];
    let mut previous = None;
    for status in statuses {
        if previous != Some(*status) {
            types.push(format!("status_update_{status}"));
            previous = Some(*status);
        }
    }
    types.push(
        match terminal {
            JobStatus::Failed => "job_failed",
            _ => "job_completed",
        }
        .to_string(),
    );
    types
}

proptest! {
    #[test]
    fn one_update_per_distinct_status(
        (silent, statuses) in status_run(),
        failed in any::<bool>(),
    ) {
        let terminal = if failed { JobStatus::Failed } else { JobStatus::Completed };
        let mut tracker = StatusTracker::new("r1", None, Utc::now());
        tracker.subscribed();

        let mut types = Vec::new();
        for _ in 0..silent {
            let step = tracker.observe(&record(JobStatus::Queued, None), Utc::now());
            prop_assert!(step.audit.is_empty());
            prop_assert_eq!(step.ui_lines.len(), 1);
        }
        for status in &statuses {
            let step = tracker.observe(&record(*status, Some("L1")), Utc::now());
            prop_assert!(step.terminal.is_none());
            types.extend(step.audit.iter().map(|e| e.event_type.to_string()));
        }

        let last = tracker.observe(&record(terminal, Some("L1")), Utc::now());
        let expected_terminal = if failed { TerminalStatus::Failed } else { TerminalStatus::Completed };
        prop_assert_eq!(last.terminal, Some(expected_terminal));
        types.extend(last.audit.iter().map(|e| e.event_type.to_string()));

        prop_assert_eq!(types, expected_types(&statuses, terminal));
        prop_assert_eq!(tracker.state().log_id.as_deref(), Some("L1"));
        prop_assert!(tracker.phase().is_terminal());

        let after = tracker.observe(&record(JobStatus::Processing, Some("L1")), Utc::now());
        prop_assert!(after.audit.is_empty());
        prop_assert!(after.ui_lines.is_empty());
    }

    #[test]
    fn phase_never_leaves_terminal(statuses in prop::collection::vec(
        prop_oneof![
            Just(JobStatus::Queued),
            Just(JobStatus::Processing),
            Just(JobStatus::Completed),
            Just(JobStatus::Failed),
        ],
        1..12,
    )) {
        let mut tracker = StatusTracker::new("r1", None, Utc::now());
        tracker.subscribed();

        let mut terminal_seen: Option<MonitorPhase> = None;
        let mut terminal_steps = 0;
        for status in statuses {
            let step = tracker.observe(&record(status, Some("L1")), Utc::now());
            if step.terminal.is_some() {
                terminal_steps += 1;
            }
            match terminal_seen {
                Some(phase) => prop_assert_eq!(tracker.phase(), phase),
                None if tracker.phase().is_terminal() => terminal_seen = Some(tracker.phase()),
                None => {}
            }
        }
        prop_assert!(terminal_steps <= 1);
    }
}
