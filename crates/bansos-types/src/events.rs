use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{AidApplication, ApplicationStatus, Dispute, DisputeStatus};

/// What a resident last saw: the status of each of their applications and
/// disputes, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(default)]
    pub applications: BTreeMap<i64, ApplicationStatus>,
    #[serde(default)]
    pub disputes: BTreeMap<i64, DisputeStatus>,
}

impl StatusSnapshot {
    pub fn from_records(applications: &[AidApplication], disputes: &[Dispute]) -> Self {
        Self {
            applications: applications.iter().map(|a| (a.id, a.status)).collect(),
            disputes: disputes.iter().map(|d| (d.id, d.status)).collect(),
        }
    }
}

/// A status change the resident has not seen yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ChangeEvent {
    ApplicationStatusChanged {
        id: i64,
        /// `None` when the application is new to the client.
        from: Option<ApplicationStatus>,
        to: ApplicationStatus,
    },
    DisputeStatusChanged {
        id: i64,
        from: Option<DisputeStatus>,
        to: DisputeStatus,
    },
}

/// Compare two snapshots. Entities that disappeared produce no event.
/// Events come out applications first, each group ordered by id.
pub fn diff(prev: &StatusSnapshot, next: &StatusSnapshot) -> Vec<ChangeEvent> {
    let applications = next.applications.iter().filter_map(|(&id, &to)| {
        let from = prev.applications.get(&id).copied();
        (from != Some(to)).then_some(ChangeEvent::ApplicationStatusChanged { id, from, to })
    });

    let disputes = next.disputes.iter().filter_map(|(&id, &to)| {
        let from = prev.disputes.get(&id).copied();
        (from != Some(to)).then_some(ChangeEvent::DisputeStatusChanged { id, from, to })
    });

    applications.chain(disputes).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(apps: &[(i64, ApplicationStatus)], disputes: &[(i64, DisputeStatus)]) -> StatusSnapshot {
        StatusSnapshot {
            applications: apps.iter().copied().collect(),
            disputes: disputes.iter().copied().collect(),
        }
    }

    #[test]
    fn identical_snapshots_produce_nothing() {
        let s = snapshot(&[(7, ApplicationStatus::Pending)], &[(3, DisputeStatus::Pending)]);
        assert!(diff(&s, &s).is_empty());
    }

    #[test]
    fn reports_status_transitions() {
        let prev = snapshot(&[(7, ApplicationStatus::Pending)], &[(3, DisputeStatus::Pending)]);
        let next = snapshot(&[(7, ApplicationStatus::Rejected)], &[(3, DisputeStatus::Accepted)]);

        assert_eq!(
            diff(&prev, &next),
            vec![
                ChangeEvent::ApplicationStatusChanged {
                    id: 7,
                    from: Some(ApplicationStatus::Pending),
                    to: ApplicationStatus::Rejected,
                },
                ChangeEvent::DisputeStatusChanged {
                    id: 3,
                    from: Some(DisputeStatus::Pending),
                    to: DisputeStatus::Accepted,
                },
            ]
        );
    }

    #[test]
    fn new_entities_are_reported_removed_ones_are_not() {
        let prev = snapshot(&[(1, ApplicationStatus::Approved)], &[]);
        let next = snapshot(&[(2, ApplicationStatus::Pending)], &[]);

        assert_eq!(
            diff(&prev, &next),
            vec![ChangeEvent::ApplicationStatusChanged { id: 2, from: None, to: ApplicationStatus::Pending }]
        );
    }

    #[test]
    fn snapshot_survives_json_with_integer_keys() {
        let s = snapshot(&[(7, ApplicationStatus::Approved)], &[(3, DisputeStatus::Rejected)]);
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"7\":\"approved\""));
        let back: StatusSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
