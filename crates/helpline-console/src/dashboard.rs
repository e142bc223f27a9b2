//! Dashboard summary: totals and chart-ready series.

use std::collections::BTreeMap;

use helpline_client::{Gateway, SessionContext};
use helpline_core::{
    allows, format_duration, Action, AdminStats, CallEvent, CallStats, CallStatus, CallType,
    ContactFilter, Priority,
};
use serde::Serialize;

use crate::error::{require, FlowError, Result};

/// One bar or slice of a chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    /// Display label, e.g. `Follow Up`.
    pub label: String,
    /// Wire name, e.g. `follow_up`.
    pub key: &'static str,
    /// Number of calls.
    pub count: u64,
    /// Share of all calls, in percent with one decimal.
    pub percentage: f64,
}

/// Everything the dashboard shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    /// All calls.
    pub total_calls: u64,
    /// Calls today.
    pub calls_today: u64,
    /// Calls this week.
    pub calls_this_week: u64,
    /// Mean call length as `m:ss`.
    pub avg_duration: String,
    /// Calls per type, every type present.
    pub by_type: Vec<SeriesPoint>,
    /// Calls per priority, every priority present.
    pub by_priority: Vec<SeriesPoint>,
    /// Calls per status, every status present.
    pub by_status: Vec<SeriesPoint>,
    /// Contacts in the directory.
    pub contacts_total: u64,
    /// System-wide counts, admins only.
    pub admin: Option<AdminStats>,
    /// Calls waiting to be logged.
    pub pending_events: Vec<CallEvent>,
}

impl DashboardSummary {
    /// Build the summary from raw statistics.
    #[must_use]
    pub fn from_stats(stats: &CallStats, contacts_total: u64) -> Self {
        let total = stats.total_calls;
        Self {
            total_calls: total,
            calls_today: stats.calls_today,
            calls_this_week: stats.calls_this_week,
            avg_duration: format_duration(whole_seconds(stats.avg_duration)),
            by_type: series(CallType::ALL.iter().map(CallType::as_str), &stats.calls_by_type, total),
            by_priority: series(
                Priority::ALL.iter().map(Priority::as_str),
                &stats.calls_by_priority,
                total,
            ),
            by_status: series(
                CallStatus::ALL.iter().map(CallStatus::as_str),
                &stats.calls_by_status,
                total,
            ),
            contacts_total,
            admin: None,
            pending_events: Vec::new(),
        }
    }
}

/// Load the dashboard for the signed-in role.
///
/// Call statistics and the contact count are required. Admin statistics and
/// pending telephony events are shown when they load and skipped otherwise.
///
/// # Errors
///
/// Returns `FlowError::NotAuthenticated`, or `FlowError::Remote` if the
/// statistics or contacts could not be loaded.
pub async fn load(gateway: &dyn Gateway, session: &SessionContext) -> Result<DashboardSummary> {
    require(session, Action::ViewDashboard)?;
    let role = session.role().ok_or(FlowError::NotAuthenticated)?;

    let stats = gateway
        .call_stats()
        .await
        .map_err(|e| FlowError::remote(&e, "Failed to load dashboard data"))?;
    let contacts = gateway
        .list_contacts(&ContactFilter::default())
        .await
        .map_err(|e| FlowError::remote(&e, "Failed to load dashboard data"))?;

    let mut summary = DashboardSummary::from_stats(&stats, contacts.len() as u64);

    if allows(role, Action::ViewAdminStats) {
        match gateway.admin_stats().await {
            Ok(admin) => summary.admin = Some(admin),
            Err(e) => tracing::warn!(error = %e, "Failed to load admin statistics"),
        }
    }
    if allows(role, Action::ViewTelephonyEvents) {
        match gateway.pending_events().await {
            Ok(events) => summary.pending_events = events,
            Err(e) => tracing::warn!(error = %e, "Failed to load pending calls"),
        }
    }

    tracing::debug!(
        total_calls = summary.total_calls,
        pending = summary.pending_events.len(),
        "Dashboard loaded"
    );
    Ok(summary)
}

fn series(
    keys: impl Iterator<Item = &'static str>,
    counts: &BTreeMap<String, u64>,
    total: u64,
) -> Vec<SeriesPoint> {
    keys.map(|key| {
        let count = counts.get(key).copied().unwrap_or(0);
        SeriesPoint {
            label: title_case(key),
            key,
            count,
            percentage: percentage(count, total),
        }
    })
    .collect()
}

#[allow(clippy::cast_precision_loss)]
fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 * 1000.0 / total as f64).round() / 10.0
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_seconds(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        secs.round() as u64
    } else {
        0
    }
}

fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use helpline_client::mock::fixtures;
    use helpline_client::{Op, RecordingGateway, Session};
    use helpline_core::Role;

    fn stats() -> CallStats {
        CallStats {
            total_calls: 3,
            calls_today: 1,
            calls_this_week: 2,
            calls_by_type: BTreeMap::from([("inquiry".to_string(), 2), ("support".to_string(), 1)]),
            calls_by_priority: BTreeMap::from([("normal".to_string(), 3)]),
            calls_by_status: BTreeMap::from([
                ("completed".to_string(), 2),
                ("follow_up".to_string(), 1),
            ]),
            avg_duration: 125.4,
        }
    }

    #[test]
    fn series_covers_every_variant() {
        let summary = DashboardSummary::from_stats(&stats(), 5);
        assert_eq!(summary.by_type.len(), CallType::ALL.len());
        assert_eq!(summary.by_priority.len(), Priority::ALL.len());

        let complaint = summary.by_type.iter().find(|p| p.key == "complaint").unwrap();
        assert_eq!(complaint.count, 0);
        assert!(complaint.percentage.abs() < f64::EPSILON);

        let inquiry = summary.by_type.iter().find(|p| p.key == "inquiry").unwrap();
        assert!((inquiry.percentage - 66.7).abs() < 1e-9);

        let follow_up = summary.by_status.iter().find(|p| p.key == "follow_up").unwrap();
        assert_eq!(follow_up.label, "Follow Up");
        assert_eq!(summary.avg_duration, "2:05");
    }

    #[test]
    fn empty_stats_have_zero_percentages() {
        let summary = DashboardSummary::from_stats(&CallStats::default(), 0);
        assert!(summary
            .by_status
            .iter()
            .all(|p| p.count == 0 && p.percentage.abs() < f64::EPSILON));
        assert_eq!(summary.avg_duration, "0:00");
    }

    fn session_for(role: Role) -> (Arc<RecordingGateway>, SessionContext) {
        let user = fixtures::user("u-1", "Dana User", role);
        let gateway = Arc::new(RecordingGateway::new());
        gateway.act_as(user.clone());
        gateway.add_contact(fixtures::contact("1", "+15550000001", None));
        gateway.add_event(fixtures::event("900", "+15550000001", Some("1")));
        let session = SessionContext::signed_in(Session {
            token: "tok".into(),
            user,
        });
        (gateway, session)
    }

    #[tokio::test]
    async fn agent_dashboard_skips_admin_stats() {
        let (gateway, session) = session_for(Role::Agent);
        let summary = load(gateway.as_ref(), &session).await.unwrap();
        assert!(summary.admin.is_none());
        assert_eq!(summary.contacts_total, 1);
        assert_eq!(summary.pending_events.len(), 1);
        assert_eq!(gateway.count(Op::AdminStats), 0);
    }

    #[tokio::test]
    async fn auxiliary_failures_do_not_fail_the_dashboard() {
        let (gateway, session) = session_for(Role::Admin);
        gateway.fail_next(Op::AdminStats, 500, None);
        gateway.fail_next(Op::PendingEvents, 500, None);

        let summary = load(gateway.as_ref(), &session).await.unwrap();
        assert!(summary.admin.is_none());
        assert!(summary.pending_events.is_empty());
    }

    #[tokio::test]
    async fn stats_failure_is_reported() {
        let (gateway, session) = session_for(Role::Supervisor);
        gateway.fail_next(Op::CallStats, 500, None);
        let err = load(gateway.as_ref(), &session).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to load dashboard data");
    }
}
