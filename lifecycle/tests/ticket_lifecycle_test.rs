//! Ticket lifecycle integration tests: drive the service end to end on an
//! in-memory store with a manual clock.
//!
//! Tests verify:
//! - Status histories replayed from the log only follow table edges
//! - Rejected operations leave status, assignees, SLA and log untouched
//! - Team leads resolve only tickets held by their own team
//! - SLA at-risk and breach detection on a CRITICAL ticket
//! - A priority change on a breached ticket does not announce the breach again
//! - Reopen restarts the SLA; triage officers cannot reopen
//! - Customer log visibility and strict sequence order
//! - Idempotent creation and no partial effect on storage failure
//! - Role changes never strand a team or an open ticket

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use lifecycle::activity::{ActivityType, PageRequest, TicketEvent};
use lifecycle::assignment::MemberChanges;
use lifecycle::state_machine::{is_legal_transition, replay};
use lifecycle::store::{Commit, IdempotencyRecord, StoreResult};
use lifecycle::{
    Actor, ActivityLogEntry, Category, Clock, EngineConfig, ErrorCode, ManualClock, MemoryStore,
    NewTicket, Priority, Role, SharedStore, StoreError, Team, Ticket, TicketError, TicketFilter,
    TicketService, TicketStatus, TicketStore, TriageRequest, User,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 20, 9, 0, 0).unwrap()
}

fn directory() -> (Vec<User>, Vec<Team>) {
    let users = vec![
        User::new("CUST001", "Carol Customer", Role::Customer),
        User::new("CUST002", "Dan Customer", Role::Customer),
        User::new("AGT001", "Agnes Agent", Role::Agent),
        User::new("TRI1", "Tess Triage", Role::TriageOfficer),
        User::new("TRI2", "Tom Triage", Role::TriageOfficer),
        User::new("ENG001", "Alice Johnson", Role::L1Engineer),
        User::new("ENG002", "Bob Smith", Role::NocEngineer),
        User::new("FE001", "Frank Field", Role::FieldEngineer),
        User::new("TL1", "Terry Lead", Role::TeamLead),
        User::new("TL2", "Quinn Lead", Role::TeamLead),
        User::new("MGR1", "Mia Manager", Role::Manager),
    ];
    let mut team = Team::new("TL1", "Core Network");
    team.add_member("ENG001");
    team.add_member("ENG002");
    (users, vec![team])
}

struct Fixture {
    service: TicketService,
    clock: Arc<ManualClock>,
}

fn fixture_on(store: SharedStore) -> Fixture {
    let (users, teams) = directory();
    let config = EngineConfig {
        users,
        teams,
        ..EngineConfig::default()
    };
    let clock = Arc::new(ManualClock::new(t0()));
    let service = TicketService::new(config, store)
        .unwrap()
        .with_clock(clock.clone());
    service.seed_directory().unwrap();
    Fixture { service, clock }
}

fn fixture() -> Fixture {
    fixture_on(Arc::new(MemoryStore::new()))
}

fn actor(id: &str) -> Actor {
    let role = directory()
        .0
        .into_iter()
        .find(|u| u.id == id)
        .map(|u| u.role)
        .unwrap();
    Actor::new(id, role)
}

fn wifi_ticket(priority: Option<Priority>) -> NewTicket {
    NewTicket {
        title: "Wi-Fi drops in conference room".into(),
        description: "Signal keeps dropping every few minutes".into(),
        category: Category::NetworkConnectivity,
        sub_category: Some("Wireless".into()),
        priority,
        customer_id: None,
        attachments: Vec::new(),
    }
}

async fn create(f: &Fixture, priority: Option<Priority>) -> Ticket {
    f.service
        .create(wifi_ticket(priority), None, &actor("CUST001"))
        .await
        .unwrap()
}

async fn assign(f: &Fixture, ticket_id: &str, engineers: &[&str]) -> Ticket {
    let request = TriageRequest {
        engineer_ids: engineers.iter().map(|e| e.to_string()).collect(),
        ..TriageRequest::default()
    };
    f.service
        .triage(ticket_id, request, &actor("TRI1"))
        .await
        .unwrap()
}

async fn all_logs(f: &Fixture, ticket_id: &str, viewer: &str) -> Vec<ActivityLogEntry> {
    f.service
        .logs(ticket_id, &actor(viewer), PageRequest::new(0, 500))
        .await
        .unwrap()
        .items
}

// ── Creation ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_starts_sla_and_logs_creation() {
    let f = fixture();
    let ticket = create(&f, Some(Priority::High)).await;

    assert_eq!(ticket.id, "TKT00001");
    assert_eq!(ticket.status, TicketStatus::Created);
    assert_eq!(ticket.customer_id, "CUST001");
    assert_eq!(ticket.sla.deadline, t0() + Duration::hours(8));
    assert!(ticket.assignees.is_empty());

    let logs = all_logs(&f, &ticket.id, "CUST001").await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].activity_type, ActivityType::Creation);
    assert_eq!(logs[0].sequence, 1);
}

#[tokio::test]
async fn test_agent_creates_on_behalf_of_customer() {
    let f = fixture();
    let agent = actor("AGT001");

    let mut request = wifi_ticket(None);
    let err = f
        .service
        .create(request.clone(), None, &agent)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidRequest);

    request.customer_id = Some("CUST999".into());
    let err = f
        .service
        .create(request.clone(), None, &agent)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);

    request.customer_id = Some("CUST002".into());
    request.attachments = vec!["router-log.txt".into()];
    let ticket = f.service.create(request, None, &agent).await.unwrap();
    assert_eq!(ticket.created_by, "AGT001");
    assert_eq!(ticket.customer_id, "CUST002");
    assert_eq!(ticket.attachments.len(), 1);

    let mine = f.service.my_tickets(&actor("CUST002")).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert!(f.service.my_tickets(&actor("CUST001")).await.unwrap().is_empty());

    let logs = all_logs(&f, &ticket.id, "CUST002").await;
    assert_eq!(logs[1].activity_type, ActivityType::AttachmentAdded);
}

#[tokio::test]
async fn test_engineers_cannot_create() {
    let f = fixture();
    let err = f
        .service
        .create(wifi_ticket(None), None, &actor("ENG001"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[tokio::test]
async fn test_idempotent_create() {
    let f = fixture();
    let customer = actor("CUST001");

    let first = f
        .service
        .create(wifi_ticket(None), Some("req-42"), &customer)
        .await
        .unwrap();
    let again = f
        .service
        .create(wifi_ticket(None), Some("req-42"), &customer)
        .await
        .unwrap();
    assert_eq!(first.id, again.id);
    assert_eq!(f.service.store().list_tickets().unwrap().len(), 1);

    let err = f
        .service
        .create(wifi_ticket(Some(Priority::Low)), Some("req-42"), &customer)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
    assert_eq!(f.service.store().list_tickets().unwrap().len(), 1);
}

// ── Transitions and authorization ────────────────────────────────────

#[tokio::test]
async fn test_unauthorized_transition_changes_nothing() {
    let f = fixture();
    let ticket = create(&f, None).await;
    let ticket = assign(&f, &ticket.id, &["ENG001"]).await;
    let log_len = all_logs(&f, &ticket.id, "TRI1").await.len();

    // ENG002 is not an assignee
    let err = f
        .service
        .transition(&ticket.id, TicketStatus::InProgress, None, &actor("ENG002"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TicketError::UnauthorizedTransition {
            role: Role::NocEngineer,
            from: TicketStatus::Assigned,
            to: TicketStatus::InProgress,
        }
    );

    let after = f.service.get(&ticket.id, &actor("TRI1")).await.unwrap();
    assert_eq!(after, ticket);
    assert_eq!(all_logs(&f, &ticket.id, "TRI1").await.len(), log_len);
}

#[tokio::test]
async fn test_team_lead_resolves_only_team_tickets() {
    let f = fixture();
    f.service
        .update_team_members(
            &actor("TL2"),
            MemberChanges {
                add: vec!["FE001".into()],
                remove: Vec::new(),
            },
        )
        .await
        .unwrap();

    let ticket = create(&f, None).await;
    assign(&f, &ticket.id, &["ENG001"]).await;
    let fixed = f
        .service
        .transition(&ticket.id, TicketStatus::Fixed, None, &actor("ENG001"))
        .await
        .unwrap();
    let log_len = all_logs(&f, &ticket.id, "TRI1").await.len();

    // ENG001 sits on TL1's team, not TL2's
    let err = f
        .service
        .transition(&ticket.id, TicketStatus::Resolved, None, &actor("TL2"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Forbidden);
    assert_eq!(f.service.get(&ticket.id, &actor("TRI1")).await.unwrap(), fixed);
    assert_eq!(all_logs(&f, &ticket.id, "TRI1").await.len(), log_len);

    let resolved = f
        .service
        .transition(&ticket.id, TicketStatus::Resolved, None, &actor("TL1"))
        .await
        .unwrap();
    assert_eq!(resolved.status, TicketStatus::Resolved);
}

#[tokio::test]
async fn test_illegal_edge_rejected() {
    let f = fixture();
    let ticket = create(&f, None).await;
    let err = f
        .service
        .transition(&ticket.id, TicketStatus::Fixed, None, &actor("TRI1"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidTransition);
}

#[tokio::test]
async fn test_same_status_is_a_no_op() {
    let f = fixture();
    let ticket = create(&f, None).await;
    let ticket = assign(&f, &ticket.id, &["ENG001"]).await;
    let again = f
        .service
        .transition(&ticket.id, TicketStatus::Assigned, None, &actor("CUST001"))
        .await
        .unwrap();
    assert_eq!(again.log_sequence, ticket.log_sequence);
}

#[tokio::test]
async fn test_replayed_history_follows_table() {
    let f = fixture();
    let ticket = create(&f, None).await;
    let id = ticket.id.clone();
    let eng = actor("ENG001");

    assign(&f, &id, &["ENG001"]).await;
    f.service
        .transition(&id, TicketStatus::InProgress, Some("On it"), &eng)
        .await
        .unwrap();
    f.service
        .transition(&id, TicketStatus::Fixed, None, &eng)
        .await
        .unwrap();
    f.service
        .reopen(&id, "Still dropping", &actor("CUST001"))
        .await
        .unwrap();
    assign(&f, &id, &["ENG002"]).await;

    let logs = all_logs(&f, &id, "TRI1").await;
    let history = replay(&logs);
    assert!(!history.is_empty());
    assert!(history.iter().all(|r| is_legal_transition(r.from, r.to)));
    for pair in history.windows(2) {
        assert_eq!(pair[0].to, pair[1].from);
    }
    assert_eq!(history.last().unwrap().to, TicketStatus::Assigned);
}

// ── Activity log ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_logs_ordered_and_internal_hidden_from_customer() {
    let f = fixture();
    let ticket = create(&f, None).await;
    let id = ticket.id.clone();
    assign(&f, &id, &["ENG001"]).await;

    f.service
        .comment(&id, "Checked the AP firmware", true, &actor("ENG001"))
        .await
        .unwrap();
    f.service
        .comment(&id, "We are looking into it", false, &actor("ENG001"))
        .await
        .unwrap();

    let staff = all_logs(&f, &id, "TRI1").await;
    let customer = all_logs(&f, &id, "CUST001").await;
    assert!(staff.windows(2).all(|w| w[0].sequence < w[1].sequence));
    assert!(staff.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    assert!(staff.iter().any(|e| e.internal_only));
    assert!(customer.iter().all(|e| !e.internal_only));
    assert_eq!(customer.len() + 1, staff.len());

    let err = f
        .service
        .comment(&id, "secret", true, &actor("CUST001"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[tokio::test]
async fn test_logs_paging() {
    let f = fixture();
    let ticket = create(&f, None).await;
    for i in 0..5 {
        f.service
            .comment(&ticket.id, &format!("update {}", i), false, &actor("CUST001"))
            .await
            .unwrap();
    }
    let page = f
        .service
        .logs(&ticket.id, &actor("CUST001"), PageRequest::new(2, 2))
        .await
        .unwrap();
    assert_eq!(page.total, 6);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].sequence, 3);
}

#[tokio::test]
async fn test_customer_cannot_view_other_tickets() {
    let f = fixture();
    let ticket = create(&f, None).await;
    let err = f
        .service
        .get(&ticket.id, &actor("CUST002"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

// ── SLA ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_critical_ticket_at_risk_then_breached() {
    let f = fixture();
    let ticket = create(&f, Some(Priority::Critical)).await;
    assert_eq!(ticket.sla.deadline, t0() + Duration::hours(4));
    let mut events = f.service.subscribe();
    let sweeper = f.service.sweeper();

    f.clock.set(t0() + Duration::hours(3));
    let report = sweeper.sweep_once();
    assert_eq!(report.at_risk, vec![ticket.id.clone()]);
    assert!(report.breached.is_empty());

    // Second pass in the same window does not re-flag
    let report = sweeper.sweep_once();
    assert!(report.at_risk.is_empty());

    f.clock.set(t0() + Duration::hours(5));
    let report = sweeper.sweep_once();
    assert_eq!(report.breached, vec![ticket.id.clone()]);

    let stored = f.service.get(&ticket.id, &actor("TRI1")).await.unwrap();
    assert!(stored.sla.breached);
    assert!(stored.sla.is_breached(f.clock.now()));

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(event.event_type());
    }
    assert_eq!(kinds, vec!["sla_at_risk", "sla_breached"]);

    let metrics = f.service.sweep_metrics().snapshot();
    assert_eq!(metrics.sweeps, 3);
    assert_eq!(metrics.at_risk_flagged, 1);
    assert_eq!(metrics.breaches_flagged, 1);
}

#[tokio::test]
async fn test_reopen_resumes_sla_and_triage_cannot_reopen() {
    let f = fixture();
    let ticket = create(&f, None).await;
    let id = ticket.id.clone();
    let eng = actor("ENG001");
    assign(&f, &id, &["ENG001"]).await;
    f.service
        .transition(&id, TicketStatus::InProgress, None, &eng)
        .await
        .unwrap();

    f.clock.set(t0() + Duration::hours(2));
    let resolved = f
        .service
        .transition(&id, TicketStatus::Resolved, None, &eng)
        .await
        .unwrap();
    assert_eq!(resolved.resolved_at, Some(t0() + Duration::hours(2)));
    assert!(!resolved.sla.is_running());

    f.clock.set(t0() + Duration::hours(30));
    let err = f
        .service
        .transition(&id, TicketStatus::Reopened, None, &actor("TRI1"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnauthorizedTransition);
    assert_eq!(
        f.service.get(&id, &actor("TRI1")).await.unwrap(),
        resolved
    );

    let reopened = f
        .service
        .reopen(&id, "Dropped again this morning", &actor("CUST001"))
        .await
        .unwrap();
    let now = t0() + Duration::hours(30);
    assert_eq!(reopened.status, TicketStatus::Reopened);
    assert_eq!(reopened.sla.started_at, now);
    assert_eq!(reopened.sla.remaining(now), Duration::hours(12));
    assert!(!reopened.sla.breached);
    assert_eq!(reopened.resolved_at, None);

    let logs = all_logs(&f, &id, "CUST001").await;
    let tail: Vec<ActivityType> = logs.iter().rev().take(2).map(|e| e.activity_type).collect();
    assert_eq!(tail, vec![ActivityType::Comment, ActivityType::Reopened]);
}

#[tokio::test]
async fn test_priority_change_recomputes_deadline_from_start() {
    let f = fixture();
    let ticket = create(&f, None).await;
    assign(&f, &ticket.id, &["ENG001"]).await;
    f.clock.advance(Duration::hours(1));

    let updated = f
        .service
        .change_priority(&ticket.id, Some(Priority::Critical), None, &actor("TL1"))
        .await
        .unwrap();
    assert_eq!(updated.sla.started_at, t0());
    assert_eq!(updated.sla.deadline, t0() + Duration::hours(4));

    let logs = all_logs(&f, &ticket.id, "TRI1").await;
    assert_eq!(logs.last().unwrap().activity_type, ActivityType::PriorityChange);

    let err = f
        .service
        .change_priority(&ticket.id, Some(Priority::Low), None, &actor("ENG001"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[tokio::test]
async fn test_priority_change_after_breach_does_not_rebreach() {
    let f = fixture();
    let ticket = create(&f, Some(Priority::Critical)).await;
    assign(&f, &ticket.id, &["ENG001"]).await;
    let mut events = f.service.subscribe();
    let sweeper = f.service.sweeper();

    f.clock.set(t0() + Duration::hours(10));
    let report = sweeper.sweep_once();
    assert_eq!(report.breached, vec![ticket.id.clone()]);

    // 8h from the original start is still behind the clock
    let updated = f
        .service
        .change_priority(&ticket.id, Some(Priority::High), None, &actor("TL1"))
        .await
        .unwrap();
    assert_eq!(updated.sla.deadline, t0() + Duration::hours(8));
    assert!(updated.sla.breached);
    assert!(updated.sla.at_risk_flagged);

    let report = sweeper.sweep_once();
    assert!(report.breached.is_empty());
    assert!(report.at_risk.is_empty());

    // A LOW deadline is 14h away, so the ticket may breach again later
    let relaxed = f
        .service
        .change_priority(&ticket.id, Some(Priority::Low), None, &actor("TL1"))
        .await
        .unwrap();
    assert!(!relaxed.sla.breached);
    assert!(!relaxed.sla.at_risk_flagged);

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(event.event_type());
    }
    assert_eq!(
        kinds.iter().filter(|k| **k == "sla_breached").count(),
        1,
        "events: {kinds:?}"
    );
    assert_eq!(f.service.sweep_metrics().snapshot().breaches_flagged, 1);
}

// ── Assignment ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_reassign_to_unknown_engineer_keeps_assignees() {
    let f = fixture();
    let ticket = create(&f, None).await;
    let ticket = assign(&f, &ticket.id, &["ENG001"]).await;

    let err = f
        .service
        .reassign(&ticket.id, vec!["ENG404".into()], &actor("TRI1"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TicketError::UnknownEngineer {
            engineer_id: "ENG404".into()
        }
    );
    let after = f.service.get(&ticket.id, &actor("TRI1")).await.unwrap();
    assert_eq!(after.assignees, vec!["ENG001".to_string()]);
}

#[tokio::test]
async fn test_team_lead_reassign_scoped_to_team() {
    let f = fixture();
    let ticket = create(&f, None).await;
    assign(&f, &ticket.id, &["ENG001"]).await;

    let moved = f
        .service
        .reassign(&ticket.id, vec!["ENG002".into()], &actor("TL1"))
        .await
        .unwrap();
    assert_eq!(moved.assignees, vec!["ENG002".to_string()]);

    let err = f
        .service
        .reassign(&ticket.id, vec!["FE001".into()], &actor("TL1"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnknownEngineer);

    let err = f
        .service
        .reassign(&ticket.id, vec!["ENG001".into()], &actor("TL2"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::TeamNotConfigured);

    let err = f
        .service
        .reassign(&ticket.id, Vec::new(), &actor("TRI1"))
        .await
        .unwrap_err();
    assert_eq!(err, TicketError::EmptyAssignment);
}

#[tokio::test]
async fn test_triage_twice_is_already_triaged() {
    let f = fixture();
    let ticket = create(&f, None).await;
    assign(&f, &ticket.id, &["ENG001"]).await;
    let err = f
        .service
        .triage(
            &ticket.id,
            TriageRequest {
                engineer_ids: vec!["ENG002".into()],
                ..TriageRequest::default()
            },
            &actor("TRI2"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::AlreadyTriaged);
}

#[tokio::test]
async fn test_field_dispatch_path() {
    let f = fixture();
    let ticket = create(&f, None).await;
    let id = ticket.id.clone();

    let dispatched = f
        .service
        .triage(
            &id,
            TriageRequest {
                field_dispatch: true,
                note: Some("Needs a site visit".into()),
                ..TriageRequest::default()
            },
            &actor("TRI1"),
        )
        .await
        .unwrap();
    assert_eq!(dispatched.status, TicketStatus::AwaitingField);
    assert!(dispatched.field_dispatch);

    let err = f
        .service
        .triage(
            &id,
            TriageRequest {
                engineer_ids: vec!["ENG001".into()],
                ..TriageRequest::default()
            },
            &actor("TRI1"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnknownEngineer);

    assign(&f, &id, &["FE001"]).await;
    let field = actor("FE001");
    for status in [
        TicketStatus::InProgress,
        TicketStatus::FieldVisitComplete,
        TicketStatus::Resolved,
    ] {
        f.service.transition(&id, status, None, &field).await.unwrap();
    }

    let rated = f
        .service
        .feedback(&id, 5, Some("Quick visit"), &actor("CUST001"))
        .await
        .unwrap();
    assert_eq!(rated.feedback.as_ref().unwrap().rating, 5);
    assert_eq!(rated.status, TicketStatus::Resolved);

    let err = f
        .service
        .feedback(&id, 4, None, &actor("CUST001"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[tokio::test]
async fn test_feedback_rules() {
    let f = fixture();
    let ticket = create(&f, None).await;
    let err = f
        .service
        .feedback(&ticket.id, 5, None, &actor("CUST001"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidRequest);

    assign(&f, &ticket.id, &["ENG001"]).await;
    f.service
        .transition(&ticket.id, TicketStatus::Fixed, None, &actor("ENG001"))
        .await
        .unwrap();
    let err = f
        .service
        .feedback(&ticket.id, 0, None, &actor("CUST001"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
    let err = f
        .service
        .feedback(&ticket.id, 3, None, &actor("ENG001"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

// ── Queries ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_work_queues() {
    let f = fixture();
    let urgent = create(&f, Some(Priority::Critical)).await;
    let routine = create(&f, Some(Priority::Low)).await;

    let queue = f.service.pending(&actor("TRI1")).await.unwrap();
    let ids: Vec<&str> = queue.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec![urgent.id.as_str(), routine.id.as_str()]);

    assign(&f, &routine.id, &["ENG001"]).await;
    assert_eq!(f.service.pending(&actor("TRI1")).await.unwrap().len(), 1);
    let work = f.service.pending(&actor("ENG001")).await.unwrap();
    assert_eq!(work.len(), 1);
    assert_eq!(work[0].id, routine.id);

    let active = f.service.team_active(&actor("TL1")).await.unwrap();
    assert_eq!(active.len(), 1);
    let err = f.service.team_active(&actor("TL2")).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::TeamNotConfigured);

    f.clock.set(t0() + Duration::hours(23));
    let risky = f
        .service
        .team_sla_risk(&actor("TL1"), Some(Duration::hours(2)))
        .await
        .unwrap();
    assert_eq!(risky.len(), 1);
}

#[tokio::test]
async fn test_manager_filters() {
    let f = fixture();
    let late = create(&f, Some(Priority::Critical)).await;
    let calm = create(&f, Some(Priority::Low)).await;
    assign(&f, &calm.id, &["ENG001"]).await;
    f.clock.set(t0() + Duration::hours(5));

    let manager = actor("MGR1");
    let breached = f
        .service
        .all_tickets(
            &manager,
            TicketFilter {
                sla_breached: true,
                ..TicketFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(breached.len(), 1);
    assert_eq!(breached[0].id, late.id);

    let team = f
        .service
        .all_tickets(
            &manager,
            TicketFilter {
                team_id: Some("TL1".into()),
                ..TicketFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(team.len(), 1);
    assert_eq!(team[0].id, calm.id);

    let err = f
        .service
        .all_tickets(
            &manager,
            TicketFilter {
                team_id: Some("TL404".into()),
                ..TicketFilter::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);

    let err = f
        .service
        .all_tickets(&actor("ENG001"), TicketFilter::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

// ── Teams ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_lead_cannot_be_removed_from_team() {
    let f = fixture();
    let lead = actor("TL1");
    let before = f.service.team(&lead).await.unwrap();

    let err = f
        .service
        .update_team_members(
            &lead,
            MemberChanges {
                add: Vec::new(),
                remove: vec!["TL1".into()],
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
    assert_eq!(f.service.team(&lead).await.unwrap(), before);
}

#[tokio::test]
async fn test_team_created_on_first_update() {
    let f = fixture();
    let lead = actor("TL2");
    assert_eq!(
        f.service.team(&lead).await.unwrap_err().code(),
        ErrorCode::TeamNotConfigured
    );

    let unassigned = f.service.unassigned_engineers(&lead).await.unwrap();
    assert_eq!(unassigned.len(), 1);
    assert_eq!(unassigned[0].id, "FE001");

    let err = f
        .service
        .update_team_members(
            &lead,
            MemberChanges {
                add: vec!["ENG001".into()],
                remove: Vec::new(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidRequest);

    let team = f
        .service
        .update_team_members(
            &lead,
            MemberChanges {
                add: vec!["FE001".into()],
                remove: Vec::new(),
            },
        )
        .await
        .unwrap();
    assert_eq!(team.lead_id, "TL2");
    assert!(team.is_member("FE001"));

    let members = f.service.team_members(&lead).await.unwrap();
    let ids: Vec<&str> = members.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["TL2", "FE001"]);
}

#[tokio::test]
async fn test_change_role_guards_team_and_ticket_state() {
    let f = fixture();
    let manager = actor("MGR1");

    let err = f
        .service
        .change_role(&actor("TL1"), "TRI2", Role::Agent)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Forbidden);

    for (user, role) in [
        ("ENG001", Role::Agent), // on TL1's team
        ("TL1", Role::Manager), // leads a team
        ("MGR1", Role::Agent), // self
        ("TRI2", Role::NocAdmin), // not assignable
        ("CUST001", Role::Agent), // customer account
    ] {
        let err = f.service.change_role(&manager, user, role).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRequest, "{user} → {role}");
    }
    assert_eq!(
        f.service
            .change_role(&manager, "NOBODY", Role::Agent)
            .await
            .unwrap_err()
            .code(),
        ErrorCode::NotFound
    );

    // FE001 is on no team; once holding a ticket they stay an engineer
    let ticket = create(&f, None).await;
    assign(&f, &ticket.id, &["FE001"]).await;
    let moved = f
        .service
        .change_role(&manager, "FE001", Role::NocEngineer)
        .await
        .unwrap();
    assert_eq!(moved.role, Role::NocEngineer);
    let err = f
        .service
        .change_role(&manager, "FE001", Role::TriageOfficer)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidRequest);

    let promoted = f.service.change_role(&manager, "TL2", Role::Manager).await.unwrap();
    assert_eq!(promoted.role, Role::Manager);
    assert_eq!(
        f.service.resolve_actor("TL2").unwrap(),
        Actor::new("TL2", Role::Manager)
    );
}

#[tokio::test]
async fn test_directory_listings() {
    let f = fixture();
    let users = f.service.list_users(&actor("MGR1")).await.unwrap();
    assert!(users.iter().all(|u| u.role != Role::Customer));
    assert_eq!(users.first().map(|u| u.id.as_str()), Some("AGT001"));
    assert_eq!(
        f.service.list_users(&actor("TL1")).await.unwrap_err().code(),
        ErrorCode::Forbidden
    );

    let teams = f.service.list_teams(&actor("MGR1")).await.unwrap();
    assert_eq!(teams.len(), 1);
    assert_eq!(teams[0].lead_id, "TL1");
    assert_eq!(f.service.list_teams(&actor("TL2")).await.unwrap().len(), 1);
    assert_eq!(
        f.service.list_teams(&actor("ENG001")).await.unwrap_err().code(),
        ErrorCode::Forbidden
    );
}

#[tokio::test]
async fn test_resolve_actor_uses_directory() {
    let f = fixture();
    assert_eq!(
        f.service.resolve_actor("TRI1").unwrap(),
        Actor::new("TRI1", Role::TriageOfficer)
    );
    assert_eq!(
        f.service.resolve_actor("NOBODY").unwrap_err().code(),
        ErrorCode::NotFound
    );

    let mut retired = User::new("ENG009", "Retired", Role::L1Engineer);
    retired.active = false;
    f.service.upsert_user(&retired).unwrap();
    assert_eq!(
        f.service.resolve_actor("ENG009").unwrap_err().code(),
        ErrorCode::Forbidden
    );
}

// ── Storage failure ──────────────────────────────────────────────────

/// Memory store whose commits can be switched off
struct FlakyStore {
    inner: MemoryStore,
    offline: AtomicBool,
}

impl TicketStore for FlakyStore {
    fn next_ticket_number(&self) -> StoreResult<u64> {
        self.inner.next_ticket_number()
    }
    fn get_ticket(&self, id: &str) -> StoreResult<Option<Ticket>> {
        self.inner.get_ticket(id)
    }
    fn list_tickets(&self) -> StoreResult<Vec<Ticket>> {
        self.inner.list_tickets()
    }
    fn entries(&self, ticket_id: &str) -> StoreResult<Vec<ActivityLogEntry>> {
        self.inner.entries(ticket_id)
    }
    fn commit(&self, commit: Commit) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("disk offline".into()));
        }
        self.inner.commit(commit)
    }
    fn idempotency(&self, key: &str) -> StoreResult<Option<IdempotencyRecord>> {
        self.inner.idempotency(key)
    }
    fn get_user(&self, id: &str) -> StoreResult<Option<User>> {
        self.inner.get_user(id)
    }
    fn put_user(&self, user: &User) -> StoreResult<()> {
        self.inner.put_user(user)
    }
    fn list_users(&self) -> StoreResult<Vec<User>> {
        self.inner.list_users()
    }
    fn get_team(&self, lead_id: &str) -> StoreResult<Option<Team>> {
        self.inner.get_team(lead_id)
    }
    fn put_team(&self, team: &Team) -> StoreResult<()> {
        self.inner.put_team(team)
    }
    fn list_teams(&self) -> StoreResult<Vec<Team>> {
        self.inner.list_teams()
    }
}

#[tokio::test]
async fn test_failed_commit_leaves_no_partial_effect() {
    let store = Arc::new(FlakyStore {
        inner: MemoryStore::new(),
        offline: AtomicBool::new(false),
    });
    let f = fixture_on(store.clone());
    let ticket = create(&f, None).await;
    let mut events = f.service.subscribe();

    store.offline.store(true, Ordering::SeqCst);
    let err = f
        .service
        .triage(
            &ticket.id,
            TriageRequest {
                priority: Some(Priority::Critical),
                engineer_ids: vec!["ENG001".into()],
                ..TriageRequest::default()
            },
            &actor("TRI1"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Storage);
    assert!(err.is_retryable());

    let stored = f.service.get(&ticket.id, &actor("TRI1")).await.unwrap();
    assert_eq!(stored, ticket);
    assert_eq!(all_logs(&f, &ticket.id, "TRI1").await.len(), 1);
    assert!(matches!(
        events.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));

    store.offline.store(false, Ordering::SeqCst);
    let ticket = assign(&f, &ticket.id, &["ENG001"]).await;
    assert_eq!(ticket.status, TicketStatus::Assigned);
    let event = events.try_recv().unwrap();
    assert!(matches!(event, TicketEvent::Activity { .. }));
}
