//! Team membership races: a lead's reassignment and a roster change on the
//! same team serialize, so a reassignment only ever lands on a member.
//!
//! Tests verify:
//! - Reassign racing a member removal ends in one of the two serial outcomes
//! - Neither operation waits on the other forever

use std::sync::Arc;
use std::time::Duration;

use lifecycle::assignment::MemberChanges;
use lifecycle::{
    Actor, Category, EngineConfig, ErrorCode, MemoryStore, NewTicket, Role, Team, TicketService,
    TriageRequest, User,
};

fn service() -> TicketService {
    let mut team = Team::new("TL1", "Core Network");
    team.add_member("ENG001");
    team.add_member("ENG002");
    let config = EngineConfig {
        users: vec![
            User::new("CUST001", "Carol Customer", Role::Customer),
            User::new("TRI1", "Tess Triage", Role::TriageOfficer),
            User::new("ENG001", "Alice Johnson", Role::L1Engineer),
            User::new("ENG002", "Bob Smith", Role::NocEngineer),
            User::new("TL1", "Terry Lead", Role::TeamLead),
        ],
        teams: vec![team],
        ..EngineConfig::default()
    };
    let service = TicketService::new(config, Arc::new(MemoryStore::new())).unwrap();
    service.seed_directory().unwrap();
    service
}

fn outage() -> NewTicket {
    NewTicket {
        title: "Core switch reboot loop".into(),
        description: "Rack B switch restarts every ten minutes".into(),
        category: Category::Hardware,
        sub_category: None,
        priority: None,
        customer_id: None,
        attachments: Vec::new(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reassign_racing_member_removal_never_lands_on_non_member() {
    let lead = Actor::new("TL1", Role::TeamLead);
    let mut reassigned = 0;
    let mut rejected = 0;

    for _ in 0..50 {
        let service = Arc::new(service());
        let ticket = service
            .create(outage(), None, &Actor::new("CUST001", Role::Customer))
            .await
            .unwrap();
        let request = TriageRequest {
            engineer_ids: vec!["ENG001".into()],
            ..TriageRequest::default()
        };
        service
            .triage(&ticket.id, request, &Actor::new("TRI1", Role::TriageOfficer))
            .await
            .unwrap();

        let reassign = {
            let service = service.clone();
            let lead = lead.clone();
            let id = ticket.id.clone();
            tokio::spawn(async move { service.reassign(&id, vec!["ENG002".into()], &lead).await })
        };
        let remove = {
            let service = service.clone();
            let lead = lead.clone();
            tokio::spawn(async move {
                let changes = MemberChanges {
                    add: Vec::new(),
                    remove: vec!["ENG002".into()],
                };
                service.update_team_members(&lead, changes).await
            })
        };

        let (reassign, remove) = tokio::time::timeout(
            Duration::from_secs(5),
            futures::future::join(reassign, remove),
        )
        .await
        .expect("reassign and roster update deadlocked");
        let team = remove.unwrap().unwrap();
        assert!(!team.is_member("ENG002"));

        let stored = service.get(&ticket.id, &lead).await;
        match reassign.unwrap() {
            // Reassign went first: ENG002 was still on the team
            Ok(moved) => {
                assert_eq!(moved.assignees, vec!["ENG002".to_string()]);
                reassigned += 1;
            }
            // Removal went first: nothing about the ticket changed
            Err(e) => {
                assert_eq!(e.code(), ErrorCode::UnknownEngineer);
                assert_eq!(stored.unwrap().assignees, vec!["ENG001".to_string()]);
                rejected += 1;
            }
        }
    }

    assert_eq!(reassigned + rejected, 50);
}
