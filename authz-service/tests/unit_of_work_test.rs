mod common;

use authz_service::{
    commands::{Command, Invitee},
    models::RoleName,
    services::Decision,
};
use common::TestApp;
use std::time::Duration;
use tokio::time::timeout;

#[tokio::test]
async fn cancelled_command_leaves_no_writes() {
    let app = TestApp::new().await;
    let owner = app.create_user("owner@example.com", "Olive", "Owner").await;
    let team = app.create_team(owner.user_id, "core").await;
    app.mailer.block_sends(true);

    let bus = app.state.bus.clone();
    let team_id = team.team_id;
    let actor = owner.user_id;
    let handle = tokio::spawn(async move {
        bus.handle(Command::InviteMember {
            team_id,
            invitees: vec![Invitee {
                email: "new@example.com".to_string(),
                role: RoleName::Member,
            }],
            actor,
        })
        .await
    });

    // The invitation row is written inside the transaction before the send hangs.
    timeout(Duration::from_secs(5), app.mailer.wait_until_blocked())
        .await
        .expect("send never started");

    // Authorization reads keep working while the command holds its transaction.
    let decision = timeout(
        Duration::from_secs(5),
        app.state.engine.decide(
            &owner.user_id.to_string(),
            "PATCH",
            &format!("/api/v1/teams/{}", team.team_id),
        ),
    )
    .await
    .expect("decision blocked behind the open transaction")
    .unwrap();
    assert_eq!(decision, Decision::Allow);

    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());

    assert!(app.store.invitations().await.is_empty());

    // The aborted transaction released the store; later commands proceed.
    app.mailer.block_sends(false);
    let outcome = timeout(
        Duration::from_secs(5),
        app.state.bus.handle(Command::InviteMember {
            team_id: team.team_id,
            invitees: vec![Invitee {
                email: "new@example.com".to_string(),
                role: RoleName::Member,
            }],
            actor: owner.user_id,
        }),
    )
    .await
    .expect("store still locked after cancellation");
    assert!(outcome.is_ok());
    assert_eq!(app.store.invitations().await.len(), 1);
}

#[tokio::test]
async fn failed_command_is_rolled_back_as_a_whole() {
    let app = TestApp::new().await;
    let owner = app.create_user("owner@example.com", "Olive", "Owner").await;
    let team = app.create_team(owner.user_id, "core").await;
    let invited = app.create_user("new@example.com", "Nia", "New").await;

    let created = app
        .state
        .bus
        .handle(Command::InviteMember {
            team_id: team.team_id,
            invitees: vec![Invitee {
                email: "new@example.com".to_string(),
                role: RoleName::Admin,
            }],
            actor: owner.user_id,
        })
        .await
        .unwrap();
    let authz_service::commands::CommandOutcome::Invitations(created) = created else {
        panic!("expected invitations");
    };

    // Already a member: the membership insert conflicts after the
    // invitation update, so neither write survives.
    app.add_member(team.team_id, invited.user_id, RoleName::Member)
        .await;

    let err = app
        .state
        .bus
        .handle(Command::UpdateInvitationStatus {
            invitation_id: created[0].invitation_id,
            status: authz_service::models::InvitationStatus::Accepted,
            actor: invited.user_id,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, service_core::error::AppError::Conflict(_)));

    let stored = app.find_invitation(created[0].invitation_id).await.unwrap();
    assert!(stored.is_active);
    assert_eq!(stored.status, "pending");
    assert_eq!(
        app.role_of(team.team_id, invited.user_id).await.as_deref(),
        Some("member")
    );
}
