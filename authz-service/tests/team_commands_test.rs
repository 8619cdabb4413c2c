mod common;

use authz_service::{
    commands::{Command, CommandOutcome},
    models::RoleName,
};
use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;
use service_core::error::AppError;
use uuid::Uuid;

fn message(err: &AppError) -> String {
    match err {
        AppError::BadRequest(e)
        | AppError::NotFound(e)
        | AppError::Forbidden(e)
        | AppError::Conflict(e) => e.to_string(),
        other => other.to_string(),
    }
}

#[tokio::test]
async fn create_team_makes_the_creator_owner() {
    let app = TestApp::new().await;
    let user = app.create_user("owner@example.com", "Olive", "Owner").await;

    let team = app.create_team(user.user_id, "core").await;

    assert_eq!(team.team_name, "core");
    assert_eq!(team.creator_id, user.user_id);
    assert_eq!(
        app.role_of(team.team_id, user.user_id).await.as_deref(),
        Some("owner")
    );
}

#[tokio::test]
async fn create_team_with_existing_id_conflicts() {
    let app = TestApp::new().await;
    let user = app.create_user("owner@example.com", "Olive", "Owner").await;
    let team = app.create_team(user.user_id, "core").await;

    let err = app
        .state
        .bus
        .handle(Command::CreateTeam {
            team_id: team.team_id,
            name: "again".to_string(),
            description: String::new(),
            is_personal: false,
            actor: user.user_id,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(message(&err), "Team already exists");
    assert_eq!(app.store.teams().await.len(), 1);
}

#[tokio::test]
async fn update_team_keeps_blank_fields() {
    let app = TestApp::new().await;
    let user = app.create_user("owner@example.com", "Olive", "Owner").await;
    let team = app.create_team(user.user_id, "core").await;

    let outcome = app
        .state
        .bus
        .handle(Command::UpdateTeam {
            team_id: team.team_id,
            name: Some("  ".to_string()),
            description: Some("platform team".to_string()),
            actor: user.user_id,
        })
        .await
        .unwrap();

    let CommandOutcome::Team(updated) = outcome else {
        panic!("expected a team");
    };
    assert_eq!(updated.team_name, "core");
    assert_eq!(updated.description, "platform team");
}

#[tokio::test]
async fn owner_cannot_be_removed_or_demoted() {
    let app = TestApp::new().await;
    let owner = app.create_user("owner@example.com", "Olive", "Owner").await;
    let admin = app.create_user("admin@example.com", "Ada", "Admin").await;
    let team = app.create_team(owner.user_id, "core").await;
    app.add_member(team.team_id, admin.user_id, RoleName::Admin)
        .await;
    let owner_membership = app.membership_id(team.team_id, owner.user_id).await;

    let err = app
        .state
        .bus
        .handle(Command::DeleteTeamMember {
            team_id: team.team_id,
            membership_id: owner_membership,
            actor: admin.user_id,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    assert_eq!(message(&err), "You cannot delete owner of the team");

    let err = app
        .state
        .bus
        .handle(Command::ChangeMemberRole {
            team_id: team.team_id,
            membership_id: owner_membership,
            role: RoleName::Member,
            actor: admin.user_id,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    assert_eq!(
        app.role_of(team.team_id, owner.user_id).await.as_deref(),
        Some("owner")
    );
}

#[tokio::test]
async fn members_cannot_act_on_themselves() {
    let app = TestApp::new().await;
    let owner = app.create_user("owner@example.com", "Olive", "Owner").await;
    let admin = app.create_user("admin@example.com", "Ada", "Admin").await;
    let team = app.create_team(owner.user_id, "core").await;
    let admin_membership = app
        .add_member(team.team_id, admin.user_id, RoleName::Admin)
        .await;

    let err = app
        .state
        .bus
        .handle(Command::DeleteTeamMember {
            team_id: team.team_id,
            membership_id: admin_membership,
            actor: admin.user_id,
        })
        .await
        .unwrap_err();
    assert_eq!(message(&err), "You cannot delete yourself");

    let err = app
        .state
        .bus
        .handle(Command::ChangeMemberRole {
            team_id: team.team_id,
            membership_id: admin_membership,
            role: RoleName::Finance,
            actor: admin.user_id,
        })
        .await
        .unwrap_err();
    assert_eq!(message(&err), "You cannot change your own role");
}

#[tokio::test]
async fn role_cannot_be_changed_to_owner() {
    let app = TestApp::new().await;
    let owner = app.create_user("owner@example.com", "Olive", "Owner").await;
    let member = app.create_user("member@example.com", "Max", "Member").await;
    let team = app.create_team(owner.user_id, "core").await;
    let membership = app
        .add_member(team.team_id, member.user_id, RoleName::Member)
        .await;

    let err = app
        .state
        .bus
        .handle(Command::ChangeMemberRole {
            team_id: team.team_id,
            membership_id: membership,
            role: RoleName::Owner,
            actor: owner.user_id,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Forbidden(_)));
    assert_eq!(message(&err), "You cannot change role to owner");
    assert_eq!(
        app.role_of(team.team_id, member.user_id).await.as_deref(),
        Some("member")
    );
}

#[tokio::test]
async fn membership_of_another_team_is_rejected() {
    let app = TestApp::new().await;
    let owner = app.create_user("owner@example.com", "Olive", "Owner").await;
    let member = app.create_user("member@example.com", "Max", "Member").await;
    let core = app.create_team(owner.user_id, "core").await;
    let other = app.create_team(owner.user_id, "other").await;
    let membership = app
        .add_member(other.team_id, member.user_id, RoleName::Member)
        .await;

    let err = app
        .state
        .bus
        .handle(Command::DeleteTeamMember {
            team_id: core.team_id,
            membership_id: membership,
            actor: owner.user_id,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Forbidden(_)));
    assert_eq!(
        message(&err),
        format!(
            "Team with ID {} is not match with membership-team ID",
            core.team_id
        )
    );
}

#[tokio::test]
async fn change_role_and_remove_member() {
    let app = TestApp::new().await;
    let owner = app.create_user("owner@example.com", "Olive", "Owner").await;
    let member = app.create_user("member@example.com", "Max", "Member").await;
    let team = app.create_team(owner.user_id, "core").await;
    let membership = app
        .add_member(team.team_id, member.user_id, RoleName::Member)
        .await;

    app.state
        .bus
        .handle(Command::ChangeMemberRole {
            team_id: team.team_id,
            membership_id: membership,
            role: RoleName::Finance,
            actor: owner.user_id,
        })
        .await
        .unwrap();
    assert_eq!(
        app.role_of(team.team_id, member.user_id).await.as_deref(),
        Some("finance")
    );

    app.state
        .bus
        .handle(Command::DeleteTeamMember {
            team_id: team.team_id,
            membership_id: membership,
            actor: owner.user_id,
        })
        .await
        .unwrap();
    assert_eq!(app.role_of(team.team_id, member.user_id).await, None);
}

#[tokio::test]
async fn unknown_membership_is_not_found() {
    let app = TestApp::new().await;
    let owner = app.create_user("owner@example.com", "Olive", "Owner").await;
    let team = app.create_team(owner.user_id, "core").await;

    let err = app
        .state
        .bus
        .handle(Command::DeleteTeamMember {
            team_id: team.team_id,
            membership_id: Uuid::new_v4(),
            actor: owner.user_id,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn last_active_team_requires_membership() {
    let app = TestApp::new().await;
    let owner = app.create_user("owner@example.com", "Olive", "Owner").await;
    let outsider = app.create_user("outsider@example.com", "Oscar", "Out").await;
    let team = app.create_team(owner.user_id, "core").await;

    app.state
        .bus
        .handle(Command::UpdateLastActiveTeam {
            team_id: team.team_id,
            actor: owner.user_id,
        })
        .await
        .unwrap();
    let touched = app
        .store
        .memberships()
        .await
        .into_iter()
        .find(|m| m.team_id == team.team_id && m.user_id == owner.user_id)
        .unwrap();
    assert!(touched.last_active_utc.is_some());

    let err = app
        .state
        .bus
        .handle(Command::UpdateLastActiveTeam {
            team_id: team.team_id,
            actor: outsider.user_id,
        })
        .await
        .unwrap_err();
    assert_eq!(message(&err), "Team is not found");
}

#[tokio::test]
async fn team_avatar_returns_previous_url() {
    let app = TestApp::new().await;
    let owner = app.create_user("owner@example.com", "Olive", "Owner").await;
    let team = app.create_team(owner.user_id, "core").await;

    let first = app
        .state
        .bus
        .handle(Command::UpdateTeamAvatar {
            team_id: team.team_id,
            avatar_url: "https://cdn.example.com/a.png".to_string(),
            actor: owner.user_id,
        })
        .await
        .unwrap();
    assert_eq!(first, CommandOutcome::AvatarReplaced { previous: None });

    let removed = app
        .state
        .bus
        .handle(Command::DeleteTeamAvatar {
            team_id: team.team_id,
            actor: owner.user_id,
        })
        .await
        .unwrap();
    assert_eq!(
        removed,
        CommandOutcome::AvatarReplaced {
            previous: Some("https://cdn.example.com/a.png".to_string())
        }
    );
}

#[tokio::test]
async fn team_routes_enforce_roles_over_http() {
    let app = TestApp::new().await;
    let owner = app.create_user("owner@example.com", "Olive", "Owner").await;
    let member = app.create_user("member@example.com", "Max", "Member").await;
    let owner_token = app.token_for(owner.user_id);
    let member_token = app.token_for(member.user_id);

    let (status, body) = app
        .request(
            "POST",
            "/api/v1/teams",
            Some(&owner_token),
            Some(json!({ "name": "core", "description": "platform" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let team_id: Uuid = body["team_id"].as_str().unwrap().parse().unwrap();
    app.add_member(team_id, member.user_id, RoleName::Member)
        .await;

    let path = format!("/api/v1/teams/{}", team_id);

    let (status, body) = app
        .request(
            "PATCH",
            &path,
            Some(&member_token),
            Some(json!({ "name": "renamed" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], authz_service::services::FORBIDDEN_MESSAGE);

    let (status, body) = app
        .request(
            "PATCH",
            &path,
            Some(&owner_token),
            Some(json!({ "name": "renamed" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["team_name"], "renamed");

    let (status, _) = app
        .request(
            "PUT",
            &format!("{}/last-active", path),
            Some(&member_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn create_team_validates_name() {
    let app = TestApp::new().await;
    let owner = app.create_user("owner@example.com", "Olive", "Owner").await;
    let token = app.token_for(owner.user_id);

    let (status, body) = app
        .request("POST", "/api/v1/teams", Some(&token), Some(json!({ "name": "" })))
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Validation error");
}
