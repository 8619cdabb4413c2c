//! Mutation intents accepted by the command bus.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Invitation, InvitationStatus, RoleName, Team, User};

/// Every mutation the service performs. Each variant carries the acting user.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateTeam {
        team_id: Uuid,
        name: String,
        description: String,
        is_personal: bool,
        actor: Uuid,
    },
    UpdateTeam {
        team_id: Uuid,
        name: Option<String>,
        description: Option<String>,
        actor: Uuid,
    },
    UpdateLastActiveTeam {
        team_id: Uuid,
        actor: Uuid,
    },
    ChangeMemberRole {
        team_id: Uuid,
        membership_id: Uuid,
        role: RoleName,
        actor: Uuid,
    },
    DeleteTeamMember {
        team_id: Uuid,
        membership_id: Uuid,
        actor: Uuid,
    },
    InviteMember {
        team_id: Uuid,
        invitees: Vec<Invitee>,
        actor: Uuid,
    },
    ResendInvitation {
        team_id: Uuid,
        invitation_id: Uuid,
        actor: Uuid,
    },
    DeleteInvitation {
        team_id: Uuid,
        invitation_id: Uuid,
        actor: Uuid,
    },
    UpdateInvitationStatus {
        invitation_id: Uuid,
        status: InvitationStatus,
        actor: Uuid,
    },
    UpdateUser {
        first_name: Option<String>,
        last_name: Option<String>,
        phone_number: Option<String>,
        actor: Uuid,
    },
    DeleteUser {
        actor: Uuid,
    },
    UpdateUserAvatar {
        avatar_url: String,
        actor: Uuid,
    },
    DeleteUserAvatar {
        actor: Uuid,
    },
    UpdateTeamAvatar {
        team_id: Uuid,
        avatar_url: String,
        actor: Uuid,
    },
    DeleteTeamAvatar {
        team_id: Uuid,
        actor: Uuid,
    },
}

impl Command {
    /// Stable name used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::CreateTeam { .. } => "create_team",
            Command::UpdateTeam { .. } => "update_team",
            Command::UpdateLastActiveTeam { .. } => "update_last_active_team",
            Command::ChangeMemberRole { .. } => "change_member_role",
            Command::DeleteTeamMember { .. } => "delete_team_member",
            Command::InviteMember { .. } => "invite_member",
            Command::ResendInvitation { .. } => "resend_invitation",
            Command::DeleteInvitation { .. } => "delete_invitation",
            Command::UpdateInvitationStatus { .. } => "update_invitation_status",
            Command::UpdateUser { .. } => "update_user",
            Command::DeleteUser { .. } => "delete_user",
            Command::UpdateUserAvatar { .. } => "update_user_avatar",
            Command::DeleteUserAvatar { .. } => "delete_user_avatar",
            Command::UpdateTeamAvatar { .. } => "update_team_avatar",
            Command::DeleteTeamAvatar { .. } => "delete_team_avatar",
        }
    }

    pub fn actor(&self) -> Uuid {
        match self {
            Command::CreateTeam { actor, .. }
            | Command::UpdateTeam { actor, .. }
            | Command::UpdateLastActiveTeam { actor, .. }
            | Command::ChangeMemberRole { actor, .. }
            | Command::DeleteTeamMember { actor, .. }
            | Command::InviteMember { actor, .. }
            | Command::ResendInvitation { actor, .. }
            | Command::DeleteInvitation { actor, .. }
            | Command::UpdateInvitationStatus { actor, .. }
            | Command::UpdateUser { actor, .. }
            | Command::DeleteUser { actor }
            | Command::UpdateUserAvatar { actor, .. }
            | Command::DeleteUserAvatar { actor }
            | Command::UpdateTeamAvatar { actor, .. }
            | Command::DeleteTeamAvatar { actor, .. } => *actor,
        }
    }
}

/// One recipient of an `InviteMember` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Invitee {
    #[validate(email)]
    pub email: String,
    pub role: RoleName,
}

/// What a handled command produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandOutcome {
    Team(Team),
    User(User),
    Invitation(Invitation),
    Invitations(Vec<Invitation>),
    /// Avatar changed; the previous URL is returned so its object can be removed.
    AvatarReplaced { previous: Option<String> },
    Done,
}
