//! Invitation model - a pending offer to join a team with a given role.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Invitation status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Sent,
    Accepted,
    Declined,
    Expired,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Sent => "sent",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Declined => "declined",
            InvitationStatus::Expired => "expired",
        }
    }

    /// Accepted and declined invitations never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, InvitationStatus::Accepted | InvitationStatus::Declined)
    }
}

impl FromStr for InvitationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(InvitationStatus::Pending),
            "sent" => Ok(InvitationStatus::Sent),
            "accepted" => Ok(InvitationStatus::Accepted),
            "declined" => Ok(InvitationStatus::Declined),
            "expired" => Ok(InvitationStatus::Expired),
            _ => Err(format!("Invalid invitation status: {}", s)),
        }
    }
}

/// Invitation entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Invitation {
    pub invitation_id: Uuid,
    pub email: String,
    pub team_id: Uuid,
    pub role_id: Uuid,
    pub sender_id: Uuid,
    pub status: String,
    pub is_active: bool,
    pub expiry_utc: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Invitation {
    /// Create a pending invitation expiring `expiry_days` after `now`.
    pub fn new(
        email: String,
        team_id: Uuid,
        role_id: Uuid,
        sender_id: Uuid,
        now: DateTime<Utc>,
        expiry_days: i64,
    ) -> Self {
        Self {
            invitation_id: Uuid::new_v4(),
            email,
            team_id,
            role_id,
            sender_id,
            status: InvitationStatus::Pending.as_str().to_string(),
            is_active: true,
            expiry_utc: now + Duration::days(expiry_days),
            created_utc: now,
            updated_utc: now,
        }
    }

    /// Parsed status; unknown codes read as `None`.
    pub fn status(&self) -> Option<InvitationStatus> {
        self.status.parse().ok()
    }

    /// Still an open offer: active and pending or sent.
    pub fn is_outstanding(&self) -> bool {
        self.is_active
            && matches!(
                self.status(),
                Some(InvitationStatus::Pending) | Some(InvitationStatus::Sent)
            )
    }

    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.expiry_utc <= now
    }

    /// Reset an expired invitation to pending with a fresh expiry.
    ///
    /// Only an invitation whose status is `expired` and whose expiry has
    /// passed qualifies. A pending invitation past its expiry is rejected
    /// until something marks it expired.
    pub fn resend(&mut self, now: DateTime<Utc>, expiry_days: i64) -> Result<(), AppError> {
        if self.expiry_utc > now || self.status() != Some(InvitationStatus::Expired) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "invitation is not expired"
            )));
        }

        self.status = InvitationStatus::Pending.as_str().to_string();
        self.expiry_utc = now + Duration::days(expiry_days);
        self.updated_utc = now;
        Ok(())
    }

    /// Record the recipient's answer and close the invitation.
    pub fn respond(&mut self, answer: InvitationStatus, now: DateTime<Utc>) -> Result<(), AppError> {
        if !answer.is_terminal() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "invitation status must be accepted or declined"
            )));
        }

        self.status = answer.as_str().to_string();
        self.is_active = false;
        self.updated_utc = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invitation(now: DateTime<Utc>) -> Invitation {
        Invitation::new(
            "invitee@example.com".to_string(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            now,
            7,
        )
    }

    #[test]
    fn new_invitation_is_pending_for_seven_days() {
        let now = Utc::now();
        let inv = invitation(now);
        assert_eq!(inv.status(), Some(InvitationStatus::Pending));
        assert!(inv.is_active);
        assert!(inv.is_outstanding());
        assert_eq!(inv.expiry_utc, now + Duration::days(7));
    }

    #[test]
    fn resend_rejects_unexpired_invitation() {
        let now = Utc::now();
        let mut inv = invitation(now);
        let before = inv.expiry_utc;

        let result = inv.resend(now, 7);

        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(inv.expiry_utc, before);
        assert_eq!(inv.status(), Some(InvitationStatus::Pending));
    }

    #[test]
    fn resend_rejects_pending_invitation_past_expiry() {
        let now = Utc::now();
        let mut inv = invitation(now - Duration::days(8));
        assert!(inv.is_past_expiry(now));

        assert!(matches!(inv.resend(now, 7), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn resend_rejects_expired_status_with_future_expiry() {
        let now = Utc::now();
        let mut inv = invitation(now);
        inv.status = InvitationStatus::Expired.as_str().to_string();

        assert!(inv.resend(now, 7).is_err());
    }

    #[test]
    fn resend_resets_expired_invitation() {
        let now = Utc::now();
        let mut inv = invitation(now - Duration::days(8));
        inv.status = InvitationStatus::Expired.as_str().to_string();

        inv.resend(now, 7).unwrap();

        assert_eq!(inv.status(), Some(InvitationStatus::Pending));
        assert_eq!(inv.expiry_utc, now + Duration::days(7));
    }

    #[test]
    fn respond_closes_invitation() {
        let now = Utc::now();
        let mut inv = invitation(now);

        inv.respond(InvitationStatus::Declined, now).unwrap();

        assert_eq!(inv.status(), Some(InvitationStatus::Declined));
        assert!(!inv.is_active);
        assert!(!inv.is_outstanding());
    }

    #[test]
    fn respond_rejects_non_terminal_answer() {
        let now = Utc::now();
        let mut inv = invitation(now);
        assert!(inv.respond(InvitationStatus::Sent, now).is_err());
        assert!(inv.is_active);
    }
}
