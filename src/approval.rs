use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::users;

/// Account lifecycle. Stored as its wire string in `users.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    PendingEmailVerification,
    PendingApproval,
    Approved,
    Rejected,
    Suspended,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UserStatus::PendingEmailVerification => "PENDING_EMAIL_VERIFICATION",
            UserStatus::PendingApproval => "PENDING_APPROVAL",
            UserStatus::Approved => "APPROVED",
            UserStatus::Rejected => "REJECTED",
            UserStatus::Suspended => "SUSPENDED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING_EMAIL_VERIFICATION" => Some(UserStatus::PendingEmailVerification),
            "PENDING_APPROVAL" => Some(UserStatus::PendingApproval),
            "APPROVED" => Some(UserStatus::Approved),
            "REJECTED" => Some(UserStatus::Rejected),
            "SUSPENDED" => Some(UserStatus::Suspended),
            _ => None,
        }
    }
}

/// Transition table for the admin status endpoint. Email verification moves
/// PENDING_EMAIL_VERIFICATION to PENDING_APPROVAL through its own endpoint
/// and is deliberately absent here.
pub fn admin_can_transition(from: UserStatus, to: UserStatus) -> bool {
    matches!(
        (from, to),
        (UserStatus::PendingApproval, UserStatus::Approved)
            | (UserStatus::PendingApproval, UserStatus::Rejected)
            | (UserStatus::Approved, UserStatus::Suspended)
            | (UserStatus::Suspended, UserStatus::Approved)
    )
}

pub struct StatusStamp {
    pub approved_by: Option<Uuid>,
    pub rejected_reason: Option<String>,
}

/// Conditional status update: only flips the row if it is still in
/// `expected`. Returns false when another writer moved it first.
///
/// Only the columns that belong to the transition are written: the initial
/// approval stamps `approved_by`/`approved_at`, a rejection stores its
/// reason, and suspension/reinstatement touch nothing but the status, so
/// the original approval record survives a SUSPENDED round-trip.
pub fn transition_user_status(
    conn: &mut PgConnection,
    user_id: Uuid,
    expected: UserStatus,
    target: UserStatus,
    stamp: StatusStamp,
) -> QueryResult<bool> {
    let now = Utc::now().naive_utc();

    let updated = match (expected, target) {
        (UserStatus::PendingApproval, UserStatus::Approved) => diesel::update(
            users::table
                .find(user_id)
                .filter(users::status.eq(expected.as_str())),
        )
        .set((
            users::status.eq(target.as_str()),
            users::approved_by.eq(stamp.approved_by),
            users::approved_at.eq(Some(now)),
            users::updated_at.eq(now),
        ))
        .execute(conn)?,
        (_, UserStatus::Rejected) => diesel::update(
            users::table
                .find(user_id)
                .filter(users::status.eq(expected.as_str())),
        )
        .set((
            users::status.eq(target.as_str()),
            users::rejected_reason.eq(stamp.rejected_reason),
            users::updated_at.eq(now),
        ))
        .execute(conn)?,
        _ => diesel::update(
            users::table
                .find(user_id)
                .filter(users::status.eq(expected.as_str())),
        )
        .set((
            users::status.eq(target.as_str()),
            users::updated_at.eq(now),
        ))
        .execute(conn)?,
    };

    Ok(updated == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for status in [
            UserStatus::PendingEmailVerification,
            UserStatus::PendingApproval,
            UserStatus::Approved,
            UserStatus::Rejected,
            UserStatus::Suspended,
        ] {
            assert_eq!(UserStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(UserStatus::parse("ACTIVE"), None);
    }

    #[test]
    fn pending_approval_reaches_only_approved_or_rejected() {
        let from = UserStatus::PendingApproval;
        assert!(admin_can_transition(from, UserStatus::Approved));
        assert!(admin_can_transition(from, UserStatus::Rejected));
        assert!(!admin_can_transition(from, UserStatus::Suspended));
        assert!(!admin_can_transition(from, UserStatus::PendingEmailVerification));
    }

    #[test]
    fn suspension_only_from_approved() {
        assert!(admin_can_transition(UserStatus::Approved, UserStatus::Suspended));
        assert!(!admin_can_transition(UserStatus::Rejected, UserStatus::Suspended));
        assert!(!admin_can_transition(
            UserStatus::PendingEmailVerification,
            UserStatus::Suspended
        ));
    }

    #[test]
    fn suspended_account_can_be_reinstated() {
        assert!(admin_can_transition(UserStatus::Suspended, UserStatus::Approved));
        assert!(!admin_can_transition(UserStatus::Suspended, UserStatus::Rejected));
    }

    #[test]
    fn terminal_states_have_no_admin_exits() {
        for to in [
            UserStatus::PendingEmailVerification,
            UserStatus::PendingApproval,
            UserStatus::Approved,
            UserStatus::Suspended,
        ] {
            assert!(!admin_can_transition(UserStatus::Rejected, to));
        }
    }
}
