use axum::{
    extract::{Path, State},
    Json,
};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::approval::{admin_can_transition, transition_user_status, StatusStamp, UserStatus};
use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::User;
use crate::notify::{self, Recipient};
use crate::schema::users;
use crate::state::AppState;

#[derive(Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub status: String,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<String>,
    pub rejected_reason: Option<String>,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
            status: user.status,
            approved_by: user.approved_by,
            approved_at: user.approved_at.map(|at| at.and_utc().to_rfc3339()),
            rejected_reason: user.rejected_reason,
            created_at: user.created_at.and_utc().to_rfc3339(),
        }
    }
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct UpdateStatusResponse {
    pub message: String,
    pub user: UserResponse,
}

pub async fn list_users(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
) -> AppResult<Json<Vec<UserResponse>>> {
    admin.require_admin()?;
    let mut conn = state.db()?;

    let rows: Vec<User> = users::table.order(users::created_at.desc()).load(&mut conn)?;
    Ok(Json(rows.into_iter().map(UserResponse::from).collect()))
}

pub async fn get_user(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    admin.require_admin()?;
    let mut conn = state.db()?;

    let user: User = users::table.find(user_id).first(&mut conn)?;
    Ok(Json(UserResponse::from(user)))
}

pub async fn update_status(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> AppResult<Json<UpdateStatusResponse>> {
    admin.require_admin()?;

    let target = UserStatus::parse(payload.status.trim())
        .ok_or_else(|| AppError::bad_request(format!("unknown status '{}'", payload.status)))?;

    let mut conn = state.db()?;
    let user: User = users::table.find(user_id).first(&mut conn)?;
    let current = UserStatus::parse(&user.status)
        .ok_or_else(|| AppError::internal(format!("unknown stored status {}", user.status)))?;

    if !admin_can_transition(current, target) {
        return Err(AppError::bad_request(format!(
            "cannot move account from {} to {}",
            current.as_str(),
            target.as_str()
        )));
    }

    // Reinstatement keeps the original approval stamp; only the first
    // approval records the approver.
    let stamp = StatusStamp {
        approved_by: (current == UserStatus::PendingApproval && target == UserStatus::Approved)
            .then_some(admin.user_id),
        rejected_reason: matches!(target, UserStatus::Rejected)
            .then(|| payload.reason.clone())
            .flatten(),
    };

    let moved = transition_user_status(&mut conn, user.id, current, target, stamp)?;
    if !moved {
        return Err(AppError::bad_request(
            "account status changed concurrently; reload and retry",
        ));
    }

    let (message, subject) = status_notice(target, payload.reason.as_deref());
    notify::fan_out(
        &mut conn,
        state.mailer.as_ref(),
        Some(admin.user_id),
        notify::KIND_ACCOUNT_STATUS_CHANGED,
        &message,
        &subject,
        &[Recipient {
            user_id: user.id,
            email: user.email.clone(),
        }],
    )
    .await?;

    let updated: User = users::table.find(user_id).first(&mut conn)?;
    Ok(Json(UpdateStatusResponse {
        message: format!("account status updated to {}", target.as_str()),
        user: UserResponse::from(updated),
    }))
}

fn status_notice(target: UserStatus, reason: Option<&str>) -> (String, String) {
    match target {
        UserStatus::Approved => (
            "Votre compte PV Manager a été validé. Vous pouvez maintenant vous connecter."
                .to_string(),
            "PV Manager — compte validé".to_string(),
        ),
        UserStatus::Rejected => {
            let base = "Votre demande de compte PV Manager a été refusée.";
            let message = match reason {
                Some(reason) if !reason.trim().is_empty() => {
                    format!("{base} Motif : {}", reason.trim())
                }
                _ => base.to_string(),
            };
            (message, "PV Manager — compte refusé".to_string())
        }
        UserStatus::Suspended => (
            "Votre compte PV Manager a été suspendu par un administrateur.".to_string(),
            "PV Manager — compte suspendu".to_string(),
        ),
        UserStatus::PendingEmailVerification | UserStatus::PendingApproval => (
            format!("Le statut de votre compte est maintenant {}.", target.as_str()),
            "PV Manager — statut du compte".to_string(),
        ),
    }
}
