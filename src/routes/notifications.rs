use axum::{extract::State, Json};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::AppResult;
use crate::models::Notification;
use crate::schema::notifications;
use crate::state::AppState;

#[derive(Serialize)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub kind: String,
    pub message: String,
    pub created_at: String,
}

impl From<Notification> for NotificationResponse {
    fn from(notification: Notification) -> Self {
        Self {
            id: notification.id,
            kind: notification.kind,
            message: notification.message,
            created_at: notification.created_at.and_utc().to_rfc3339(),
        }
    }
}

/// A user only ever sees their own notifications, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<NotificationResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<Notification> = notifications::table
        .filter(notifications::recipient_id.eq(user.user_id))
        .order(notifications::created_at.desc())
        .load(&mut conn)?;
    Ok(Json(
        rows.into_iter().map(NotificationResponse::from).collect(),
    ))
}
