use diesel::pg::PgConnection;
use diesel::prelude::*;
use tracing::warn;
use uuid::Uuid;

use crate::mailer::{Mailer, OutboundEmail};
use crate::models::NewNotification;
use crate::schema::notifications;

pub const KIND_ACCOUNT_PENDING_APPROVAL: &str = "account-pending-approval";
pub const KIND_ACCOUNT_STATUS_CHANGED: &str = "account-status-changed";
pub const KIND_DOCUMENT_SENT: &str = "document-sent";

pub struct Recipient {
    pub user_id: Uuid,
    pub email: String,
}

/// Records one in-app notification per recipient, then attempts one email
/// per recipient. Email delivery is best-effort: a transport failure is
/// logged for that recipient and the remaining fan-out continues.
pub async fn fan_out(
    conn: &mut PgConnection,
    mailer: &dyn Mailer,
    sender_id: Option<Uuid>,
    kind: &str,
    message: &str,
    subject: &str,
    recipients: &[Recipient],
) -> QueryResult<usize> {
    let rows: Vec<NewNotification> = recipients
        .iter()
        .map(|recipient| NewNotification {
            id: Uuid::new_v4(),
            recipient_id: recipient.user_id,
            sender_id,
            kind: kind.to_string(),
            message: message.to_string(),
        })
        .collect();

    let inserted = diesel::insert_into(notifications::table)
        .values(&rows)
        .execute(conn)?;

    for recipient in recipients {
        let email = OutboundEmail {
            to: recipient.email.clone(),
            subject: subject.to_string(),
            body: message.to_string(),
            attachment: None,
        };
        if let Err(err) = mailer.send(email).await {
            warn!(
                recipient = %recipient.email,
                kind,
                error = %err,
                "notification email failed; in-app record kept"
            );
        }
    }

    Ok(inserted)
}
