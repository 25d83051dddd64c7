//! Expansion of a scheduled send's target into concrete recipients.

use tracing::debug;

use crate::error::{MailerError, MailerResult};
use crate::models::{EmailTemplate, EmailUser, RecipientTarget, ScheduledEmail};
use crate::repository::{ClusterRepository, UserRepository};

/// Recipients of `scheduled`, in ascending user id order.
///
/// A cluster target yields every member, a user target that single user,
/// and no target an empty list. A dangling reference is an integrity error.
pub async fn resolve_recipients<S>(
    store: &S,
    scheduled: &ScheduledEmail,
) -> MailerResult<Vec<EmailUser>>
where
    S: ClusterRepository + UserRepository + ?Sized,
{
    let recipients = match scheduled.target() {
        RecipientTarget::Cluster(cluster_id) => {
            let cluster = store.get_cluster(cluster_id).await?.ok_or_else(|| {
                MailerError::Integrity(format!(
                    "Scheduled email {} references missing cluster {}",
                    scheduled.id, cluster_id
                ))
            })?;
            store.get_users(&cluster.member_ids).await?
        }
        RecipientTarget::User(user_id) => {
            let user = store.get_user(user_id).await?.ok_or_else(|| {
                MailerError::Integrity(format!(
                    "Scheduled email {} references missing user {}",
                    scheduled.id, user_id
                ))
            })?;
            vec![user]
        }
        RecipientTarget::Nobody => Vec::new(),
    };

    debug!(
        scheduled_email_id = %scheduled.id,
        target = ?scheduled.target(),
        recipients = recipients.len(),
        "Resolved recipients"
    );

    Ok(recipients)
}

/// Operator-facing name of a send: `"{template} -> {user|cluster|No recipient}"`.
pub async fn describe_scheduled_email<S>(
    store: &S,
    scheduled: &ScheduledEmail,
    template: &EmailTemplate,
) -> String
where
    S: ClusterRepository + UserRepository + ?Sized,
{
    let target = match scheduled.target() {
        RecipientTarget::Cluster(id) => match store.get_cluster(id).await {
            Ok(Some(cluster)) => cluster.to_string(),
            _ => format!("cluster {id}"),
        },
        RecipientTarget::User(id) => match store.get_user(id).await {
            Ok(Some(user)) => user.to_string(),
            _ => format!("user {id}"),
        },
        RecipientTarget::Nobody => "No recipient".to_string(),
    };

    format!("{} -> {}", template, target)
}
