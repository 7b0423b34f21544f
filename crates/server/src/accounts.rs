//! Account side effects of email verification: queued mail and the verified flag.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medeventa_common::Result;
use medeventa_common::entities::{email_outbox, users};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingEmail {
    pub fn verification_code(recipient: &str, code: &str, ttl_minutes: u64) -> Self {
        Self {
            recipient: recipient.to_string(),
            subject: "MedEventa - code de verification".to_string(),
            body: format!(
                "Votre code de verification est : {}\n\nIl expire dans {} minutes.",
                code, ttl_minutes
            ),
        }
    }
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Queue a message for the mail relay.
    async fn enqueue_email(&self, email: OutgoingEmail) -> Result<()>;

    /// Returns false when the user does not exist.
    async fn mark_email_verified(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<bool>;
}

#[derive(Clone)]
pub struct SeaAccountStore {
    db: DatabaseConnection,
}

impl SeaAccountStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccountStore for SeaAccountStore {
    async fn enqueue_email(&self, email: OutgoingEmail) -> Result<()> {
        let row = email_outbox::ActiveModel {
            id: Set(Uuid::new_v4()),
            recipient: Set(email.recipient),
            subject: Set(email.subject),
            body: Set(email.body),
            created_at: Set(Utc::now().into()),
            sent_at: Set(None),
        };
        email_outbox::Entity::insert(row)
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn mark_email_verified(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let result = users::Entity::update_many()
            .col_expr(
                users::Column::EmailVerifiedAt,
                Expr::value(at.fixed_offset()),
            )
            .filter(users::Column::Id.eq(user_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }
}
