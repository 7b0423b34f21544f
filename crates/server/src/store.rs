use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medeventa_common::entities::{attestations, events};
use medeventa_common::models::AttestationWithEvent;
use medeventa_common::{MedeventaError, Result, Role};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};
use uuid::Uuid;

pub type AttestationModel = attestations::Model;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttestation {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub file_path: String,
    pub unique_code: String,
    pub generated_at: DateTime<Utc>,
}

impl NewAttestation {
    fn to_active_model(&self) -> attestations::ActiveModel {
        attestations::ActiveModel {
            id: Set(Uuid::new_v4()),
            event_id: Set(self.event_id),
            user_id: Set(self.user_id),
            r#type: Set(self.role.as_str().to_string()),
            generated_at: Set(self.generated_at.into()),
            file_path: Set(self.file_path.clone()),
            unique_code: Set(Some(self.unique_code.clone())),
        }
    }

    /// Same row id, new file, code and date.
    fn overwrite(&self, previous: &AttestationModel) -> attestations::ActiveModel {
        let mut active: attestations::ActiveModel = previous.clone().into();
        active.generated_at = Set(self.generated_at.into());
        active.file_path = Set(self.file_path.clone());
        active.unique_code = Set(Some(self.unique_code.clone()));
        active
    }
}

/// Result of a conditional insert on the (event, user, type) key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insertion {
    Created(AttestationModel),
    /// Another request inserted the key first.
    Existing(AttestationModel),
}

/// Row written by a forced regeneration and the row it overwrote, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub row: AttestationModel,
    pub previous: Option<AttestationModel>,
}

#[async_trait]
pub trait AttestationStore: Send + Sync {
    async fn get(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> Result<Option<AttestationModel>>;

    async fn create(&self, attestation: NewAttestation) -> Result<Insertion>;

    /// Insert or overwrite the row for the key, returning the overwritten row
    /// as it was read under the row lock. Only used for forced regeneration.
    async fn replace(&self, attestation: NewAttestation) -> Result<Replacement>;

    async fn list_by_event(&self, event_id: Uuid) -> Result<Vec<AttestationModel>>;

    async fn list_by_user(
        &self,
        user_id: Uuid,
        event_id: Option<Uuid>,
    ) -> Result<Vec<AttestationWithEvent>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AttestationModel>>;

    async fn find_by_code(&self, unique_code: &str) -> Result<Option<AttestationModel>>;

    /// Returns false when no row matched.
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

#[derive(Clone)]
pub struct SeaAttestationStore {
    db: DatabaseConnection,
}

impl SeaAttestationStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn key_conflict() -> OnConflict {
    OnConflict::columns([
        attestations::Column::EventId,
        attestations::Column::UserId,
        attestations::Column::Type,
    ])
    .do_nothing()
    .to_owned()
}

fn by_key(event_id: Uuid, user_id: Uuid, role: Role) -> Select<attestations::Entity> {
    attestations::Entity::find()
        .filter(attestations::Column::EventId.eq(event_id))
        .filter(attestations::Column::UserId.eq(user_id))
        .filter(attestations::Column::Type.eq(role.as_str()))
}

/// Insert without overwriting; `Ok(None)` when the key already exists.
async fn insert_new<C: ConnectionTrait>(
    db: &C,
    attestation: &NewAttestation,
) -> Result<Option<AttestationModel>> {
    let inserted = attestations::Entity::insert(attestation.to_active_model())
        .on_conflict(key_conflict())
        .exec(db)
        .await;
    match inserted {
        Ok(result) => {
            let row = attestations::Entity::find_by_id(result.last_insert_id)
                .one(db)
                .await?
                .ok_or_else(|| DbErr::RecordNotFound("inserted attestation".to_string()))?;
            Ok(Some(row))
        }
        Err(DbErr::RecordNotInserted) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

async fn locked_by_key<C: ConnectionTrait>(
    db: &C,
    attestation: &NewAttestation,
) -> Result<Option<AttestationModel>> {
    let row = by_key(attestation.event_id, attestation.user_id, attestation.role)
        .lock_exclusive()
        .one(db)
        .await?;
    Ok(row)
}

#[async_trait]
impl AttestationStore for SeaAttestationStore {
    async fn get(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> Result<Option<AttestationModel>> {
        Ok(by_key(event_id, user_id, role).one(&self.db).await?)
    }

    async fn create(&self, attestation: NewAttestation) -> Result<Insertion> {
        if let Some(row) = insert_new(&self.db, &attestation).await? {
            return Ok(Insertion::Created(row));
        }
        let row = self
            .get(attestation.event_id, attestation.user_id, attestation.role)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound("conflicting attestation".to_string()))?;
        Ok(Insertion::Existing(row))
    }

    async fn replace(&self, attestation: NewAttestation) -> Result<Replacement> {
        let replacement = self
            .db
            .transaction::<_, Replacement, MedeventaError>(|txn| {
                Box::pin(async move {
                    let previous = match locked_by_key(txn, &attestation).await? {
                        Some(previous) => previous,
                        None => {
                            if let Some(row) = insert_new(txn, &attestation).await? {
                                return Ok(Replacement {
                                    row,
                                    previous: None,
                                });
                            }
                            // A concurrent insert committed after the locked read.
                            locked_by_key(txn, &attestation).await?.ok_or_else(|| {
                                DbErr::RecordNotFound("conflicting attestation".to_string())
                            })?
                        }
                    };
                    let row = attestation.overwrite(&previous).update(txn).await?;
                    Ok(Replacement {
                        row,
                        previous: Some(previous),
                    })
                })
            })
            .await?;
        Ok(replacement)
    }

    async fn list_by_event(&self, event_id: Uuid) -> Result<Vec<AttestationModel>> {
        let list = attestations::Entity::find()
            .filter(attestations::Column::EventId.eq(event_id))
            .order_by_desc(attestations::Column::GeneratedAt)
            .all(&self.db)
            .await?;
        Ok(list)
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        event_id: Option<Uuid>,
    ) -> Result<Vec<AttestationWithEvent>> {
        let mut query = attestations::Entity::find()
            .find_also_related(events::Entity)
            .filter(attestations::Column::UserId.eq(user_id))
            .order_by_desc(attestations::Column::GeneratedAt);
        if let Some(event_id) = event_id {
            query = query.filter(attestations::Column::EventId.eq(event_id));
        }
        let rows = query.all(&self.db).await?;
        Ok(rows
            .into_iter()
            .map(|(attestation, event)| AttestationWithEvent {
                attestation,
                event_title: event.map(|e| e.title),
            })
            .collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AttestationModel>> {
        Ok(attestations::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn find_by_code(&self, unique_code: &str) -> Result<Option<AttestationModel>> {
        let row = attestations::Entity::find()
            .filter(attestations::Column::UniqueCode.eq(unique_code))
            .one(&self.db)
            .await?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = attestations::Entity::delete_by_id(id)
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }
}
