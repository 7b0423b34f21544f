use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use medeventa_common::Result;
use medeventa_common::entities::{
    committee_members, events, registrations, scientific_committees, sessions, submissions, users,
};
use sea_orm::sea_query::JoinType;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait,
};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSnapshot {
    pub id: Uuid,
    pub title: String,
    pub location: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub end_time: Option<NaiveTime>,
    pub organizer_id: Uuid,
}

impl From<events::Model> for EventSnapshot {
    fn from(model: events::Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            location: model.location,
            start_date: model.start_date,
            end_date: model.end_date,
            end_time: model.end_time,
            organizer_id: model.organizer_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSnapshot {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub institution: Option<String>,
}

impl UserSnapshot {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

impl From<users::Model> for UserSnapshot {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            first_name: model.first_name,
            last_name: model.last_name,
            email: model.email,
            institution: model.institution,
        }
    }
}

/// Read-only access to the relations that prove a role in an event.
#[async_trait]
pub trait FactSource: Send + Sync {
    async fn event(&self, event_id: Uuid) -> Result<Option<EventSnapshot>>;

    async fn user(&self, user_id: Uuid) -> Result<Option<UserSnapshot>>;

    async fn is_registered(&self, event_id: Uuid, user_id: Uuid) -> Result<bool>;

    /// Accepted submission authored or presented by the user.
    async fn has_accepted_submission(&self, event_id: Uuid, user_id: Uuid) -> Result<bool>;

    async fn is_committee_member(&self, event_id: Uuid, user_id: Uuid) -> Result<bool>;

    async fn is_organizer(&self, event_id: Uuid, user_id: Uuid) -> Result<bool>;

    async fn chairs_session(&self, event_id: Uuid, user_id: Uuid) -> Result<bool>;

    /// Submission attached to a session, authored or presented by the user.
    async fn has_session_submission(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        accepted_only: bool,
    ) -> Result<bool>;

    /// Events with a recorded end date in which the user holds any role fact.
    async fn candidate_events(&self, user_id: Uuid) -> Result<Vec<EventSnapshot>>;
}

#[derive(Clone)]
pub struct SeaFactSource {
    db: DatabaseConnection,
}

impl SeaFactSource {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn authored_or_presented(user_id: Uuid) -> Condition {
    Condition::any()
        .add(submissions::Column::AuthorId.eq(user_id))
        .add(submissions::Column::PresenterId.eq(user_id))
}

#[async_trait]
impl FactSource for SeaFactSource {
    async fn event(&self, event_id: Uuid) -> Result<Option<EventSnapshot>> {
        let event = events::Entity::find_by_id(event_id).one(&self.db).await?;
        Ok(event.map(EventSnapshot::from))
    }

    async fn user(&self, user_id: Uuid) -> Result<Option<UserSnapshot>> {
        let user = users::Entity::find_by_id(user_id).one(&self.db).await?;
        Ok(user.map(UserSnapshot::from))
    }

    async fn is_registered(&self, event_id: Uuid, user_id: Uuid) -> Result<bool> {
        let count = registrations::Entity::find()
            .filter(registrations::Column::EventId.eq(event_id))
            .filter(registrations::Column::UserId.eq(user_id))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn has_accepted_submission(&self, event_id: Uuid, user_id: Uuid) -> Result<bool> {
        let count = submissions::Entity::find()
            .filter(submissions::Column::EventId.eq(event_id))
            .filter(submissions::Column::Status.eq(submissions::STATUS_ACCEPTED))
            .filter(authored_or_presented(user_id))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn is_committee_member(&self, event_id: Uuid, user_id: Uuid) -> Result<bool> {
        let count = committee_members::Entity::find()
            .join(
                JoinType::InnerJoin,
                committee_members::Relation::Committee.def(),
            )
            .filter(scientific_committees::Column::EventId.eq(event_id))
            .filter(committee_members::Column::UserId.eq(user_id))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn is_organizer(&self, event_id: Uuid, user_id: Uuid) -> Result<bool> {
        let count = events::Entity::find()
            .filter(events::Column::Id.eq(event_id))
            .filter(events::Column::OrganizerId.eq(user_id))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn chairs_session(&self, event_id: Uuid, user_id: Uuid) -> Result<bool> {
        let count = sessions::Entity::find()
            .filter(sessions::Column::EventId.eq(event_id))
            .filter(sessions::Column::ChairId.eq(user_id))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn has_session_submission(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        accepted_only: bool,
    ) -> Result<bool> {
        let mut query = submissions::Entity::find()
            .filter(submissions::Column::EventId.eq(event_id))
            .filter(submissions::Column::SessionId.is_not_null())
            .filter(authored_or_presented(user_id));
        if accepted_only {
            query = query.filter(submissions::Column::Status.eq(submissions::STATUS_ACCEPTED));
        }
        let count = query.count(&self.db).await?;
        Ok(count > 0)
    }

    async fn candidate_events(&self, user_id: Uuid) -> Result<Vec<EventSnapshot>> {
        let mut event_ids: HashSet<Uuid> = HashSet::new();

        let registered: Vec<Uuid> = registrations::Entity::find()
            .select_only()
            .column(registrations::Column::EventId)
            .filter(registrations::Column::UserId.eq(user_id))
            .into_tuple()
            .all(&self.db)
            .await?;
        event_ids.extend(registered);

        let submitted: Vec<Uuid> = submissions::Entity::find()
            .select_only()
            .column(submissions::Column::EventId)
            .filter(authored_or_presented(user_id))
            .into_tuple()
            .all(&self.db)
            .await?;
        event_ids.extend(submitted);

        let reviewed: Vec<Uuid> = committee_members::Entity::find()
            .select_only()
            .column(scientific_committees::Column::EventId)
            .join(
                JoinType::InnerJoin,
                committee_members::Relation::Committee.def(),
            )
            .filter(committee_members::Column::UserId.eq(user_id))
            .into_tuple()
            .all(&self.db)
            .await?;
        event_ids.extend(reviewed);

        let chaired: Vec<Uuid> = sessions::Entity::find()
            .select_only()
            .column(sessions::Column::EventId)
            .filter(sessions::Column::ChairId.eq(user_id))
            .into_tuple()
            .all(&self.db)
            .await?;
        event_ids.extend(chaired);

        let list = events::Entity::find()
            .filter(
                Condition::any()
                    .add(events::Column::Id.is_in(event_ids))
                    .add(events::Column::OrganizerId.eq(user_id)),
            )
            .filter(events::Column::EndDate.is_not_null())
            .order_by_desc(events::Column::EndDate)
            .all(&self.db)
            .await?;
        Ok(list.into_iter().map(EventSnapshot::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::collections::BTreeMap;

    fn count_row(n: i64) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("num_items", Value::BigInt(Some(n)))])
    }

    fn mock_with_counts(counts: &[i64]) -> DatabaseConnection {
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(counts.iter().map(|&n| vec![count_row(n)]))
            .into_connection()
    }

    fn statements(db: DatabaseConnection) -> Vec<String> {
        db.into_transaction_log()
            .iter()
            .flat_map(|txn| txn.statements())
            .map(|stmt| stmt.sql.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_accepted_submission_matches_author_or_presenter() {
        let db = mock_with_counts(&[1, 0]);
        let facts = SeaFactSource::new(db.clone());
        let (event, user) = (Uuid::new_v4(), Uuid::new_v4());

        assert!(facts.has_accepted_submission(event, user).await.unwrap());
        assert!(!facts.has_accepted_submission(event, user).await.unwrap());

        let sql = statements(db);
        assert_eq!(sql.len(), 2);
        assert!(sql[0].contains(r#""submissions"."author_id" = $"#));
        assert!(sql[0].contains(r#" OR "submissions"."presenter_id" = $"#));
        assert!(sql[0].contains(r#""submissions"."status" = $"#));
    }

    #[tokio::test]
    async fn test_session_submission_filter_depends_on_accepted_only() {
        let db = mock_with_counts(&[1, 1]);
        let facts = SeaFactSource::new(db.clone());
        let (event, user) = (Uuid::new_v4(), Uuid::new_v4());

        assert!(facts.has_session_submission(event, user, true).await.unwrap());
        assert!(facts.has_session_submission(event, user, false).await.unwrap());

        let sql = statements(db);
        for stmt in &sql {
            assert!(stmt.contains(r#""submissions"."session_id" IS NOT NULL"#));
            assert!(stmt.contains(r#""submissions"."presenter_id" = $"#));
        }
        assert!(sql[0].contains(r#""submissions"."status" = $"#));
        assert!(!sql[1].contains(r#""submissions"."status""#));
    }

    #[tokio::test]
    async fn test_committee_membership_joins_committee_of_event() {
        let db = mock_with_counts(&[1]);
        let facts = SeaFactSource::new(db.clone());

        assert!(
            facts
                .is_committee_member(Uuid::new_v4(), Uuid::new_v4())
                .await
                .unwrap()
        );
        let sql = statements(db);
        assert!(sql[0].contains(r#"INNER JOIN "scientific_committees""#));
        assert!(sql[0].contains(r#""scientific_committees"."event_id" = $"#));
    }

    #[test]
    fn test_full_name_trims_parts() {
        let user = UserSnapshot {
            id: Uuid::new_v4(),
            first_name: " Amina ".to_string(),
            last_name: "Benali".to_string(),
            email: "amina@example.org".to_string(),
            institution: None,
        };
        assert_eq!(user.full_name(), "Amina Benali");
    }
}
