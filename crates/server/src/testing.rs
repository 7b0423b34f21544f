//! In-memory fakes for the fact source, the attestation store and accounts.

use crate::accounts::{AccountStore, OutgoingEmail};
use crate::facts::{EventSnapshot, FactSource, UserSnapshot};
use crate::store::{AttestationModel, AttestationStore, Insertion, NewAttestation, Replacement};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use medeventa_common::models::AttestationWithEvent;
use medeventa_common::{MedeventaError, Result, Role};
use sea_orm::{DbErr, RuntimeErr};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Submission {
    event_id: Uuid,
    author_id: Uuid,
    presenter_id: Option<Uuid>,
    session_id: Option<Uuid>,
    status: String,
}

impl Submission {
    fn involves(&self, user_id: Uuid) -> bool {
        self.author_id == user_id || self.presenter_id == Some(user_id)
    }
}

#[derive(Debug, Clone)]
struct Session {
    id: Uuid,
    event_id: Uuid,
    chair_id: Option<Uuid>,
}

#[derive(Default)]
struct Facts {
    events: HashMap<Uuid, EventSnapshot>,
    users: HashMap<Uuid, UserSnapshot>,
    registrations: Vec<(Uuid, Uuid)>,
    submissions: Vec<Submission>,
    committee_members: Vec<(Uuid, Uuid)>,
    sessions: Vec<Session>,
}

#[derive(Default)]
pub struct MemoryFacts {
    inner: Mutex<Facts>,
    queries: AtomicUsize,
}

impl MemoryFacts {
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn facts(&self) -> std::sync::MutexGuard<'_, Facts> {
        self.inner.lock().unwrap()
    }

    fn counted(&self) -> std::sync::MutexGuard<'_, Facts> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.facts()
    }

    pub fn add_user(&self, first_name: &str, last_name: &str) -> Uuid {
        let id = Uuid::new_v4();
        let user = UserSnapshot {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: format!("{}.{}@example.org", first_name, id.simple()).to_lowercase(),
            institution: Some("CHU Tizi Ouzou".to_string()),
        };
        self.facts().users.insert(id, user);
        id
    }

    /// Event with its own organizer; returns the event id.
    pub fn add_event(&self, end_date: Option<NaiveDate>, end_time: Option<NaiveTime>) -> Uuid {
        let organizer_id = self.add_user("Organizer", "Test");
        let mut facts = self.facts();
        let id = Uuid::new_v4();
        let number = facts.events.len() + 1;
        let start_date = end_date.unwrap_or_else(|| Utc::now().date_naive()) - Duration::days(2);
        facts.events.insert(
            id,
            EventSnapshot {
                id,
                title: format!("Congres {}", number),
                location: Some("Alger".to_string()),
                start_date,
                end_date,
                end_time,
                organizer_id,
            },
        );
        id
    }

    pub fn add_event_ended_days_ago(&self, days: i64) -> Uuid {
        self.add_event(Some(Utc::now().date_naive() - Duration::days(days)), None)
    }

    pub fn add_event_ending_in_days(&self, days: i64) -> Uuid {
        self.add_event(Some(Utc::now().date_naive() + Duration::days(days)), None)
    }

    pub fn organizer_of(&self, event_id: Uuid) -> Uuid {
        self.facts().events[&event_id].organizer_id
    }

    pub fn event_snapshot(&self, event_id: Uuid) -> EventSnapshot {
        self.facts().events[&event_id].clone()
    }

    pub fn user_snapshot(&self, user_id: Uuid) -> UserSnapshot {
        self.facts().users[&user_id].clone()
    }

    fn event_title(&self, event_id: Uuid) -> Option<String> {
        self.facts().events.get(&event_id).map(|e| e.title.clone())
    }

    pub fn register(&self, event_id: Uuid, user_id: Uuid) {
        self.facts().registrations.push((event_id, user_id));
    }

    pub fn submit(&self, event_id: Uuid, user_id: Uuid, session_id: Option<Uuid>, status: &str) {
        self.facts().submissions.push(Submission {
            event_id,
            author_id: user_id,
            presenter_id: None,
            session_id,
            status: status.to_string(),
        });
    }

    /// Submission authored by someone else and presented by `presenter_id`.
    pub fn present(
        &self,
        event_id: Uuid,
        presenter_id: Uuid,
        session_id: Option<Uuid>,
        status: &str,
    ) -> Uuid {
        let author_id = self.add_user("Author", "Absent");
        self.facts().submissions.push(Submission {
            event_id,
            author_id,
            presenter_id: Some(presenter_id),
            session_id,
            status: status.to_string(),
        });
        author_id
    }

    pub fn add_committee_member(&self, event_id: Uuid, user_id: Uuid) {
        self.facts().committee_members.push((event_id, user_id));
    }

    pub fn add_session(&self, event_id: Uuid, chair_id: Option<Uuid>) -> Uuid {
        let id = Uuid::new_v4();
        self.facts().sessions.push(Session {
            id,
            event_id,
            chair_id,
        });
        id
    }
}

#[async_trait]
impl FactSource for MemoryFacts {
    async fn event(&self, event_id: Uuid) -> Result<Option<EventSnapshot>> {
        Ok(self.counted().events.get(&event_id).cloned())
    }

    async fn user(&self, user_id: Uuid) -> Result<Option<UserSnapshot>> {
        Ok(self.counted().users.get(&user_id).cloned())
    }

    async fn is_registered(&self, event_id: Uuid, user_id: Uuid) -> Result<bool> {
        Ok(self.counted().registrations.contains(&(event_id, user_id)))
    }

    async fn has_accepted_submission(&self, event_id: Uuid, user_id: Uuid) -> Result<bool> {
        Ok(self
            .counted()
            .submissions
            .iter()
            .any(|s| s.event_id == event_id && s.involves(user_id) && s.status == "accepted"))
    }

    async fn is_committee_member(&self, event_id: Uuid, user_id: Uuid) -> Result<bool> {
        Ok(self
            .counted()
            .committee_members
            .contains(&(event_id, user_id)))
    }

    async fn is_organizer(&self, event_id: Uuid, user_id: Uuid) -> Result<bool> {
        Ok(self
            .counted()
            .events
            .get(&event_id)
            .is_some_and(|e| e.organizer_id == user_id))
    }

    async fn chairs_session(&self, event_id: Uuid, user_id: Uuid) -> Result<bool> {
        Ok(self
            .counted()
            .sessions
            .iter()
            .any(|s| s.event_id == event_id && s.chair_id == Some(user_id)))
    }

    async fn has_session_submission(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        accepted_only: bool,
    ) -> Result<bool> {
        Ok(self.counted().submissions.iter().any(|s| {
            s.event_id == event_id
                && s.involves(user_id)
                && s.session_id.is_some()
                && (!accepted_only || s.status == "accepted")
        }))
    }

    async fn candidate_events(&self, user_id: Uuid) -> Result<Vec<EventSnapshot>> {
        let facts = self.counted();
        let mut list: Vec<EventSnapshot> = facts
            .events
            .values()
            .filter(|e| e.end_date.is_some())
            .filter(|e| {
                e.organizer_id == user_id
                    || facts.registrations.contains(&(e.id, user_id))
                    || facts.committee_members.contains(&(e.id, user_id))
                    || facts
                        .submissions
                        .iter()
                        .any(|s| s.event_id == e.id && s.involves(user_id))
                    || facts
                        .sessions
                        .iter()
                        .any(|s| s.event_id == e.id && s.chair_id == Some(user_id))
            })
            .cloned()
            .collect();
        list.sort_by(|a, b| b.end_date.cmp(&a.end_date));
        Ok(list)
    }
}

/// Store fake keyed like the real unique index.
pub struct MemoryStore {
    facts: Arc<MemoryFacts>,
    rows: Mutex<Vec<AttestationModel>>,
    stale_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new(facts: Arc<MemoryFacts>) -> Self {
        Self {
            facts,
            rows: Mutex::new(Vec::new()),
            stale_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make `get` miss, as a request that read before a concurrent insert would.
    pub fn set_stale_reads(&self, stale: bool) {
        self.stale_reads.store(stale, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MedeventaError::Database(DbErr::Conn(RuntimeErr::Internal(
                "connection reset".to_string(),
            ))));
        }
        Ok(())
    }

    fn find_key(
        rows: &[AttestationModel],
        event_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> Option<usize> {
        rows.iter().position(|row| {
            row.event_id == event_id && row.user_id == user_id && row.r#type == role.as_str()
        })
    }
}

fn to_model(attestation: NewAttestation, id: Uuid) -> AttestationModel {
    AttestationModel {
        id,
        event_id: attestation.event_id,
        user_id: attestation.user_id,
        r#type: attestation.role.as_str().to_string(),
        generated_at: attestation.generated_at.fixed_offset(),
        file_path: attestation.file_path,
        unique_code: Some(attestation.unique_code),
    }
}

#[async_trait]
impl AttestationStore for MemoryStore {
    async fn get(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> Result<Option<AttestationModel>> {
        if self.stale_reads.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let rows = self.rows.lock().unwrap();
        Ok(Self::find_key(&rows, event_id, user_id, role).map(|i| rows[i].clone()))
    }

    async fn create(&self, attestation: NewAttestation) -> Result<Insertion> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        match Self::find_key(&rows, attestation.event_id, attestation.user_id, attestation.role) {
            Some(i) => Ok(Insertion::Existing(rows[i].clone())),
            None => {
                let row = to_model(attestation, Uuid::new_v4());
                rows.push(row.clone());
                Ok(Insertion::Created(row))
            }
        }
    }

    async fn replace(&self, attestation: NewAttestation) -> Result<Replacement> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        match Self::find_key(&rows, attestation.event_id, attestation.user_id, attestation.role) {
            Some(i) => {
                let row = to_model(attestation, rows[i].id);
                let previous = std::mem::replace(&mut rows[i], row.clone());
                Ok(Replacement {
                    row,
                    previous: Some(previous),
                })
            }
            None => {
                let row = to_model(attestation, Uuid::new_v4());
                rows.push(row.clone());
                Ok(Replacement {
                    row,
                    previous: None,
                })
            }
        }
    }

    async fn list_by_event(&self, event_id: Uuid) -> Result<Vec<AttestationModel>> {
        let mut list: Vec<AttestationModel> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.event_id == event_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        Ok(list)
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        event_id: Option<Uuid>,
    ) -> Result<Vec<AttestationWithEvent>> {
        let mut list: Vec<AttestationModel> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.user_id == user_id)
            .filter(|row| event_id.is_none_or(|id| row.event_id == id))
            .cloned()
            .collect();
        list.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        Ok(list
            .into_iter()
            .map(|attestation| AttestationWithEvent {
                event_title: self.facts.event_title(attestation.event_id),
                attestation,
            })
            .collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AttestationModel>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.id == id)
            .cloned())
    }

    async fn find_by_code(&self, unique_code: &str) -> Result<Option<AttestationModel>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.unique_code.as_deref() == Some(unique_code))
            .cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|row| row.id != id);
        Ok(rows.len() < before)
    }
}

/// Records queued mail and verification timestamps.
#[derive(Default)]
pub struct MemoryAccounts {
    outbox: Mutex<Vec<OutgoingEmail>>,
    verified: Mutex<HashMap<Uuid, DateTime<Utc>>>,
}

impl MemoryAccounts {
    pub fn outbox(&self) -> Vec<OutgoingEmail> {
        self.outbox.lock().unwrap().clone()
    }

    pub fn verified_at(&self, user_id: Uuid) -> Option<DateTime<Utc>> {
        self.verified.lock().unwrap().get(&user_id).copied()
    }
}

#[async_trait]
impl AccountStore for MemoryAccounts {
    async fn enqueue_email(&self, email: OutgoingEmail) -> Result<()> {
        self.outbox.lock().unwrap().push(email);
        Ok(())
    }

    async fn mark_email_verified(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        self.verified.lock().unwrap().insert(user_id, at);
        Ok(true)
    }
}
