use crate::facts::{EventSnapshot, FactSource};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use medeventa_common::{MedeventaError, ReasonCode, Result, Role};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EligibilityDecision {
    pub eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ReasonCode>,
}

impl EligibilityDecision {
    pub fn eligible() -> Self {
        Self {
            eligible: true,
            reason: None,
        }
    }

    pub fn denied(reason: ReasonCode) -> Self {
        Self {
            eligible: false,
            reason: Some(reason),
        }
    }
}

/// Effective end of an event. A date without a time closes at 23:59:59.999.
pub fn event_end(
    end_date: Option<NaiveDate>,
    end_time: Option<NaiveTime>,
) -> Option<NaiveDateTime> {
    let date = end_date?;
    let time = end_time.unwrap_or_else(end_of_day);
    Some(date.and_time(time))
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN)
}

/// Gate for self-service generation: an event with no end is never finished.
pub fn is_finished_for_generation(event: &EventSnapshot, now: DateTime<Utc>) -> bool {
    match event_end(event.end_date, event.end_time) {
        Some(end) => now.naive_utc() >= end,
        None => false,
    }
}

/// Filter used by the eligibility listing: `end <= now`, a bare date read as midnight.
pub fn is_finished_for_listing(event: &EventSnapshot, now: DateTime<Utc>) -> bool {
    match event.end_date {
        Some(date) => date.and_time(event.end_time.unwrap_or(NaiveTime::MIN)) <= now.naive_utc(),
        None => false,
    }
}

#[derive(Clone)]
pub struct EligibilityEvaluator {
    facts: Arc<dyn FactSource>,
    invite_requires_accepted_submission: bool,
}

impl EligibilityEvaluator {
    pub fn new(facts: Arc<dyn FactSource>, invite_requires_accepted_submission: bool) -> Self {
        Self {
            facts,
            invite_requires_accepted_submission,
        }
    }

    /// Evaluate a raw type string. Unknown types are rejected before any query.
    pub async fn evaluate(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        raw_type: &str,
    ) -> Result<EligibilityDecision> {
        match Role::attestation_type(raw_type) {
            Some(role) => self.evaluate_role(event_id, user_id, role).await,
            None => Ok(EligibilityDecision::denied(ReasonCode::TypeInvalid)),
        }
    }

    pub async fn evaluate_role(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> Result<EligibilityDecision> {
        let facts = &self.facts;
        let decision = match role {
            Role::Participant => qualify(
                facts.is_registered(event_id, user_id).await?,
                ReasonCode::NotRegistered,
            ),
            Role::Communicant => qualify(
                facts.has_accepted_submission(event_id, user_id).await?,
                ReasonCode::NoAcceptedCommunication,
            ),
            Role::MembreComite => qualify(
                facts.is_committee_member(event_id, user_id).await?,
                ReasonCode::NotCommitteeMember,
            ),
            Role::Organisateur => qualify(
                facts.is_organizer(event_id, user_id).await?,
                ReasonCode::NotOrganizer,
            ),
            Role::Invite => {
                let invited = facts.chairs_session(event_id, user_id).await?
                    || facts
                        .has_session_submission(
                            event_id,
                            user_id,
                            self.invite_requires_accepted_submission,
                        )
                        .await?;
                qualify(invited, ReasonCode::NotInvited)
            }
            Role::SuperAdmin => EligibilityDecision::denied(ReasonCode::TypeInvalid),
        };
        Ok(decision)
    }

    /// Resolve the event and require that it has ended.
    pub async fn ensure_event_finished(
        &self,
        event_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<EventSnapshot> {
        let event = self.facts.event(event_id).await?.ok_or_else(|| {
            MedeventaError::not_found(
                ReasonCode::EventNotFound,
                format!("event {} not found", event_id),
            )
        })?;
        if !is_finished_for_generation(&event, now) {
            return Err(MedeventaError::precondition(
                ReasonCode::EventNotFinished,
                format!("event {} has not finished yet", event_id),
            ));
        }
        Ok(event)
    }
}

fn qualify(holds: bool, reason: ReasonCode) -> EligibilityDecision {
    if holds {
        EligibilityDecision::eligible()
    } else {
        EligibilityDecision::denied(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryFacts;
    use chrono::{Duration, TimeZone};

    fn event_ending(end_date: Option<NaiveDate>, end_time: Option<NaiveTime>) -> EventSnapshot {
        EventSnapshot {
            id: Uuid::new_v4(),
            title: "Journees de cardiologie".to_string(),
            location: Some("Oran".to_string()),
            start_date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            end_date,
            end_time,
            organizer_id: Uuid::new_v4(),
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32, ms: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap() + Duration::milliseconds(ms as i64)
    }

    #[test]
    fn test_date_only_end_rounds_to_end_of_day() {
        let event = event_ending(NaiveDate::from_ymd_opt(2026, 3, 12), None);

        assert!(!is_finished_for_generation(&event, at(2026, 3, 12, 0, 0, 0, 0)));
        assert!(!is_finished_for_generation(&event, at(2026, 3, 12, 18, 30, 0, 0)));
        assert!(!is_finished_for_generation(&event, at(2026, 3, 12, 23, 59, 59, 998)));
        assert!(is_finished_for_generation(&event, at(2026, 3, 12, 23, 59, 59, 999)));
        assert!(is_finished_for_generation(&event, at(2026, 3, 13, 0, 0, 0, 0)));
    }

    #[test]
    fn test_explicit_end_time_is_used_as_is() {
        let event = event_ending(
            NaiveDate::from_ymd_opt(2026, 3, 12),
            NaiveTime::from_hms_opt(17, 0, 0),
        );
        assert!(!is_finished_for_generation(&event, at(2026, 3, 12, 16, 59, 59, 0)));
        assert!(is_finished_for_generation(&event, at(2026, 3, 12, 17, 0, 0, 0)));
    }

    #[test]
    fn test_missing_end_blocks_generation_and_listing() {
        let event = event_ending(None, None);
        let now = at(2030, 1, 1, 0, 0, 0, 0);
        assert!(!is_finished_for_generation(&event, now));
        assert!(!is_finished_for_listing(&event, now));
    }

    #[test]
    fn test_listing_reads_bare_date_as_midnight() {
        // Same-day asymmetry: listed from midnight, generation blocked until end of day.
        let event = event_ending(NaiveDate::from_ymd_opt(2026, 3, 12), None);
        let noon = at(2026, 3, 12, 12, 0, 0, 0);
        assert!(is_finished_for_listing(&event, noon));
        assert!(!is_finished_for_generation(&event, noon));
        assert!(!is_finished_for_listing(&event, at(2026, 3, 11, 23, 59, 59, 0)));
    }

    #[tokio::test]
    async fn test_invalid_type_makes_no_queries() {
        let facts = Arc::new(MemoryFacts::default());
        let evaluator = EligibilityEvaluator::new(facts.clone(), true);

        for raw in ["speaker", "super_admin", "", "PARTICIPANT"] {
            let decision = evaluator
                .evaluate(Uuid::new_v4(), Uuid::new_v4(), raw)
                .await
                .unwrap();
            assert_eq!(decision, EligibilityDecision::denied(ReasonCode::TypeInvalid));
        }
        assert_eq!(facts.query_count(), 0);
    }

    #[tokio::test]
    async fn test_participant_requires_registration() {
        let facts = Arc::new(MemoryFacts::default());
        let event = facts.add_event_ended_days_ago(1);
        let user = facts.add_user("Karim", "Haddad");
        let evaluator = EligibilityEvaluator::new(facts.clone(), true);

        let decision = evaluator.evaluate(event, user, "participant").await.unwrap();
        assert_eq!(decision, EligibilityDecision::denied(ReasonCode::NotRegistered));

        facts.register(event, user);
        let decision = evaluator.evaluate(event, user, "participant").await.unwrap();
        assert!(decision.eligible);
    }

    #[tokio::test]
    async fn test_pending_submission_is_not_a_communication() {
        let facts = Arc::new(MemoryFacts::default());
        let event = facts.add_event_ended_days_ago(1);
        let user = facts.add_user("Lina", "Saadi");
        facts.submit(event, user, None, "pending");
        let evaluator = EligibilityEvaluator::new(facts.clone(), true);

        let decision = evaluator.evaluate(event, user, "communicant").await.unwrap();
        assert_eq!(
            decision,
            EligibilityDecision::denied(ReasonCode::NoAcceptedCommunication)
        );

        facts.submit(event, user, None, "accepted");
        let decision = evaluator.evaluate(event, user, "communicant").await.unwrap();
        assert!(decision.eligible);
    }

    #[tokio::test]
    async fn test_committee_and_organizer_rules() {
        let facts = Arc::new(MemoryFacts::default());
        let event = facts.add_event_ended_days_ago(3);
        let organizer = facts.organizer_of(event);
        let reviewer = facts.add_user("Yacine", "Meziane");
        let evaluator = EligibilityEvaluator::new(facts.clone(), true);

        assert!(evaluator.evaluate(event, organizer, "organisateur").await.unwrap().eligible);
        assert_eq!(
            evaluator.evaluate(event, reviewer, "organisateur").await.unwrap(),
            EligibilityDecision::denied(ReasonCode::NotOrganizer)
        );
        assert_eq!(
            evaluator.evaluate(event, reviewer, "membre_comite").await.unwrap(),
            EligibilityDecision::denied(ReasonCode::NotCommitteeMember)
        );

        facts.add_committee_member(event, reviewer);
        assert!(evaluator.evaluate(event, reviewer, "membre_comite").await.unwrap().eligible);
    }

    #[tokio::test]
    async fn test_invite_policy_for_session_submissions() {
        let facts = Arc::new(MemoryFacts::default());
        let event = facts.add_event_ended_days_ago(2);
        let speaker = facts.add_user("Nadia", "Kaci");
        let session = facts.add_session(event, None);
        facts.submit(event, speaker, Some(session), "pending");

        let strict = EligibilityEvaluator::new(facts.clone(), true);
        assert_eq!(
            strict.evaluate(event, speaker, "invite").await.unwrap(),
            EligibilityDecision::denied(ReasonCode::NotInvited)
        );

        let lenient = EligibilityEvaluator::new(facts.clone(), false);
        assert!(lenient.evaluate(event, speaker, "invite").await.unwrap().eligible);
    }

    #[tokio::test]
    async fn test_session_chair_is_invited() {
        let facts = Arc::new(MemoryFacts::default());
        let event = facts.add_event_ended_days_ago(2);
        let chair = facts.add_user("Omar", "Belkacem");
        facts.add_session(event, Some(chair));
        let evaluator = EligibilityEvaluator::new(facts.clone(), true);

        assert!(evaluator.evaluate(event, chair, "invite").await.unwrap().eligible);
    }

    #[tokio::test]
    async fn test_ensure_event_finished() {
        let facts = Arc::new(MemoryFacts::default());
        let ended = facts.add_event_ended_days_ago(1);
        let running = facts.add_event_ending_in_days(2);
        let evaluator = EligibilityEvaluator::new(facts.clone(), true);
        let now = Utc::now();

        assert_eq!(evaluator.ensure_event_finished(ended, now).await.unwrap().id, ended);

        let err = evaluator.ensure_event_finished(running, now).await.unwrap_err();
        assert_eq!(err.reason(), Some(ReasonCode::EventNotFinished));
        assert_eq!(err.http_status_code(), 403);

        let err = evaluator
            .ensure_event_finished(Uuid::new_v4(), now)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), Some(ReasonCode::EventNotFound));
        assert_eq!(err.http_status_code(), 404);
    }
}
