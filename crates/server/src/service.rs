//! Attestation workflow: cache lookup, event-finished gate, eligibility,
//! generation and persistence.

use crate::eligibility::{EligibilityEvaluator, is_finished_for_listing};
use crate::facts::FactSource;
use crate::generator::{AttestationGenerator, GeneratedAttestation};
use crate::metrics::{self, GenerationMode};
use crate::store::{AttestationModel, AttestationStore, Insertion, NewAttestation};
use chrono::{DateTime, Utc};
use medeventa_common::models::{
    AttestationVerification, AttestationWithEvent, EligibleAttestation, GenerationStatus,
};
use medeventa_common::{MedeventaError, ReasonCode, Result, Role};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Authenticated caller of an administrative operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub status: GenerationStatus,
    pub attestation: AttestationModel,
}

impl GenerationOutcome {
    fn new(status: GenerationStatus, attestation: AttestationModel) -> Self {
        Self {
            status,
            attestation,
        }
    }
}

#[derive(Clone)]
pub struct AttestationService {
    facts: Arc<dyn FactSource>,
    store: Arc<dyn AttestationStore>,
    evaluator: EligibilityEvaluator,
    generator: AttestationGenerator,
}

impl AttestationService {
    pub fn new(
        facts: Arc<dyn FactSource>,
        store: Arc<dyn AttestationStore>,
        base_dir: impl Into<PathBuf>,
        invite_requires_accepted_submission: bool,
    ) -> Self {
        let evaluator =
            EligibilityEvaluator::new(facts.clone(), invite_requires_accepted_submission);
        Self {
            evaluator,
            generator: AttestationGenerator::new(facts.clone(), base_dir),
            facts,
            store,
        }
    }

    /// Self-service: return the stored attestation or generate it once.
    pub async fn generate_for_self(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        raw_type: &str,
        now: DateTime<Utc>,
    ) -> Result<GenerationOutcome> {
        let role = parse_type(raw_type)?;
        if let Some(existing) = self.store.get(event_id, user_id, role).await? {
            return Ok(GenerationOutcome::new(GenerationStatus::Cached, existing));
        }
        self.ensure_eligible(event_id, user_id, role, now).await?;
        self.issue(event_id, user_id, role, GenerationMode::SelfService)
            .await
    }

    /// Administrative generation. `force` only bypasses the stored copy.
    pub async fn generate_as_admin(
        &self,
        actor: Actor,
        event_id: Uuid,
        user_id: Uuid,
        raw_type: &str,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<GenerationOutcome> {
        let role = parse_type(raw_type)?;
        self.ensure_can_manage(actor, event_id).await?;

        if !force {
            if let Some(existing) = self.store.get(event_id, user_id, role).await? {
                return Ok(GenerationOutcome::new(GenerationStatus::Cached, existing));
            }
            self.ensure_eligible(event_id, user_id, role, now).await?;
            return self.issue(event_id, user_id, role, GenerationMode::Admin).await;
        }

        self.ensure_eligible(event_id, user_id, role, now).await?;
        let generated = self.generator.generate_role(event_id, user_id, role).await?;
        let new_path = generated.file_path.clone();
        let replacement = match self
            .store
            .replace(new_record(event_id, user_id, role, generated))
            .await
        {
            Ok(replacement) => replacement,
            Err(err) => {
                remove_file_best_effort(&new_path).await;
                return Err(err);
            }
        };

        // `previous` was read under the row lock; its file is no longer referenced.
        let status = match replacement.previous {
            Some(previous) => {
                if Path::new(&previous.file_path) != new_path.as_path() {
                    remove_file_best_effort(Path::new(&previous.file_path)).await;
                }
                GenerationStatus::Regenerated
            }
            None => GenerationStatus::Created,
        };
        metrics::inc_attestation_generated(role, GenerationMode::Regenerate);
        info!(
            actor_id = %actor.user_id,
            event_id = %event_id,
            user_id = %user_id,
            attestation_type = %role,
            "attestation regenerated"
        );
        Ok(GenerationOutcome::new(status, replacement.row))
    }

    /// Fetch-or-generate, then locate the stored PDF for streaming.
    pub async fn download(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        raw_type: &str,
        now: DateTime<Utc>,
    ) -> Result<(AttestationModel, PathBuf)> {
        let outcome = self
            .generate_for_self(user_id, event_id, raw_type, now)
            .await?;
        let path = PathBuf::from(&outcome.attestation.file_path);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok((outcome.attestation, path)),
            Ok(_) => Err(file_missing(&path)),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(file_missing(&path)),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn list_for_event(
        &self,
        actor: Actor,
        event_id: Uuid,
    ) -> Result<Vec<AttestationModel>> {
        self.ensure_can_manage(actor, event_id).await?;
        self.store.list_by_event(event_id).await
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<AttestationWithEvent>> {
        self.store.list_by_user(user_id, None).await
    }

    /// (event, type) pairs the user qualifies for and has not generated yet.
    pub async fn eligibility(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<EligibleAttestation>> {
        let mut eligible = Vec::new();
        for event in self.facts.candidate_events(user_id).await? {
            if !is_finished_for_listing(&event, now) {
                continue;
            }
            let generated: HashSet<String> = self
                .store
                .list_by_user(user_id, Some(event.id))
                .await?
                .into_iter()
                .map(|row| row.attestation.r#type)
                .collect();

            for role in Role::ATTESTATION_TYPES {
                if generated.contains(role.as_str()) {
                    continue;
                }
                if self
                    .evaluator
                    .evaluate_role(event.id, user_id, role)
                    .await?
                    .eligible
                {
                    eligible.push(EligibleAttestation {
                        event_id: event.id,
                        event_title: event.title.clone(),
                        r#type: role,
                    });
                }
            }
        }
        Ok(eligible)
    }

    pub async fn delete(&self, actor: Actor, id: Uuid) -> Result<AttestationModel> {
        if !actor.role.can_delete_attestations() {
            return Err(MedeventaError::permission(
                ReasonCode::Forbidden,
                "only super administrators can delete attestations",
            ));
        }
        let row = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| attestation_not_found(id))?;
        if !self.store.delete(id).await? {
            return Err(attestation_not_found(id));
        }
        remove_file_best_effort(Path::new(&row.file_path)).await;
        info!(
            actor_id = %actor.user_id,
            attestation_id = %id,
            "attestation deleted"
        );
        Ok(row)
    }

    /// Public lookup of a verification code printed on a document.
    pub async fn verify(&self, unique_code: &str) -> Result<AttestationVerification> {
        let row = self.store.find_by_code(unique_code).await?.ok_or_else(|| {
            MedeventaError::not_found(
                ReasonCode::AttestationNotFound,
                "no attestation carries this code",
            )
        })?;
        let recipient_name = self
            .facts
            .user(row.user_id)
            .await?
            .map(|user| user.full_name())
            .unwrap_or_default();
        let event_title = self
            .facts
            .event(row.event_id)
            .await?
            .map(|event| event.title)
            .unwrap_or_default();

        Ok(AttestationVerification {
            unique_code: unique_code.to_string(),
            r#type: row.r#type,
            generated_at: row.generated_at,
            recipient_name,
            event_title,
        })
    }

    async fn ensure_can_manage(&self, actor: Actor, event_id: Uuid) -> Result<()> {
        let allowed = match actor.role {
            Role::SuperAdmin => true,
            role if role.can_manage_attestations() => {
                self.facts.is_organizer(event_id, actor.user_id).await?
            }
            _ => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(MedeventaError::permission(
                ReasonCode::Forbidden,
                format!("not allowed to manage attestations of event {}", event_id),
            ))
        }
    }

    async fn ensure_eligible(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.evaluator.ensure_event_finished(event_id, now).await?;
        let decision = self.evaluator.evaluate_role(event_id, user_id, role).await?;
        match decision.reason {
            Some(reason) if !decision.eligible => Err(MedeventaError::permission(
                reason,
                format!("user {} is not eligible for a {} attestation", user_id, role),
            )),
            _ => Ok(()),
        }
    }

    /// Generate a file and insert its row unless a concurrent request won the key.
    async fn issue(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        role: Role,
        mode: GenerationMode,
    ) -> Result<GenerationOutcome> {
        let generated = self.generator.generate_role(event_id, user_id, role).await?;
        let path = generated.file_path.clone();

        match self
            .store
            .create(new_record(event_id, user_id, role, generated))
            .await
        {
            Ok(Insertion::Created(row)) => {
                metrics::inc_attestation_generated(role, mode);
                info!(
                    event_id = %event_id,
                    user_id = %user_id,
                    attestation_type = %role,
                    "attestation generated"
                );
                Ok(GenerationOutcome::new(GenerationStatus::Created, row))
            }
            Ok(Insertion::Existing(row)) => {
                remove_file_best_effort(&path).await;
                Ok(GenerationOutcome::new(GenerationStatus::Cached, row))
            }
            Err(err) => {
                remove_file_best_effort(&path).await;
                Err(err)
            }
        }
    }
}

fn parse_type(raw: &str) -> Result<Role> {
    Role::attestation_type(raw).ok_or_else(|| MedeventaError::invalid_type(raw))
}

pub(crate) fn file_missing(path: &Path) -> MedeventaError {
    MedeventaError::not_found(
        ReasonCode::FileMissing,
        format!("attestation file {} is missing", path.display()),
    )
}

fn attestation_not_found(id: Uuid) -> MedeventaError {
    MedeventaError::not_found(
        ReasonCode::AttestationNotFound,
        format!("attestation {} not found", id),
    )
}

fn new_record(
    event_id: Uuid,
    user_id: Uuid,
    role: Role,
    generated: GeneratedAttestation,
) -> NewAttestation {
    NewAttestation {
        event_id,
        user_id,
        role,
        file_path: generated.file_path.to_string_lossy().into_owned(),
        unique_code: generated.unique_code,
        generated_at: generated.generated_at,
    }
}

async fn remove_file_best_effort(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            metrics::inc_file_cleanup_failure();
            warn!(path = %path.display(), error = %err, "failed to remove attestation file");
        }
    }
}
