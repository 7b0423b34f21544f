use crate::facts::{EventSnapshot, FactSource, UserSnapshot};
use crate::pdf::{Font, PAGE_HEIGHT, PAGE_WIDTH, PdfPage};
use chrono::{DateTime, Utc};
use medeventa_common::{MedeventaError, ReasonCode, Result, Role};
use rand::RngCore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedAttestation {
    pub file_path: PathBuf,
    pub unique_code: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AttestationGenerator {
    facts: Arc<dyn FactSource>,
    base_dir: PathBuf,
}

impl AttestationGenerator {
    pub fn new(facts: Arc<dyn FactSource>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            facts,
            base_dir: base_dir.into(),
        }
    }

    pub async fn generate(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        raw_type: &str,
    ) -> Result<GeneratedAttestation> {
        let role =
            Role::attestation_type(raw_type).ok_or_else(|| MedeventaError::invalid_type(raw_type))?;
        self.generate_role(event_id, user_id, role).await
    }

    /// Render and write the PDF. No database row is written here.
    pub async fn generate_role(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> Result<GeneratedAttestation> {
        if !role.is_attestation_type() {
            return Err(MedeventaError::invalid_type(role.as_str()));
        }
        let event = self.facts.event(event_id).await?.ok_or_else(|| {
            MedeventaError::not_found(
                ReasonCode::EventNotFound,
                format!("event {} not found", event_id),
            )
        })?;
        let user = self.facts.user(user_id).await?.ok_or_else(|| {
            MedeventaError::not_found(
                ReasonCode::UserNotFound,
                format!("user {} not found", user_id),
            )
        })?;

        let unique_code = new_unique_code();
        let generated_at = Utc::now();
        let file_path = self.storage_path(event_id, role, &unique_code);
        let bytes = render(&event, &user, role, &unique_code, generated_at);

        write_durably(&file_path, &bytes).await?;
        debug!(
            event_id = %event_id,
            user_id = %user_id,
            attestation_type = %role,
            path = %file_path.display(),
            bytes = bytes.len(),
            "attestation written"
        );

        Ok(GeneratedAttestation {
            file_path,
            unique_code,
            generated_at,
        })
    }

    /// `<base>/<event_id>/<type>/<unique_code>.pdf`
    pub fn storage_path(&self, event_id: Uuid, role: Role, unique_code: &str) -> PathBuf {
        self.base_dir
            .join(event_id.to_string())
            .join(role.as_str())
            .join(format!("{}.pdf", unique_code))
    }
}

/// 16 random bytes, hex encoded.
pub fn new_unique_code() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

async fn write_durably(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

pub fn render(
    event: &EventSnapshot,
    user: &UserSnapshot,
    role: Role,
    unique_code: &str,
    generated_at: DateTime<Utc>,
) -> Vec<u8> {
    let mut page = PdfPage::new(format!("{} - {}", role.attestation_label(), event.title));
    page.rect(24.0, 24.0, PAGE_WIDTH - 48.0, PAGE_HEIGHT - 48.0, 3.0)
        .rect(34.0, 34.0, PAGE_WIDTH - 68.0, PAGE_HEIGHT - 68.0, 0.8)
        .centered_text(500.0, 34.0, Font::Bold, "ATTESTATION")
        .centered_text(465.0, 16.0, Font::Regular, role.attestation_label())
        .centered_text(410.0, 13.0, Font::Regular, "Nous certifions que")
        .centered_text(375.0, 26.0, Font::Bold, &user.full_name());

    let contact = match &user.institution {
        Some(institution) if !institution.trim().is_empty() => {
            format!("{} - {}", user.email, institution.trim())
        }
        _ => user.email.clone(),
    };
    page.centered_text(350.0, 11.0, Font::Regular, &contact)
        .centered_text(310.0, 13.0, Font::Regular, role_sentence(role))
        .centered_text(280.0, 18.0, Font::Bold, &event.title);

    let mut details = date_range(event);
    if let Some(location) = event.location.as_deref().filter(|l| !l.trim().is_empty()) {
        details = format!("{}, {}", location.trim(), details);
    }
    page.centered_text(255.0, 12.0, Font::Regular, &details)
        .line(80.0, 110.0, PAGE_WIDTH - 80.0, 110.0)
        .text(
            80.0,
            90.0,
            10.0,
            Font::Regular,
            &format!("Code de verification : {}", unique_code),
        )
        .text(
            80.0,
            74.0,
            10.0,
            Font::Regular,
            &format!(
                "Document genere le {}",
                generated_at.format("%d/%m/%Y a %H:%M UTC")
            ),
        );
    page.finish()
}

fn role_sentence(role: Role) -> &'static str {
    match role {
        Role::Participant => "a participe a l'evenement",
        Role::Communicant => "a presente une communication acceptee lors de l'evenement",
        Role::MembreComite => "a siege au comite scientifique de l'evenement",
        Role::Organisateur => "a assure l'organisation de l'evenement",
        Role::Invite => "est intervenu(e) en tant qu'invite(e) lors de l'evenement",
        Role::SuperAdmin => "",
    }
}

fn date_range(event: &EventSnapshot) -> String {
    let start = event.start_date.format("%d/%m/%Y").to_string();
    match event.end_date {
        Some(end) if end != event.start_date => {
            format!("du {} au {}", start, end.format("%d/%m/%Y"))
        }
        _ => format!("le {}", start),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryFacts;

    fn generator(facts: Arc<MemoryFacts>, dir: &Path) -> AttestationGenerator {
        AttestationGenerator::new(facts, dir)
    }

    #[test]
    fn test_unique_code_is_32_hex_chars_and_unpredictable() {
        let a = new_unique_code();
        let b = new_unique_code();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_storage_path_layout() {
        let facts = Arc::new(MemoryFacts::default());
        let generator = generator(facts, Path::new("/srv/attestations"));
        let event_id = Uuid::new_v4();
        let path = generator.storage_path(event_id, Role::MembreComite, "abc123");
        assert_eq!(
            path,
            PathBuf::from(format!("/srv/attestations/{}/membre_comite/abc123.pdf", event_id))
        );
    }

    #[tokio::test]
    async fn test_generate_writes_non_empty_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let facts = Arc::new(MemoryFacts::default());
        let event = facts.add_event_ended_days_ago(1);
        let user = facts.add_user("Samira", "Ait Ali");
        let generator = generator(facts.clone(), dir.path());

        let generated = generator.generate(event, user, "participant").await.unwrap();

        assert!(generated.file_path.starts_with(dir.path().join(event.to_string())));
        let bytes = std::fs::read(&generated.file_path).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.4"));
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("(Samira Ait Ali)"));
        assert!(text.contains(&generated.unique_code));
    }

    #[tokio::test]
    async fn test_generate_rejects_invalid_type_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let facts = Arc::new(MemoryFacts::default());
        let event = facts.add_event_ended_days_ago(1);
        let user = facts.add_user("Samira", "Ait Ali");
        let generator = generator(facts.clone(), dir.path());

        let err = generator.generate(event, user, "keynote").await.unwrap_err();
        assert_eq!(err.reason(), Some(ReasonCode::TypeInvalid));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_generate_missing_event_or_user() {
        let dir = tempfile::tempdir().unwrap();
        let facts = Arc::new(MemoryFacts::default());
        let event = facts.add_event_ended_days_ago(1);
        let user = facts.add_user("Samira", "Ait Ali");
        let generator = generator(facts.clone(), dir.path());

        let err = generator
            .generate(Uuid::new_v4(), user, "participant")
            .await
            .unwrap_err();
        assert_eq!(err.reason(), Some(ReasonCode::EventNotFound));

        let err = generator
            .generate(event, Uuid::new_v4(), "participant")
            .await
            .unwrap_err();
        assert_eq!(err.reason(), Some(ReasonCode::UserNotFound));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_surfaces_as_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let facts = Arc::new(MemoryFacts::default());
        let event = facts.add_event_ended_days_ago(1);
        let user = facts.add_user("Samira", "Ait Ali");
        let generator = generator(facts.clone(), &blocker);

        let err = generator.generate(event, user, "participant").await.unwrap_err();
        assert!(matches!(err, MedeventaError::Io(_)));
    }

    #[test]
    fn test_render_is_deterministic_for_fixed_timestamp() {
        let facts = MemoryFacts::default();
        let event_id = facts.add_event_ended_days_ago(1);
        let user_id = facts.add_user("Rachid", "Ould");
        let event = facts.event_snapshot(event_id);
        let user = facts.user_snapshot(user_id);
        let at = Utc::now();

        let a = render(&event, &user, Role::Invite, "code", at);
        let b = render(&event, &user, Role::Invite, "code", at);
        assert_eq!(a, b);
        let text = String::from_utf8_lossy(&a);
        assert!(text.contains(&format!("({})", event.title)));
    }
}
