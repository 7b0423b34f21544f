use crate::entities::attestations;
use crate::role::Role;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateAttestation {
    pub event_id: Uuid,
    /// Kept as a raw string so unknown values surface as TYPE_INVALID instead of a 422.
    pub r#type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminGenerateAttestation {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub r#type: String,
    pub force: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadAttestationQuery {
    pub event_id: Uuid,
    pub r#type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationWithEvent {
    #[serde(flatten)]
    pub attestation: attestations::Model,
    pub event_title: Option<String>,
}

/// How a generate request was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Cached,
    Created,
    Regenerated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    pub status: GenerationStatus,
    pub attestation: attestations::Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibleAttestation {
    pub event_id: Uuid,
    pub event_title: String,
    pub r#type: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationVerification {
    pub unique_code: String,
    pub r#type: String,
    pub generated_at: DateTime<FixedOffset>,
    pub recipient_name: String,
    pub event_title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyCodeRequest {
    pub code: String,
}
