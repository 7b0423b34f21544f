use crate::accounts::OutgoingEmail;
use crate::auth::AuthUser;
use crate::metrics::{metrics_middleware, render_metrics};
use crate::service::{GenerationOutcome, file_missing};
use crate::state::AppState;
use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware;
use axum::response::Response;
use axum::routing::{delete, get, post};
use chrono::Utc;
use medeventa_common::entities::attestations;
use medeventa_common::models::{
    AdminGenerateAttestation, AttestationVerification, AttestationWithEvent,
    DownloadAttestationQuery, EligibleAttestation, GenerateAttestation, GenerationResponse,
    GenerationStatus, VerifyCodeRequest,
};
use medeventa_common::{MedeventaError, ReasonCode};
use serde_json::{Value as JsonValue, json};
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

type ApiResult<T> = std::result::Result<T, MedeventaError>;

type AttestationModel = attestations::Model;

pub fn router(state: AppState) -> axum::Router {
    let static_files = ServeDir::new(&state.static_dir)
        .fallback(ServeFile::new(state.static_dir.join("index.html")));
    axum::Router::new()
        .route("/api/v1/attestations/me/generate", post(generate_own))
        .route("/api/v1/attestations/me/download", get(download_own))
        .route("/api/v1/attestations/me/list", get(list_own))
        .route("/api/v1/attestations/me/eligibility", get(eligibility))
        .route("/api/v1/attestations/admin/generate", post(generate_admin))
        .route("/api/v1/attestations/evenement/{event_id}", get(list_event))
        .route(
            "/api/v1/attestations/verify/{code}",
            get(verify_attestation),
        )
        .route("/api/v1/attestations/{id}", delete(delete_attestation))
        .route(
            "/api/v1/auth/verification-codes",
            post(issue_verification_code),
        )
        .route(
            "/api/v1/auth/verification-codes/verify",
            post(check_verification_code),
        )
        .route("/api/v1/metrics", get(metrics))
        .route_layer(middleware::from_fn(metrics_middleware))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn generation_response(outcome: GenerationOutcome) -> (StatusCode, Json<GenerationResponse>) {
    let status = match outcome.status {
        GenerationStatus::Created => StatusCode::CREATED,
        GenerationStatus::Cached | GenerationStatus::Regenerated => StatusCode::OK,
    };
    (
        status,
        Json(GenerationResponse {
            status: outcome.status,
            attestation: outcome.attestation,
        }),
    )
}

async fn generate_own(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<GenerateAttestation>,
) -> ApiResult<(StatusCode, Json<GenerationResponse>)> {
    let outcome = state
        .attestations
        .generate_for_self(user.id, payload.event_id, &payload.r#type, Utc::now())
        .await?;
    Ok(generation_response(outcome))
}

/// Streams the stored file; range and conditional requests are answered by `ServeFile`.
async fn download_own(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<DownloadAttestationQuery>,
    request: axum::extract::Request,
) -> ApiResult<Response> {
    let (attestation, path) = state
        .attestations
        .download(user.id, query.event_id, &query.r#type, Utc::now())
        .await?;
    let response = match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    if response.status() == StatusCode::NOT_FOUND {
        return Err(file_missing(&path));
    }

    let mut response = response.map(Body::new);
    let disposition = format!(
        "attachment; filename=\"attestation-{}-{}.pdf\"",
        attestation.r#type, attestation.event_id
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

async fn generate_admin(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AdminGenerateAttestation>,
) -> ApiResult<(StatusCode, Json<GenerationResponse>)> {
    let outcome = state
        .attestations
        .generate_as_admin(
            user.actor(),
            payload.event_id,
            payload.user_id,
            &payload.r#type,
            payload.force.unwrap_or(false),
            Utc::now(),
        )
        .await?;
    Ok(generation_response(outcome))
}

async fn list_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<Uuid>,
) -> ApiResult<Json<Vec<AttestationModel>>> {
    let list = state
        .attestations
        .list_for_event(user.actor(), event_id)
        .await?;
    Ok(Json(list))
}

async fn list_own(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<AttestationWithEvent>>> {
    Ok(Json(state.attestations.list_for_user(user.id).await?))
}

async fn eligibility(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<EligibleAttestation>>> {
    let list = state.attestations.eligibility(user.id, Utc::now()).await?;
    Ok(Json(list))
}

async fn delete_attestation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<JsonValue>> {
    state.attestations.delete(user.actor(), id).await?;
    Ok(Json(json!({"deleted": true})))
}

async fn verify_attestation(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<AttestationVerification>> {
    Ok(Json(state.attestations.verify(&code).await?))
}

/// Queues the code for delivery to the caller's address; the code never
/// appears in the response or in logs.
async fn issue_verification_code(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<(StatusCode, Json<JsonValue>)> {
    let code = state.verification_codes.issue(user.id).await;
    let ttl = state.verification_codes.ttl().as_secs();
    let email = OutgoingEmail::verification_code(&user.email, &code, ttl.div_ceil(60));
    state.accounts.enqueue_email(email).await?;
    info!(user_id = %user.id, "verification code queued");
    Ok((StatusCode::ACCEPTED, Json(json!({"expiresInSecs": ttl}))))
}

async fn check_verification_code(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<VerifyCodeRequest>,
) -> ApiResult<Json<JsonValue>> {
    if !state
        .verification_codes
        .verify(user.id, payload.code.trim())
        .await
    {
        return Err(MedeventaError::validation(
            ReasonCode::CodeInvalid,
            "verification code is invalid or expired",
        ));
    }
    let verified_at = Utc::now();
    if !state
        .accounts
        .mark_email_verified(user.id, verified_at)
        .await?
    {
        return Err(MedeventaError::not_found(
            ReasonCode::UserNotFound,
            format!("user {} not found", user.id),
        ));
    }
    info!(user_id = %user.id, "email address verified");
    Ok(Json(json!({"verified": true, "emailVerifiedAt": verified_at})))
}

async fn metrics() -> Response {
    render_metrics()
}
