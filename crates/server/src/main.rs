use anyhow::Result;
use medeventa_common::config::AppConfig;
use medeventa_server::accounts::SeaAccountStore;
use medeventa_server::api;
use medeventa_server::auth::JwtValidator;
use medeventa_server::db::init_db;
use medeventa_server::facts::SeaFactSource;
use medeventa_server::service::AttestationService;
use medeventa_server::state::AppState;
use medeventa_server::store::SeaAttestationStore;
use medeventa_server::verification::{self, VerificationCodeStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env()?;
    let jwt = JwtValidator::new(config.jwt_secret.clone(), config.jwt_expiry_secs)?;
    let db = init_db(&config.database_url).await?;

    let facts = Arc::new(SeaFactSource::new(db.clone()));
    let store = Arc::new(SeaAttestationStore::new(db.clone()));
    let attestations = AttestationService::new(
        facts,
        store,
        config.attestations_dir.clone(),
        config.invite_requires_accepted_submission,
    );
    let verification_codes =
        VerificationCodeStore::new(Duration::from_secs(config.verification_code_ttl_secs));

    let state = AppState {
        attestations: Arc::new(attestations),
        jwt,
        verification_codes: verification_codes.clone(),
        accounts: Arc::new(SeaAccountStore::new(db.clone())),
        static_dir: config.static_dir.clone(),
    };

    let listen_addr = config.listen_addr.clone();
    let api_task = tokio::spawn(async move {
        let app = api::router(state);
        match tokio::net::TcpListener::bind(&listen_addr).await {
            Ok(listener) => {
                info!("medeventa listening on {}", listen_addr);
                if let Err(err) = axum::serve(listener, app).await {
                    warn!("api server exited: {}", err);
                }
            }
            Err(err) => warn!("failed to bind {}: {}", listen_addr, err),
        }
    });

    let sweep_interval = Duration::from_secs(config.verification_sweep_interval_secs);
    let sweeper_task = tokio::spawn(verification::run_sweeper(verification_codes, sweep_interval));

    tokio::select! {
        _ = api_task => {},
        _ = sweeper_task => {},
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
    }

    Ok(())
}
