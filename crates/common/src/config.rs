use anyhow::{Result, anyhow};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: String,
    pub jwt_secret: String,
    pub jwt_expiry_secs: u64,
    pub attestations_dir: PathBuf,
    pub static_dir: PathBuf,
    pub invite_requires_accepted_submission: bool,
    pub verification_code_ttl_secs: u64,
    pub verification_sweep_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        // Load .env early so process env reads pick it up.
        let _ = dotenvy::dotenv();

        let database_url =
            env::var("DATABASE_URL").map_err(|_| anyhow!("DATABASE_URL is required"))?;
        let jwt_secret = env::var("JWT_SECRET").map_err(|_| anyhow!("JWT_SECRET is required"))?;

        let listen_addr = env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let jwt_expiry_secs = env_u64("JWT_EXPIRY_SECS", 3600);
        let attestations_dir = env::var("ATTESTATIONS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/attestations"));
        let static_dir = env::var("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("web/dist"));

        let invite_requires_accepted_submission =
            env_bool("INVITE_REQUIRES_ACCEPTED_SUBMISSION", true);
        let verification_code_ttl_secs = env_u64("VERIFICATION_CODE_TTL_SECS", 600);
        let verification_sweep_interval_secs = env_u64("VERIFICATION_SWEEP_INTERVAL_SECS", 300);
        if verification_sweep_interval_secs == 0 {
            return Err(anyhow!("VERIFICATION_SWEEP_INTERVAL_SECS must be positive"));
        }

        Ok(Self {
            database_url,
            listen_addr,
            jwt_secret,
            jwt_expiry_secs,
            attestations_dir,
            static_dir,
            invite_requires_accepted_submission,
            verification_code_ttl_secs,
            verification_sweep_interval_secs,
        })
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => parse_bool(&value),
        Err(_) => default,
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES")
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}
