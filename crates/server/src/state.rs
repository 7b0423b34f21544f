use crate::accounts::AccountStore;
use crate::auth::JwtValidator;
use crate::service::AttestationService;
use crate::verification::VerificationCodeStore;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub attestations: Arc<AttestationService>,
    pub jwt: JwtValidator,
    pub verification_codes: VerificationCodeStore,
    pub accounts: Arc<dyn AccountStore>,
    pub static_dir: PathBuf,
}
