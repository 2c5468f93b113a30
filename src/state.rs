use std::sync::Arc;

use crate::auth::AuthVerifier;
use crate::config::PayoutConfig;
use crate::services::{CaptchaVerifier, Mailer, SheetAppender, TikTokResolver, Treasury};
use crate::store::Store;

/// Shared application state: every externally-held dependency behind a
/// trait object so tests can substitute in-memory fakes.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub auth: Arc<dyn AuthVerifier>,
    pub mailer: Arc<dyn Mailer>,
    pub sheets: Arc<dyn SheetAppender>,
    /// hCaptcha, guards the waitlist signup
    pub signup_captcha: Arc<dyn CaptchaVerifier>,
    /// reCAPTCHA, backs the standalone verify widget
    pub widget_captcha: Arc<dyn CaptchaVerifier>,
    pub treasury: Arc<dyn Treasury>,
    pub resolver: Arc<TikTokResolver>,
    pub payout: PayoutConfig,
}
