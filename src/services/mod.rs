pub mod captcha;
pub mod email;
pub mod sheets;
pub mod tiktok;
pub mod treasury;

use thiserror::Error;

pub use captcha::{CaptchaVerifier, Hcaptcha, Recaptcha};
pub use email::{Mailer, SendGrid};
pub use sheets::{GoogleSheets, SheetAppender};
pub use tiktok::{ResolveError, ResolvedVideo, TikTokResolver};
pub use treasury::{HttpTreasury, Treasury};

/// Failure talking to a third-party service.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response from {service}: {detail}")]
    UnexpectedResponse { service: &'static str, detail: String },

    #[error("credential error: {0}")]
    Credentials(String),
}
