mod grant_beta;
mod payout;
mod remove_bug;

pub use grant_beta::grant_beta_access;
pub use payout::payout;
pub use remove_bug::remove_bug;
