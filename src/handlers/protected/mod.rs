mod join_beta;
mod notify_me;
mod report_bug;

pub use join_beta::join_beta;
pub use notify_me::notify_me;
pub use report_bug::report_bug;
