pub mod affiliate;
pub mod click;
pub mod counters;
pub mod leaderboard;
pub mod mailer;
pub mod referral;
pub mod session;
#[cfg(test)]
pub mod test_utils;

pub use affiliate::Affiliate;
pub use click::Click;
pub use counters::Counters;
pub use leaderboard::Leaderboard;
pub use mailer::{MailConfig, Mailer};
pub use referral::Referral;
pub use session::Session;
