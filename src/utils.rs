use uuid::Uuid;

pub fn round2(value: f64) -> f64 {
  (value * 100.0).round() / 100.0
}

/// Referrals per click as a percentage. The click count is floored at 1.
pub fn conversion_rate(referrals: i64, clicks: i64) -> f64 {
  round2(referrals as f64 / clicks.max(1) as f64 * 100.0)
}

/// Fresh 8-character uppercase affiliate code.
pub fn generate_code() -> String {
  Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

pub fn generate_token() -> String {
  Uuid::new_v4().to_string()
}
