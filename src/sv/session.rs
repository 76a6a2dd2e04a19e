use jsonwebtoken::{
  Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};

use crate::{entity::affiliate, prelude::*};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
  pub affiliate_id: i32,
  pub email: String,
  pub affiliate_code: String,
  pub iat: i64,
  pub exp: i64,
}

/// Stateless HS256 session tokens for affiliate logins.
pub struct Session {
  encoding: EncodingKey,
  decoding: DecodingKey,
  validation: Validation,
  ttl: TimeDelta,
}

impl Session {
  pub fn new(secret: &str, ttl: Duration) -> Self {
    Self {
      encoding: EncodingKey::from_secret(secret.as_bytes()),
      decoding: DecodingKey::from_secret(secret.as_bytes()),
      validation: Validation::new(Algorithm::HS256),
      ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::days(7)),
    }
  }

  pub fn issue(&self, affiliate: &affiliate::Model) -> Result<String> {
    let now = Utc::now();
    let claims = Claims {
      affiliate_id: affiliate.id,
      email: affiliate.email.clone(),
      affiliate_code: affiliate.code.clone(),
      iat: now.timestamp(),
      exp: (now + self.ttl).timestamp(),
    };

    Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
  }

  /// Claims of a valid token. Bad signatures, expired or malformed tokens
  /// all yield `None`.
  pub fn verify(&self, token: &str) -> Option<Claims> {
    match decode::<Claims>(token, &self.decoding, &self.validation) {
      Ok(data) => Some(data.claims),
      Err(err) => {
        trace!("Rejected session token: {err}");
        None
      }
    }
  }
}
