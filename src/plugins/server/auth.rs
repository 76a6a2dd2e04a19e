use std::{convert::Infallible, sync::Arc};

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{prelude::*, state::AppState, sv::session::Claims};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-signature";

/// The caller's session, if the request carried a valid bearer token.
/// Extraction never fails; handlers decide whether anonymous access is fine.
pub struct Viewer(pub Option<Claims>);

impl Viewer {
  pub fn require(self) -> Result<Claims> {
    self.0.ok_or(Error::Unauthenticated)
  }
}

impl FromRequestParts<Arc<AppState>> for Viewer {
  type Rejection = Infallible;

  async fn from_request_parts(
    parts: &mut Parts,
    app: &Arc<AppState>,
  ) -> Result<Self, Self::Rejection> {
    let claims = parts
      .headers
      .get(header::AUTHORIZATION)
      .and_then(|value| value.to_str().ok())
      .and_then(|value| value.strip_prefix("Bearer "))
      .and_then(|token| app.session.verify(token.trim()));

    Ok(Viewer(claims))
  }
}

/// Hex HMAC-SHA256 of `body` keyed by the server secret.
pub fn sign(secret: &str, body: &[u8]) -> String {
  let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
    .expect("HMAC can take key of any size");
  mac.update(body);
  hex::encode(mac.finalize().into_bytes())
}

/// Check the `X-Signature` header of a server-to-server request.
pub fn verify_signature(
  secret: &str,
  headers: &HeaderMap,
  body: &[u8],
) -> Result<()> {
  let signature = headers
    .get(SIGNATURE_HEADER)
    .and_then(|value| value.to_str().ok())
    .and_then(|value| hex::decode(value.trim()).ok())
    .ok_or(Error::InvalidSignature)?;

  let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
    .expect("HMAC can take key of any size");
  mac.update(body);
  mac.verify_slice(&signature).map_err(|_| Error::InvalidSignature)
}
