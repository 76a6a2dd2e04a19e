use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("{0}")]
  InvalidArgs(String),
  #[error("Invalid email or password")]
  InvalidCredentials,
  #[error("Authentication required")]
  Unauthenticated,
  #[error("Invalid request signature")]
  InvalidSignature,
  #[error("Please verify your email before logging in")]
  NotVerified,
  #[error("Affiliate not found")]
  AffiliateNotFound,
  #[error("Invalid affiliate code")]
  CodeNotFound,
  #[error("Invalid verification token")]
  TokenNotFound,
  #[error("Verification token has expired")]
  TokenExpired,
  #[error("Email is already registered")]
  EmailTaken,

  #[error("Database error: {0}")]
  Db(#[from] DbErr),
  #[error("Session error: {0}")]
  Session(#[from] jsonwebtoken::errors::Error),
  #[error("Password hashing error: {0}")]
  Hash(#[from] bcrypt::BcryptError),
  #[error("Mail delivery error: {0}")]
  Mail(String),
  #[error("Internal error: {0}")]
  Internal(String),
}

impl Error {
  pub fn status(&self) -> StatusCode {
    match self {
      Error::InvalidArgs(_) => StatusCode::BAD_REQUEST,
      Error::InvalidCredentials
      | Error::Unauthenticated
      | Error::InvalidSignature => StatusCode::UNAUTHORIZED,
      Error::NotVerified => StatusCode::FORBIDDEN,
      Error::AffiliateNotFound
      | Error::CodeNotFound
      | Error::TokenNotFound => StatusCode::NOT_FOUND,
      Error::TokenExpired => StatusCode::GONE,
      Error::EmailTaken => StatusCode::CONFLICT,
      Error::Db(_)
      | Error::Session(_)
      | Error::Hash(_)
      | Error::Mail(_)
      | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  pub fn is_internal(&self) -> bool {
    self.status() == StatusCode::INTERNAL_SERVER_ERROR
  }

  /// Message safe to show to the caller. Internal details stay in the logs.
  pub fn user_message(&self) -> String {
    if self.is_internal() {
      "Internal server error".into()
    } else {
      self.to_string()
    }
  }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Failure {
  success: bool,
  error: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  requires_verification: Option<bool>,
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    if self.is_internal() {
      tracing::error!("request failed: {self}");
    }

    let body = Failure {
      success: false,
      error: self.user_message(),
      requires_verification: matches!(self, Error::NotVerified).then_some(true),
    };

    (self.status(), Json(body)).into_response()
  }
}
