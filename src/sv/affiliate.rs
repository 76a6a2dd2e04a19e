use sea_orm::SqlErr;

use crate::{entity::affiliate, prelude::*, state::Config, utils};

const CODE_ATTEMPTS: usize = 5;
const MIN_PASSWORD_LEN: usize = 8;

pub struct Affiliate<'a> {
  db: &'a DatabaseConnection,
  config: &'a Config,
}

#[derive(Debug, Clone)]
pub struct NewAffiliate {
  pub email: String,
  pub password: String,
  pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
  Verified,
  AlreadyVerified,
}

impl<'a> Affiliate<'a> {
  pub fn new(db: &'a DatabaseConnection, config: &'a Config) -> Self {
    Self { db, config }
  }

  /// Create an unverified affiliate with a fresh code and verification token.
  pub async fn register(&self, new: NewAffiliate) -> Result<affiliate::Model> {
    let email = normalize_email(&new.email);
    if !is_valid_email(&email) {
      return Err(Error::InvalidArgs("A valid email is required".into()));
    }
    if new.password.chars().count() < MIN_PASSWORD_LEN {
      return Err(Error::InvalidArgs(format!(
        "Password must be at least {MIN_PASSWORD_LEN} characters"
      )));
    }

    if self.by_email(&email).await?.is_some() {
      return Err(Error::EmailTaken);
    }

    let password_hash =
      hash_password(new.password, self.config.bcrypt_cost).await?;
    let name =
      new.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

    for _ in 0..CODE_ATTEMPTS {
      let code = utils::generate_code();
      if self.by_code(&code).await?.is_some() {
        continue;
      }

      let now = Utc::now().naive_utc();
      let affiliate = affiliate::ActiveModel {
        id: NotSet,
        email: Set(email.clone()),
        password_hash: Set(password_hash.clone()),
        name: Set(name.clone()),
        code: Set(code),
        verified: Set(false),
        verification_token: Set(Some(utils::generate_token())),
        token_expires_at: Set(Some(now + self.verification_ttl())),
        total_clicks: Set(0),
        total_referrals: Set(0),
        conversion_rate: Set(0.0),
        created_at: Set(now),
        verified_at: Set(None),
      };

      match affiliate.insert(self.db).await {
        Ok(model) => {
          info!("Registered affiliate {} ({})", model.code, model.email);
          return Ok(model);
        }
        Err(err) => match err.sql_err() {
          Some(SqlErr::UniqueConstraintViolation(msg))
            if msg.contains("email") =>
          {
            return Err(Error::EmailTaken);
          }
          // lost a race on the code, draw another one
          Some(SqlErr::UniqueConstraintViolation(_)) => continue,
          _ => return Err(err.into()),
        },
      }
    }

    Err(Error::Internal("Could not allocate a unique affiliate code".into()))
  }

  pub async fn by_id(&self, id: i32) -> Result<Option<affiliate::Model>> {
    Ok(affiliate::Entity::find_by_id(id).one(self.db).await?)
  }

  pub async fn by_code(&self, code: &str) -> Result<Option<affiliate::Model>> {
    Ok(
      affiliate::Entity::find()
        .filter(affiliate::Column::Code.eq(code))
        .one(self.db)
        .await?,
    )
  }

  pub async fn by_email(
    &self,
    email: &str,
  ) -> Result<Option<affiliate::Model>> {
    Ok(
      affiliate::Entity::find()
        .filter(affiliate::Column::Email.eq(normalize_email(email)))
        .one(self.db)
        .await?,
    )
  }

  /// Consume a verification token.
  ///
  /// A consumed token stays attached to its affiliate with no expiry, so
  /// presenting it again resolves to [`Verification::AlreadyVerified`]
  /// without touching the row.
  pub async fn verify(&self, token: &str) -> Result<Verification> {
    let affiliate = affiliate::Entity::find()
      .filter(affiliate::Column::VerificationToken.eq(token))
      .one(self.db)
      .await?
      .ok_or(Error::TokenNotFound)?;

    let now = Utc::now().naive_utc();
    if let Some(expires_at) = affiliate.token_expires_at
      && expires_at < now
    {
      return Err(Error::TokenExpired);
    }

    if affiliate.verified {
      return Ok(Verification::AlreadyVerified);
    }

    let code = affiliate.code.clone();
    affiliate::ActiveModel {
      verified: Set(true),
      verified_at: Set(Some(now)),
      token_expires_at: Set(None),
      ..affiliate.into()
    }
    .update(self.db)
    .await?;

    info!("Affiliate {code} verified");
    Ok(Verification::Verified)
  }

  /// Issue a new verification token for an unverified affiliate.
  /// Returns `None` when there is nothing to verify.
  pub async fn rotate_verification(
    &self,
    email: &str,
  ) -> Result<Option<affiliate::Model>> {
    let Some(affiliate) = self.by_email(email).await? else {
      return Ok(None);
    };

    if affiliate.verified {
      return Ok(None);
    }

    let now = Utc::now().naive_utc();
    let model = affiliate::ActiveModel {
      verification_token: Set(Some(utils::generate_token())),
      token_expires_at: Set(Some(now + self.verification_ttl())),
      ..affiliate.into()
    }
    .update(self.db)
    .await?;

    Ok(Some(model))
  }

  /// Check credentials. Unknown email and wrong password are
  /// indistinguishable to the caller, in both body and bcrypt work.
  pub async fn login(
    &self,
    email: &str,
    password: &str,
  ) -> Result<affiliate::Model> {
    let affiliate = self.by_email(email).await?;

    let matches = check_password(
      password.to_string(),
      affiliate.as_ref().map(|a| a.password_hash.clone()),
      self.config.bcrypt_cost,
    )
    .await?;
    let Some(affiliate) = affiliate.filter(|_| matches) else {
      return Err(Error::InvalidCredentials);
    };

    if !affiliate.verified {
      return Err(Error::NotVerified);
    }

    Ok(affiliate)
  }

  fn verification_ttl(&self) -> TimeDelta {
    TimeDelta::from_std(self.config.verification_ttl)
      .unwrap_or(TimeDelta::hours(24))
  }
}

fn normalize_email(email: &str) -> String {
  email.trim().to_lowercase()
}

fn is_valid_email(email: &str) -> bool {
  match email.split_once('@') {
    Some((local, domain)) => {
      !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !email.contains(char::is_whitespace)
    }
    None => false,
  }
}

async fn hash_password(password: String, cost: u32) -> Result<String> {
  let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
    .await
    .map_err(|e| Error::Internal(format!("Hashing task failed: {e}")))??;
  Ok(hash)
}

async fn verify_password(password: String, hash: String) -> Result<bool> {
  let matches =
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
      .await
      .map_err(|e| Error::Internal(format!("Hashing task failed: {e}")))??;
  Ok(matches)
}

/// Verify against `hash`, or burn an equal-cost hash when there is no
/// account so the miss takes as long as a wrong password.
async fn check_password(
  password: String,
  hash: Option<String>,
  cost: u32,
) -> Result<bool> {
  match hash {
    Some(hash) => verify_password(password, hash).await,
    None => hash_password(password, cost).await.map(|_| false),
  }
}
