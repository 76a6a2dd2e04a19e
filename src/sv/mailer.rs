//! Outbound email through an HTTP mail API.
//!
//! Expects an endpoint accepting `POST {from, to, subject, text}` with a
//! bearer key. Without configuration the message is logged instead.

use reqwest::Client;
use serde::Serialize;

use crate::{entity::affiliate, prelude::*};

#[derive(Debug, Clone)]
pub struct MailConfig {
  pub api_url: String,
  pub api_key: String,
  pub from: String,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
  from: &'a str,
  to: &'a str,
  subject: &'a str,
  text: String,
}

#[derive(Clone)]
pub struct Mailer {
  client: Client,
  config: Option<MailConfig>,
  public_url: String,
}

impl Mailer {
  pub fn new(config: Option<MailConfig>, public_url: &str) -> Self {
    Self {
      client: Client::new(),
      config,
      public_url: public_url.trim_end_matches('/').to_string(),
    }
  }

  pub fn verification_link(&self, token: &str) -> String {
    format!("{}/affiliate/verify?token={}", self.public_url, token)
  }

  pub async fn send_verification(
    &self,
    affiliate: &affiliate::Model,
  ) -> Result<()> {
    let Some(token) = affiliate.verification_token.as_deref() else {
      return Ok(());
    };
    let link = self.verification_link(token);

    let Some(config) = &self.config else {
      info!(
        "Mail API not configured, verification link for {}: {link}",
        affiliate.email
      );
      return Ok(());
    };

    let message = Message {
      from: &config.from,
      to: &affiliate.email,
      subject: "Confirm your affiliate account",
      text: format!(
        "Hi {},\n\nConfirm your email to activate affiliate code {}:\n{}\n",
        affiliate.display_name(),
        affiliate.code,
        link
      ),
    };

    self
      .client
      .post(&config.api_url)
      .bearer_auth(&config.api_key)
      .json(&message)
      .send()
      .await
      .and_then(|response| response.error_for_status())
      .map_err(|e| Error::Mail(format!("Request failed: {e}")))?;

    debug!("Verification mail sent to {}", affiliate.email);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_verification_link() {
    let mailer = Mailer::new(None, "https://news.example/");
    assert_eq!(
      mailer.verification_link("abc-123"),
      "https://news.example/affiliate/verify?token=abc-123"
    );
  }
}
