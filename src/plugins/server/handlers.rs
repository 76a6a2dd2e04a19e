use std::sync::Arc;

use axum::{
  Json,
  body::Bytes,
  extract::{
    Path, Query, State,
    rejection::{JsonRejection, QueryRejection},
  },
  http::{HeaderMap, StatusCode, header},
  response::Redirect,
};
use serde::{Deserialize, Serialize};

use super::auth::{self, Viewer};
use crate::{
  entity::{affiliate, click, referral},
  prelude::*,
  state::AppState,
  sv::{
    affiliate::{NewAffiliate, Verification},
    click::{UNKNOWN_IP, Visit},
    leaderboard::{DEFAULT_LIMIT, Page},
    referral::Conversion,
  },
  utils,
};

const RECENT_LIMIT: u64 = 10;

type App = State<Arc<AppState>>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
  success: bool,
  message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  affiliate_code: Option<String>,
}

impl Status {
  fn ok(message: impl Into<String>) -> Json<Self> {
    Json(Self { success: true, message: message.into(), affiliate_code: None })
  }

  fn with_code(message: impl Into<String>, code: String) -> Json<Self> {
    Json(Self {
      success: true,
      message: message.into(),
      affiliate_code: Some(code),
    })
  }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateView {
  id: i32,
  email: String,
  name: Option<String>,
  affiliate_code: String,
  verified: bool,
  total_clicks: i64,
  total_referrals: i64,
  conversion_rate: f64,
  created_at: chrono::DateTime<Utc>,
}

impl From<affiliate::Model> for AffiliateView {
  fn from(model: affiliate::Model) -> Self {
    Self {
      id: model.id,
      email: model.email,
      name: model.name,
      affiliate_code: model.code,
      verified: model.verified,
      total_clicks: model.total_clicks,
      total_referrals: model.total_referrals,
      conversion_rate: utils::round2(model.conversion_rate),
      created_at: model.created_at.and_utc(),
    }
  }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickView {
  ip_address: String,
  user_agent: Option<String>,
  referer: Option<String>,
  created_at: chrono::DateTime<Utc>,
}

impl From<click::Model> for ClickView {
  fn from(model: click::Model) -> Self {
    Self {
      ip_address: model.ip_address,
      user_agent: model.user_agent,
      referer: model.referer,
      created_at: model.created_at.and_utc(),
    }
  }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralView {
  conversion_type: String,
  metadata: Option<json::Value>,
  created_at: chrono::DateTime<Utc>,
}

impl From<referral::Model> for ReferralView {
  fn from(model: referral::Model) -> Self {
    Self {
      conversion_type: model.conversion_type,
      metadata: model.metadata,
      created_at: model.created_at.and_utc(),
    }
  }
}

/// Unwrap a JSON body, reporting malformed input as a bad request.
fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
  payload
    .map(|Json(body)| body)
    .map_err(|rejection| Error::InvalidArgs(rejection.body_text()))
}

/// Unwrap a query string the same way, so malformed parameters still get
/// the JSON error shape.
fn params<T>(
  query: std::result::Result<Query<T>, QueryRejection>,
) -> Result<T> {
  query
    .map(|Query(params)| params)
    .map_err(|rejection| Error::InvalidArgs(rejection.body_text()))
}

fn required(value: Option<String>, what: &str) -> Result<String> {
  value
    .map(|v| v.trim().to_string())
    .filter(|v| !v.is_empty())
    .ok_or_else(|| Error::InvalidArgs(format!("{what} is required")))
}

fn header_str(
  headers: &HeaderMap,
  name: impl header::AsHeaderName,
) -> Option<&str> {
  headers
    .get(name)
    .and_then(|value| value.to_str().ok())
    .map(str::trim)
    .filter(|value| !value.is_empty())
}

/// Best-effort client address: first `X-Forwarded-For` hop, then
/// `X-Real-IP`, otherwise `"unknown"`.
pub fn client_ip(headers: &HeaderMap) -> String {
  header_str(headers, "x-forwarded-for")
    .and_then(|value| value.split(',').next())
    .map(str::trim)
    .filter(|value| !value.is_empty())
    .or_else(|| header_str(headers, "x-real-ip"))
    .unwrap_or(UNKNOWN_IP)
    .to_string()
}

fn visit(headers: &HeaderMap) -> Visit {
  Visit {
    ip_address: client_ip(headers),
    user_agent: header_str(headers, header::USER_AGENT).map(String::from),
    referer: header_str(headers, header::REFERER).map(String::from),
  }
}

pub async fn health() -> Json<json::Value> {
  Json(json::json!({ "success": true }))
}

#[derive(Deserialize)]
pub struct RegisterReq {
  email: Option<String>,
  password: Option<String>,
  name: Option<String>,
}

pub async fn register(
  State(app): App,
  payload: std::result::Result<Json<RegisterReq>, JsonRejection>,
) -> Result<(StatusCode, Json<Status>)> {
  let req = body(payload)?;
  let email = required(req.email, "Email")?;
  let password = required(req.password, "Password")?;

  let affiliate = app
    .sv()
    .affiliate
    .register(NewAffiliate { email, password, name: req.name })
    .await?;

  if let Err(err) = app.mailer.send_verification(&affiliate).await {
    error!("Verification mail to {} failed: {err}", affiliate.email);
  }

  Ok((
    StatusCode::CREATED,
    Status::with_code(
      "Registration successful. Check your email to verify your account.",
      affiliate.code,
    ),
  ))
}

#[derive(Deserialize)]
pub struct ResendReq {
  email: Option<String>,
}

pub async fn resend_verification(
  State(app): App,
  payload: std::result::Result<Json<ResendReq>, JsonRejection>,
) -> Result<Json<Status>> {
  let email = required(body(payload)?.email, "Email")?;

  if let Some(affiliate) =
    app.sv().affiliate.rotate_verification(&email).await?
    && let Err(err) = app.mailer.send_verification(&affiliate).await
  {
    error!("Verification mail to {} failed: {err}", affiliate.email);
  }

  Ok(Status::ok(
    "If that account exists and is not yet verified, a new verification \
     email has been sent.",
  ))
}

#[derive(Deserialize)]
pub struct VerifyQuery {
  token: Option<String>,
}

pub async fn verify(
  State(app): App,
  query: std::result::Result<Query<VerifyQuery>, QueryRejection>,
) -> Result<Json<Status>> {
  let token = required(params(query)?.token, "Verification token")?;

  let message = match app.sv().affiliate.verify(&token).await? {
    Verification::Verified => "Email verified successfully",
    Verification::AlreadyVerified => "Email already verified",
  };

  Ok(Status::ok(message))
}

#[derive(Deserialize)]
pub struct LoginReq {
  email: Option<String>,
  password: Option<String>,
}

#[derive(Serialize)]
pub struct LoginRes {
  success: bool,
  token: String,
  affiliate: AffiliateView,
}

pub async fn login(
  State(app): App,
  payload: std::result::Result<Json<LoginReq>, JsonRejection>,
) -> Result<Json<LoginRes>> {
  let req = body(payload)?;
  let (Some(email), Some(password)) = (
    req.email.filter(|e| !e.trim().is_empty()),
    req.password.filter(|p| !p.is_empty()),
  ) else {
    return Err(Error::InvalidArgs("Email and password are required".into()));
  };

  let affiliate = app.sv().affiliate.login(&email, &password).await?;
  let token = app.session.issue(&affiliate)?;

  info!("Affiliate {} logged in", affiliate.code);
  Ok(Json(LoginRes { success: true, token, affiliate: affiliate.into() }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRes {
  success: bool,
  affiliate_code: String,
  affiliate_link: String,
  short_code: String,
}

pub async fn link(State(app): App, viewer: Viewer) -> Result<Json<LinkRes>> {
  let claims = viewer.require()?;
  let affiliate = app
    .sv()
    .affiliate
    .by_id(claims.affiliate_id)
    .await?
    .ok_or(Error::AffiliateNotFound)?;

  let base = &app.config.public_url;
  Ok(Json(LinkRes {
    success: true,
    affiliate_link: format!("{base}/?ref={}", affiliate.code),
    short_code: format!("{base}/r/{}", affiliate.code),
    affiliate_code: affiliate.code,
  }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsRes {
  success: bool,
  affiliate: AffiliateView,
  recent_clicks: Vec<ClickView>,
  recent_referrals: Vec<ReferralView>,
}

pub async fn stats(State(app): App, viewer: Viewer) -> Result<Json<StatsRes>> {
  let claims = viewer.require()?;
  let sv = app.sv();

  let affiliate = sv
    .affiliate
    .by_id(claims.affiliate_id)
    .await?
    .ok_or(Error::AffiliateNotFound)?;
  let recent_clicks = sv.click.recent(affiliate.id, RECENT_LIMIT).await?;
  let recent_referrals =
    sv.referral.recent(affiliate.id, RECENT_LIMIT).await?;

  Ok(Json(StatsRes {
    success: true,
    affiliate: affiliate.into(),
    recent_clicks: recent_clicks.into_iter().map(Into::into).collect(),
    recent_referrals: recent_referrals.into_iter().map(Into::into).collect(),
  }))
}

#[derive(Deserialize)]
pub struct TrackQuery {
  #[serde(rename = "ref")]
  code: Option<String>,
}

pub async fn track(
  State(app): App,
  headers: HeaderMap,
  query: std::result::Result<Query<TrackQuery>, QueryRejection>,
) -> Result<Json<Status>> {
  let code = required(params(query)?.code, "Referral code")?;
  let affiliate = app.sv().click.track(&code, visit(&headers)).await?;

  Ok(Status::with_code("Click tracked successfully", affiliate.code))
}

/// Short link: count the click when the code is known, always land on the
/// public site.
pub async fn redirect(
  State(app): App,
  headers: HeaderMap,
  Path(code): Path<String>,
) -> Redirect {
  match app.sv().click.track(code.trim(), visit(&headers)).await {
    Ok(_) | Err(Error::CodeNotFound) => {}
    Err(err) => error!("Short link click for {code} failed: {err}"),
  }

  Redirect::temporary(&app.config.public_url)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionReq {
  #[serde(alias = "ref")]
  affiliate_code: Option<String>,
  conversion_type: Option<String>,
  metadata: Option<json::Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRes {
  success: bool,
  affiliate_code: String,
  total_referrals: i64,
  conversion_rate: f64,
}

/// Server-to-server hook for completed signups and purchases. The raw body
/// must be signed with the shared secret.
pub async fn conversion(
  State(app): App,
  headers: HeaderMap,
  raw: Bytes,
) -> Result<Json<ConversionRes>> {
  auth::verify_signature(&app.secret, &headers, &raw)?;

  let req: ConversionReq = json::from_slice(&raw)
    .map_err(|e| Error::InvalidArgs(format!("Invalid JSON body: {e}")))?;
  let code = required(req.affiliate_code, "Affiliate code")?;

  let affiliate = app
    .sv()
    .referral
    .record(
      &code,
      Conversion {
        conversion_type: req.conversion_type,
        metadata: req.metadata,
      },
    )
    .await?;

  Ok(Json(ConversionRes {
    success: true,
    total_referrals: affiliate.total_referrals,
    conversion_rate: utils::round2(affiliate.conversion_rate),
    affiliate_code: affiliate.code,
  }))
}

#[derive(Deserialize)]
pub struct LeaderboardQuery {
  limit: Option<String>,
  public: Option<String>,
}

#[derive(Serialize)]
pub struct LeaderboardRes {
  success: bool,
  #[serde(flatten)]
  page: Page,
}

/// Unparseable or zero limits fall back to the default; the service clamps
/// the rest. Only an explicit `public=false` exposes emails.
fn leaderboard_params(query: &LeaderboardQuery) -> (u64, bool) {
  let limit = query
    .limit
    .as_deref()
    .and_then(|raw| raw.trim().parse::<i64>().ok())
    .filter(|&n| n > 0)
    .map_or(DEFAULT_LIMIT, |n| n as u64);

  let public = !matches!(
    query.public.as_deref().map(str::trim),
    Some("false") | Some("0")
  );

  (limit, public)
}

pub async fn leaderboard(
  State(app): App,
  query: std::result::Result<Query<LeaderboardQuery>, QueryRejection>,
) -> Result<Json<LeaderboardRes>> {
  let (limit, public) = leaderboard_params(&params(query)?);
  let page = app.sv().leaderboard.page(limit, public).await?;

  Ok(Json(LeaderboardRes { success: true, page }))
}
