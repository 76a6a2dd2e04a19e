use axum::{
  Router,
  body::{Body, to_bytes},
  http::{Request, StatusCode, header},
};
use tower::ServiceExt;

use super::{auth, router};
use crate::{
  entity::{affiliate, click},
  prelude::*,
  state::AppState,
  sv::test_utils::{insert_affiliate, set_counters, test_config, test_db},
};

const SECRET: &str = "test-secret";

async fn setup() -> (Arc<AppState>, Router) {
  let db = test_db::setup().await;
  let app = Arc::new(AppState::with_db(db, SECRET.into(), test_config()));
  (app.clone(), router(app))
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
  let res = router.clone().oneshot(req).await.unwrap();
  let status = res.status();
  let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
  (status, bytes.to_vec())
}

async fn call(router: &Router, req: Request<Body>) -> (StatusCode, json::Value) {
  let (status, bytes) = send(router, req).await;
  let body = if bytes.is_empty() {
    json::Value::Null
  } else {
    json::from_slice(&bytes).unwrap()
  };
  (status, body)
}

fn get(uri: &str) -> Request<Body> {
  Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: json::Value) -> Request<Body> {
  Request::post(uri)
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from(body.to_string()))
    .unwrap()
}

fn signed_conversion(body: json::Value) -> Request<Body> {
  let raw = body.to_string();
  Request::post("/affiliate/conversion")
    .header(header::CONTENT_TYPE, "application/json")
    .header(auth::SIGNATURE_HEADER, auth::sign(SECRET, raw.as_bytes()))
    .body(Body::from(raw))
    .unwrap()
}

async fn reload(app: &AppState, id: i32) -> affiliate::Model {
  affiliate::Entity::find_by_id(id).one(&app.db).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_health() {
  let (_, router) = setup().await;
  let (status, body) = call(&router, get("/health")).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_track_validation() {
  let (app, router) = setup().await;
  insert_affiliate(&app.db, "AFF123", true).await;

  let (status, body) = call(&router, get("/affiliate/track")).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["success"], false);
  assert_eq!(body["error"], "Referral code is required");

  let (status, body) = call(&router, get("/affiliate/track?ref=NOPE")).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["error"], "Invalid affiliate code");
  assert_eq!(click::Entity::find().count(&app.db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_track_records_request_details() {
  let (app, router) = setup().await;
  let affiliate = insert_affiliate(&app.db, "AFF123", true).await;

  let req = Request::get("/affiliate/track?ref=AFF123")
    .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
    .header(header::USER_AGENT, "Mozilla/5.0")
    .header(header::REFERER, "https://news.example/post")
    .body(Body::empty())
    .unwrap();
  let (status, body) = call(&router, req).await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["success"], true);
  assert_eq!(body["affiliateCode"], "AFF123");

  let rows = click::Entity::find().all(&app.db).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].ip_address, "203.0.113.7");
  assert_eq!(rows[0].user_agent.as_deref(), Some("Mozilla/5.0"));
  assert_eq!(rows[0].referer.as_deref(), Some("https://news.example/post"));
  assert_eq!(reload(&app, affiliate.id).await.total_clicks, 1);

  call(&router, get("/affiliate/track?ref=AFF123")).await;
  let rows = click::Entity::find().all(&app.db).await.unwrap();
  assert_eq!(rows[1].ip_address, "unknown");
}

#[tokio::test]
async fn test_clicks_then_signed_conversion() {
  let (app, router) = setup().await;
  let affiliate = insert_affiliate(&app.db, "AFF123", true).await;

  for _ in 0..3 {
    let (status, _) = call(&router, get("/affiliate/track?ref=AFF123")).await;
    assert_eq!(status, StatusCode::OK);
  }

  let (status, body) = call(
    &router,
    signed_conversion(json::json!({
      "affiliateCode": "AFF123",
      "conversionType": "signup",
    })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["totalReferrals"], 1);
  assert_eq!(body["conversionRate"], 33.33);

  let stored = reload(&app, affiliate.id).await;
  assert_eq!(stored.total_clicks, 3);
  assert_eq!(stored.total_referrals, 1);
  assert_eq!(stored.conversion_rate, 33.33);
}

#[tokio::test]
async fn test_conversion_rejections() {
  let (app, router) = setup().await;
  let affiliate = insert_affiliate(&app.db, "AFF123", true).await;

  let (status, _) = call(
    &router,
    post_json("/affiliate/conversion", json::json!({ "affiliateCode": "AFF123" })),
  )
  .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let req = Request::post("/affiliate/conversion")
    .header(auth::SIGNATURE_HEADER, auth::sign("wrong", b"{}"))
    .body(Body::from(r#"{"affiliateCode":"AFF123"}"#))
    .unwrap();
  let (status, _) = call(&router, req).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let (status, _) =
    call(&router, signed_conversion(json::json!({ "metadata": {} }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = call(
    &router,
    signed_conversion(json::json!({ "affiliateCode": "MISSING" })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  assert_eq!(reload(&app, affiliate.id).await.total_referrals, 0);
}

#[tokio::test]
async fn test_verify_flow() {
  let (app, router) = setup().await;
  let pending = insert_affiliate(&app.db, "PENDING1", false).await;
  let token = pending.verification_token.clone().unwrap();

  let (status, _) = call(&router, get("/affiliate/verify")).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = call(&router, get("/affiliate/verify?token=nope")).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let uri = format!("/affiliate/verify?token={token}");
  let (status, body) = call(&router, get(&uri)).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["message"], "Email verified successfully");
  let verified = reload(&app, pending.id).await;
  assert!(verified.verified);

  let (status, body) = call(&router, get(&uri)).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["message"], "Email already verified");
  assert_eq!(reload(&app, pending.id).await, verified);
}

#[tokio::test]
async fn test_verify_expired_token() {
  let (app, router) = setup().await;
  let pending = insert_affiliate(&app.db, "PENDING1", false).await;

  affiliate::ActiveModel {
    verification_token: Set(Some("expired-token".into())),
    token_expires_at: Set(Some(Utc::now().naive_utc() - TimeDelta::hours(2))),
    ..pending.clone().into()
  }
  .update(&app.db)
  .await
  .unwrap();

  let (status, body) =
    call(&router, get("/affiliate/verify?token=expired-token")).await;
  assert_eq!(status, StatusCode::GONE);
  assert_eq!(body["error"], "Verification token has expired");
  assert!(!reload(&app, pending.id).await.verified);
}

#[tokio::test]
async fn test_login_errors_do_not_leak() {
  let (app, router) = setup().await;
  insert_affiliate(&app.db, "AFF123", true).await;
  insert_affiliate(&app.db, "PENDING1", false).await;

  let (status, _) = call(
    &router,
    post_json("/affiliate/login", json::json!({ "email": "aff123@example.com" })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let wrong_password = send(
    &router,
    post_json(
      "/affiliate/login",
      json::json!({ "email": "aff123@example.com", "password": "nope nope" }),
    ),
  )
  .await;
  let unknown_email = send(
    &router,
    post_json(
      "/affiliate/login",
      json::json!({ "email": "ghost@example.com", "password": "correct horse" }),
    ),
  )
  .await;
  assert_eq!(wrong_password.0, StatusCode::UNAUTHORIZED);
  assert_eq!(wrong_password, unknown_email);

  let (status, body) = call(
    &router,
    post_json(
      "/affiliate/login",
      json::json!({ "email": "pending1@example.com", "password": "correct horse" }),
    ),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert_eq!(body["requiresVerification"], true);
}

#[tokio::test]
async fn test_login_and_link() {
  let (app, router) = setup().await;
  let affiliate = insert_affiliate(&app.db, "AFF123", true).await;

  let (status, body) = call(
    &router,
    post_json(
      "/affiliate/login",
      json::json!({ "email": "aff123@example.com", "password": "correct horse" }),
    ),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["affiliate"]["affiliateCode"], "AFF123");
  assert!(body["affiliate"].get("passwordHash").is_none());
  let token = body["token"].as_str().unwrap().to_string();

  let (status, _) = call(&router, get("/affiliate/link")).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let bad = Request::get("/affiliate/link")
    .header(header::AUTHORIZATION, "Bearer garbage")
    .body(Body::empty())
    .unwrap();
  let (status, _) = call(&router, bad).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let authed = || {
    Request::get("/affiliate/link")
      .header(header::AUTHORIZATION, format!("Bearer {token}"))
      .body(Body::empty())
      .unwrap()
  };
  let (status, body) = call(&router, authed()).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["affiliateCode"], "AFF123");
  assert_eq!(body["affiliateLink"], "http://localhost:3000/?ref=AFF123");
  assert_eq!(body["shortCode"], "http://localhost:3000/r/AFF123");

  affiliate::Entity::delete_by_id(affiliate.id).exec(&app.db).await.unwrap();
  let (status, _) = call(&router, authed()).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_verify_login_stats() {
  let (app, router) = setup().await;

  let (status, body) = call(
    &router,
    post_json(
      "/affiliate/register",
      json::json!({
        "email": "new@example.com",
        "password": "long enough",
        "name": "Newcomer",
      }),
    ),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  let code = body["affiliateCode"].as_str().unwrap().to_string();

  let (status, _) = call(
    &router,
    post_json(
      "/affiliate/register",
      json::json!({ "email": "new@example.com", "password": "long enough" }),
    ),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);

  let (status, _) = call(
    &router,
    post_json(
      "/affiliate/resend-verification",
      json::json!({ "email": "new@example.com" }),
    ),
  )
  .await;
  assert_eq!(status, StatusCode::OK);

  let model = app.sv().affiliate.by_code(&code).await.unwrap().unwrap();
  let token = model.verification_token.unwrap();
  let (status, _) =
    call(&router, get(&format!("/affiliate/verify?token={token}"))).await;
  assert_eq!(status, StatusCode::OK);

  call(&router, get(&format!("/affiliate/track?ref={code}"))).await;

  let (_, body) = call(
    &router,
    post_json(
      "/affiliate/login",
      json::json!({ "email": "new@example.com", "password": "long enough" }),
    ),
  )
  .await;
  let session = body["token"].as_str().unwrap();

  let req = Request::get("/affiliate/stats")
    .header(header::AUTHORIZATION, format!("Bearer {session}"))
    .body(Body::empty())
    .unwrap();
  let (status, body) = call(&router, req).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["affiliate"]["name"], "Newcomer");
  assert_eq!(body["affiliate"]["totalClicks"], 1);
  assert_eq!(body["recentClicks"].as_array().unwrap().len(), 1);
  assert_eq!(body["recentReferrals"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_leaderboard_public_projection() {
  let (app, router) = setup().await;
  let a = insert_affiliate(&app.db, "LOWRATE1", true).await;
  let b = insert_affiliate(&app.db, "HIGHRATE", true).await;
  set_counters(&app.db, a.id, 25, 10).await;
  set_counters(&app.db, b.id, 20, 10).await;

  let (status, body) =
    call(&router, get("/affiliate/leaderboard?limit=1&public=true")).await;
  assert_eq!(status, StatusCode::OK);
  let entries = body["leaderboard"].as_array().unwrap();
  assert_eq!(entries.len(), 1);
  assert_eq!(entries[0]["rank"], 1);
  assert_eq!(entries[0]["affiliateCode"], "HIGHRATE");
  assert_eq!(entries[0]["conversionRate"], 50.0);
  assert!(entries[0].get("email").is_none());
  assert_eq!(body["totalStats"]["totalAffiliates"], 2);

  let (_, body) = call(&router, get("/affiliate/leaderboard")).await;
  for entry in body["leaderboard"].as_array().unwrap() {
    assert!(entry.get("email").is_none());
  }

  let (_, body) =
    call(&router, get("/affiliate/leaderboard?public=false")).await;
  assert_eq!(body["leaderboard"][0]["email"], "highrate@example.com");
  assert_eq!(body["leaderboard"][1]["email"], "lowrate1@example.com");
}

#[tokio::test]
async fn test_short_link_redirect() {
  let (app, router) = setup().await;
  let affiliate = insert_affiliate(&app.db, "AFF123", true).await;

  let res = router.clone().oneshot(get("/r/AFF123")).await.unwrap();
  assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
  assert_eq!(res.headers()[header::LOCATION], "http://localhost:3000");
  assert_eq!(reload(&app, affiliate.id).await.total_clicks, 1);

  let res = router.clone().oneshot(get("/r/UNKNOWN")).await.unwrap();
  assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
  assert_eq!(click::Entity::find().count(&app.db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_malformed_query_is_json_error() {
  let (app, router) = setup().await;
  let affiliate = insert_affiliate(&app.db, "AFF123", true).await;

  for uri in [
    "/affiliate/track?ref=AFF123&ref=AFF123",
    "/affiliate/verify?token=a&token=b",
    "/affiliate/leaderboard?limit=1&limit=2",
  ] {
    let (status, bytes) = send(&router, get(uri)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");

    let body: json::Value = json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false, "{uri}");
    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()), "{uri}");
  }

  assert_eq!(reload(&app, affiliate.id).await.total_clicks, 0);
}
