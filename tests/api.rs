use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use investwatch_backend::config::DemoUser;
use investwatch_backend::{app, market, AppState, MemoryStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use tower_sessions::SessionManagerLayer;

fn router() -> Router {
    let store = Arc::new(MemoryStore::new());
    market::seed(store.as_ref()).unwrap();
    let state = AppState::new(store, DemoUser::default());
    app(state).layer(SessionManagerLayer::new(
        tower_sessions::MemoryStore::default(),
    ))
}

struct Reply {
    status: StatusCode,
    body: Value,
    cookie: Option<String>,
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> Reply {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    Reply {
        status,
        body,
        cookie,
    }
}

async fn login(app: &Router) -> String {
    let reply = send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "test@gmail.com", "password": "12345" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    reply.cookie.expect("login sets a session cookie")
}

fn tcs_investment(extra: Value) -> Value {
    let mut body = json!({
        "investment_type": "stock",
        "stock_id": "TCS",
        "quantity": 10.0,
        "invested_amount": 1000.0,
        "purchase_price": 100.0
    });
    if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            body.insert(key.clone(), value.clone());
        }
    }
    body
}

async fn set_tcs_price(app: &Router, price: f64) {
    let reply = send(
        app,
        Method::PATCH,
        "/api/stocks/TCS",
        None,
        Some(json!({ "price": price })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
}

async fn alerts(app: &Router, cookie: &str) -> Vec<Value> {
    let reply = send(app, Method::GET, "/api/investment-alerts", Some(cookie), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    reply.body.as_array().unwrap().clone()
}

#[tokio::test]
async fn investment_routes_require_a_session() {
    let app = router();
    let reply = send(&app, Method::GET, "/api/investments", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["code"], 401);

    let reply = send(&app, Method::GET, "/api/investment-alerts", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_logout_cycle() {
    let app = router();
    let rejected = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "test@gmail.com", "password": "wrong" })),
    )
    .await;
    assert_eq!(rejected.status, StatusCode::UNAUTHORIZED);

    let incomplete = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "x" })),
    )
    .await;
    assert_eq!(incomplete.status, StatusCode::BAD_REQUEST);
    assert_eq!(incomplete.body["code"], 400);
    assert!(incomplete.cookie.is_none());

    let cookie = login(&app).await;
    let me = send(&app, Method::GET, "/api/auth/user", Some(&cookie), None).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["id"], "test-user-1");

    let out = send(&app, Method::POST, "/api/auth/logout", Some(&cookie), None).await;
    assert_eq!(out.status, StatusCode::OK);
    let me = send(&app, Method::GET, "/api/auth/user", Some(&cookie), None).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn creation_then_loss_warning_on_read() {
    let app = router();
    let cookie = login(&app).await;

    let created = send(
        &app,
        Method::POST,
        "/api/investments",
        Some(&cookie),
        Some(tcs_investment(json!({}))),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["investment_type"], "stock");
    assert_eq!(created.body["invested_currency"], "INR");
    assert_eq!(created.body["alerts_enabled"], true);

    let initial = alerts(&app, &cookie).await;
    assert_eq!(initial.len(), 1);
    assert_eq!(initial[0]["alert_type"], "suggestion");
    assert_eq!(initial[0]["severity"], "success");
    assert_eq!(initial[0]["is_read"], false);

    set_tcs_price(&app, 95.0).await;
    let listed = send(&app, Method::GET, "/api/investments", Some(&cookie), None).await;
    assert_eq!(listed.status, StatusCode::OK);
    let investment = &listed.body[0];
    assert_eq!(investment["current_value"], 950.0);
    assert_eq!(investment["profit_loss"], -50.0);
    assert_eq!(investment["profit_loss_percent"], -5.0);
    assert_eq!(investment["instrument"]["kind"], "stock");
    assert_eq!(investment["instrument"]["name"], "Tata Consultancy Services");

    let after = alerts(&app, &cookie).await;
    assert_eq!(after.len(), 2);
    assert_eq!(after[0]["alert_type"], "loss_warning");
    assert_eq!(after[0]["severity"], "warning");
    assert_eq!(after[0]["suggestion_type"], "hold");
    assert_eq!(after[0]["action_required"], false);

    // A second read with the same price adds nothing.
    send(&app, Method::GET, "/api/investments", Some(&cookie), None).await;
    assert_eq!(alerts(&app, &cookie).await.len(), 2);
}

#[tokio::test]
async fn target_and_gain_fire_in_one_read() {
    let app = router();
    let cookie = login(&app).await;
    send(
        &app,
        Method::POST,
        "/api/investments",
        Some(&cookie),
        Some(tcs_investment(json!({ "target_price": 120.0 }))),
    )
    .await;

    set_tcs_price(&app, 125.0).await;
    let listed = send(&app, Method::GET, "/api/investments", Some(&cookie), None).await;
    assert_eq!(listed.body[0]["profit_loss_percent"], 25.0);

    let all = alerts(&app, &cookie).await;
    assert_eq!(all.len(), 3);
    let newest: Vec<&str> = all[..2]
        .iter()
        .map(|a| a["alert_type"].as_str().unwrap())
        .collect();
    assert!(newest.contains(&"target_reached"));
    assert!(newest.contains(&"suggestion"));
}

#[tokio::test]
async fn mark_read_is_idempotent_and_reports_unknown_ids() {
    let app = router();
    let cookie = login(&app).await;
    send(
        &app,
        Method::POST,
        "/api/investments",
        Some(&cookie),
        Some(tcs_investment(json!({}))),
    )
    .await;
    let id = alerts(&app, &cookie).await[0]["id"]
        .as_str()
        .unwrap()
        .to_string();
    let uri = format!("/api/investment-alerts/{}/read", id);

    for _ in 0..2 {
        let reply = send(&app, Method::PATCH, &uri, Some(&cookie), None).await;
        assert_eq!(reply.status, StatusCode::OK);
    }
    assert_eq!(alerts(&app, &cookie).await[0]["is_read"], true);

    let missing = send(
        &app,
        Method::PATCH,
        "/api/investment-alerts/nope/read",
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_investments_are_client_errors() {
    let app = router();
    let cookie = login(&app).await;

    let mut missing_quantity = tcs_investment(json!({}));
    missing_quantity.as_object_mut().unwrap().remove("quantity");
    let bad_bodies = [
        missing_quantity,
        tcs_investment(json!({ "invested_amount": 0.0 })),
        tcs_investment(json!({ "quantity": -3.0 })),
        tcs_investment(json!({ "stock_id": "NOPE" })),
    ];
    for body in bad_bodies {
        let reply = send(&app, Method::POST, "/api/investments", Some(&cookie), Some(body)).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{}", reply.body);
    }
    assert!(alerts(&app, &cookie).await.is_empty());
}

#[tokio::test]
async fn edit_and_delete_investments() {
    let app = router();
    let cookie = login(&app).await;
    let created = send(
        &app,
        Method::POST,
        "/api/investments",
        Some(&cookie),
        Some(tcs_investment(json!({ "stop_loss_price": 90.0 }))),
    )
    .await;
    let id = created.body["id"].as_str().unwrap().to_string();
    let uri = format!("/api/investments/{}", id);

    let edited = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&cookie),
        Some(json!({ "stop_loss_price": null, "alerts_enabled": false })),
    )
    .await;
    assert_eq!(edited.status, StatusCode::OK);
    assert_eq!(edited.body["stop_loss_price"], Value::Null);
    assert_eq!(edited.body["alerts_enabled"], false);

    let missing = send(
        &app,
        Method::PATCH,
        "/api/investments/nope",
        Some(&cookie),
        Some(json!({ "quantity": 2.0 })),
    )
    .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let deleted = send(&app, Method::DELETE, &uri, Some(&cookie), None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    let again = send(&app, Method::DELETE, &uri, Some(&cookie), None).await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);

    let listed = send(&app, Method::GET, "/api/investments", Some(&cookie), None).await;
    assert_eq!(listed.body, json!([]));
    assert!(alerts(&app, &cookie).await.is_empty());
}

#[tokio::test]
async fn market_catalogue_is_browsable_and_priceable() {
    let app = router();

    let stocks = send(&app, Method::GET, "/api/stocks", None, None).await;
    assert_eq!(stocks.body.as_array().unwrap().len(), 5);

    let pair = send(&app, Method::GET, "/api/forex/EURUSD", None, None).await;
    assert_eq!(pair.status, StatusCode::OK);
    assert_eq!(pair.body["kind"], "forex");
    assert_eq!(pair.body["base_currency"], "EUR");

    let missing = send(&app, Method::GET, "/api/stocks/NOPE", None, None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let negative = send(
        &app,
        Method::PATCH,
        "/api/forex/USDINR",
        None,
        Some(json!({ "price": -1.0 })),
    )
    .await;
    assert_eq!(negative.status, StatusCode::BAD_REQUEST);

    let moved = send(
        &app,
        Method::PATCH,
        "/api/forex/USDINR",
        None,
        Some(json!({ "price": 84.0 })),
    )
    .await;
    assert_eq!(moved.status, StatusCode::OK);
    assert_eq!(moved.body["current_rate"], 84.0);
}
