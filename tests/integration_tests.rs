use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use tower::ServiceExt;

use bookit::app::build_router;
use bookit::auth::sign_session;
use bookit::config::AppConfig;
use bookit::db::{self, queries};
use bookit::models::BookingStatus;
use bookit::services::notify::{BookingEvent, Notifier};
use bookit::state::AppState;

// ── Mock Notifier ──

struct MockNotifier {
    sent: Arc<Mutex<Vec<BookingEvent>>>,
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, event: &BookingEvent) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(event.clone());
        Ok(())
    }
}

// ── Helpers ──

const SECRET: &str = "test-secret";

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        session_secret: SECRET.to_string(),
        notify_webhook_url: None,
    }
}

struct Fixture {
    state: Arc<AppState>,
    sent: Arc<Mutex<Vec<BookingEvent>>>,
    owner: i64,
    alice: i64,
    bob: i64,
    provider: i64,
    service: i64,
}

fn setup() -> Fixture {
    let conn = db::init_db(":memory:").unwrap();
    let owner = queries::create_user(&conn, "owner").unwrap();
    let alice = queries::create_user(&conn, "alice").unwrap();
    let bob = queries::create_user(&conn, "bob").unwrap();
    let provider = queries::create_provider(&conn, "Bob's Barbershop", owner).unwrap();
    let service = queries::create_service(&conn, provider, "Haircut", None, 30).unwrap();

    let sent = Arc::new(Mutex::new(vec![]));
    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: test_config(),
        notifier: Box::new(MockNotifier {
            sent: Arc::clone(&sent),
        }),
    });

    Fixture {
        state,
        sent,
        owner,
        alice,
        bob,
        provider,
        service,
    }
}

fn app(f: &Fixture) -> Router {
    build_router(f.state.clone())
}

fn get_as(user_id: i64, uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(
            header::COOKIE,
            format!("session={}", sign_session(SECRET, user_id)),
        )
        .body(Body::empty())
        .unwrap()
}

fn post_form_as(user_id: i64, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::AUTHORIZATION,
            format!("Bearer {}", sign_session(SECRET, user_id)),
        )
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(res: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn location(res: &Response<Body>) -> &str {
    res.headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}

async fn create_booking(f: &Fixture, user_id: i64, booked_for: &str) -> i64 {
    let res = app(f)
        .oneshot(post_form_as(
            user_id,
            &format!("/bookings/create/{}", f.service),
            &format!("booked_for={booked_for}"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);

    let db = f.state.db.lock().unwrap();
    queries::get_bookings_for_customer(&db, user_id)
        .unwrap()
        .into_iter()
        .map(|d| d.booking.id)
        .max()
        .unwrap()
}

// ── Authentication ──

#[tokio::test]
async fn test_requires_session() {
    let f = setup();
    let res = app(&f)
        .oneshot(Request::builder().uri("/bookings").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_forged_session_rejected() {
    let f = setup();
    let res = app(&f)
        .oneshot(
            Request::builder()
                .uri("/bookings")
                .header(header::COOKIE, format!("session={}", sign_session("wrong", f.alice)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app(&f).oneshot(get_as(999, "/bookings")).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health() {
    let f = setup();
    let res = app(&f)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

// ── Creation ──

#[tokio::test]
async fn test_create_booking_redirects_to_search_with_flash() {
    let f = setup();

    let res = app(&f)
        .oneshot(get_as(f.alice, &format!("/bookings/create/{}", f.service)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = json_body(res).await;
    assert_eq!(json["service"]["name"], "Haircut");
    assert_eq!(json["provider"]["id"], f.provider);

    let res = app(&f)
        .oneshot(post_form_as(
            f.alice,
            &format!("/bookings/create/{}", f.service),
            "booked_for=2099-06-15T14%3A00&notes=short+back",
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/search");

    let res = app(&f).oneshot(get_as(f.alice, "/bookings")).await.unwrap();
    let json = json_body(res).await;
    let bookings = json["bookings"].as_array().unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0]["booked_by"], f.alice);
    assert_eq!(bookings[0]["service_id"], f.service);
    assert_eq!(bookings[0]["status"], "pending");
    assert_eq!(bookings[0]["notes"], "short back");
    assert!(bookings[0]["ticket"]["uuid"].is_string());

    let messages = json["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["level"], "success");
    assert_eq!(messages[0]["message"], "Your booking has been sent for approval");
    assert_eq!(messages[0]["extra_tags"], "alert alert-success");

    // Flash messages are shown once.
    let res = app(&f).oneshot(get_as(f.alice, "/bookings")).await.unwrap();
    let json = json_body(res).await;
    assert!(json["messages"].as_array().unwrap().is_empty());

    let sent = f.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, "created");
    assert_eq!(sent[0].provider_id, f.provider);
}

#[tokio::test]
async fn test_create_booking_unknown_service() {
    let f = setup();
    let res = app(&f)
        .oneshot(post_form_as(f.alice, "/bookings/create/999", "booked_for=2099-06-15T14%3A00"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_booking_in_past_rejected() {
    let f = setup();
    let res = app(&f)
        .oneshot(post_form_as(
            f.alice,
            &format!("/bookings/create/{}", f.service),
            "booked_for=2001-01-01T09%3A00",
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let db = f.state.db.lock().unwrap();
    assert!(queries::get_bookings_for_customer(&db, f.alice).unwrap().is_empty());
}

// ── Listing ──

#[tokio::test]
async fn test_customer_list_only_own_bookings() {
    let f = setup();
    create_booking(&f, f.alice, "2099-01-01T10%3A00").await;
    create_booking(&f, f.bob, "2099-01-02T10%3A00").await;

    let res = app(&f).oneshot(get_as(f.bob, "/bookings")).await.unwrap();
    let json = json_body(res).await;
    let bookings = json["bookings"].as_array().unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0]["booked_by"], f.bob);
}

#[tokio::test]
async fn test_provider_list_owner_only() {
    let f = setup();
    create_booking(&f, f.alice, "2099-01-01T10%3A00").await;
    create_booking(&f, f.bob, "2099-01-02T10%3A00").await;

    let other_service = {
        let db = f.state.db.lock().unwrap();
        let other_owner = queries::create_user(&db, "other-owner").unwrap();
        let other_provider = queries::create_provider(&db, "Day Spa", other_owner).unwrap();
        queries::create_service(&db, other_provider, "Massage", None, 60).unwrap()
    };
    let res = app(&f)
        .oneshot(post_form_as(
            f.alice,
            &format!("/bookings/create/{other_service}"),
            "booked_for=2099-01-03T10%3A00",
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);

    let uri = format!("/bookings/provider/{}", f.provider);
    let res = app(&f).oneshot(get_as(f.owner, &uri)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = json_body(res).await;
    assert_eq!(json["provider"]["name"], "Bob's Barbershop");
    let bookings = json["bookings"].as_array().unwrap();
    assert_eq!(bookings.len(), 2);
    for booking in bookings {
        assert_eq!(booking["provider"]["id"], f.provider);
        assert_eq!(booking["service_id"], f.service);
    }

    let res = app(&f).oneshot(get_as(f.alice, &uri)).await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app(&f)
        .oneshot(get_as(f.owner, "/bookings/provider/999"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

// ── State transitions ──

#[tokio::test]
async fn test_approve_redirects_to_provider_list() {
    let f = setup();
    let id = create_booking(&f, f.alice, "2099-01-01T10%3A00").await;

    let res = app(&f)
        .oneshot(get_as(f.owner, &format!("/bookings/{id}/approve")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), format!("/bookings/provider/{}", f.provider));

    {
        let db = f.state.db.lock().unwrap();
        let detail = queries::get_booking(&db, id).unwrap().unwrap();
        assert_eq!(detail.booking.status, BookingStatus::Approved);
    }

    let sent = f.sent.lock().unwrap();
    assert_eq!(sent.last().unwrap().kind, "approved");
}

#[tokio::test]
async fn test_refused_transition_flashes_one_error() {
    let f = setup();
    let id = create_booking(&f, f.alice, "2099-01-01T10%3A00").await;

    let res = app(&f)
        .oneshot(post_form_as(f.owner, &format!("/bookings/{id}/reject"), ""))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);

    // Already rejected: approving is refused but still redirects.
    let res = app(&f)
        .oneshot(get_as(f.owner, &format!("/bookings/{id}/approve")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), format!("/bookings/provider/{}", f.provider));

    let res = app(&f)
        .oneshot(get_as(f.owner, &format!("/bookings/provider/{}", f.provider)))
        .await
        .unwrap();
    let json = json_body(res).await;
    let messages = json["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["level"], "error");
    assert_eq!(messages[0]["message"], "Unable to process your request.");
    assert_eq!(json["bookings"][0]["status"], "rejected");

    assert_eq!(f.sent.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_cancel_redirects_to_customer_list() {
    let f = setup();
    let id = create_booking(&f, f.alice, "2099-01-01T10%3A00").await;
    let uri = format!("/bookings/{id}/cancel");

    let res = app(&f).oneshot(get_as(f.alice, &uri)).await.unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/bookings");

    // Second cancel is refused and still lands on the list.
    let res = app(&f).oneshot(get_as(f.alice, &uri)).await.unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/bookings");

    let res = app(&f).oneshot(get_as(f.alice, "/bookings")).await.unwrap();
    let json = json_body(res).await;
    assert_eq!(json["bookings"][0]["status"], "cancelled");
    let levels: Vec<&str> = json["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["level"].as_str().unwrap())
        .collect();
    assert_eq!(levels, vec!["success", "error"]);
}

#[tokio::test]
async fn test_transition_permissions_and_not_found() {
    let f = setup();
    let id = create_booking(&f, f.alice, "2099-01-01T10%3A00").await;

    let res = app(&f)
        .oneshot(get_as(f.alice, &format!("/bookings/{id}/approve")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app(&f)
        .oneshot(get_as(f.bob, &format!("/bookings/{id}/cancel")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app(&f)
        .oneshot(get_as(f.owner, "/bookings/999/reject"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let db = f.state.db.lock().unwrap();
    let detail = queries::get_booking(&db, id).unwrap().unwrap();
    assert_eq!(detail.booking.status, BookingStatus::Pending);
}

#[tokio::test]
async fn test_storage_failure_during_transition_is_500() {
    let f = setup();
    let id = create_booking(&f, f.alice, "2099-01-01T10%3A00").await;

    let res = app(&f)
        .oneshot(get_as(f.alice, &format!("/bookings/{id}/cancel")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);

    {
        let db = f.state.db.lock().unwrap();
        db.execute_batch("DROP TABLE flash_messages;").unwrap();
    }

    // Cancelling twice is refused, and queuing the error message now fails.
    let res = app(&f)
        .oneshot(get_as(f.alice, &format!("/bookings/{id}/cancel")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

// ── Tickets ──

#[tokio::test]
async fn test_ticket_view_owner_only() {
    let f = setup();
    let id = create_booking(&f, f.alice, "2099-01-01T10%3A00").await;
    let uri = format!("/bookings/{id}/ticket");

    let res = app(&f).oneshot(get_as(f.alice, &uri)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = json_body(res).await;
    assert_eq!(json["booking"]["id"], id);
    assert!(json["booking"]["ticket"]["uuid"].is_string());

    let res = app(&f).oneshot(get_as(f.bob, &uri)).await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app(&f)
        .oneshot(get_as(f.alice, "/bookings/999/ticket"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ticket_validation() {
    let f = setup();
    let id = create_booking(&f, f.alice, "2099-01-01T10%3A00").await;
    let uuid = {
        let db = f.state.db.lock().unwrap();
        queries::get_booking(&db, id)
            .unwrap()
            .unwrap()
            .ticket
            .unwrap()
            .uuid
    };

    let res = app(&f)
        .oneshot(get_as(f.owner, "/bookings/ticket/validate/form"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["fields"][0], "ticket_id");

    let uri = format!("/bookings/ticket/validate?ticket_id={uuid}");
    let res = app(&f).oneshot(get_as(f.owner, &uri)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = json_body(res).await;
    assert_eq!(json["booking"]["id"], id);
    assert_eq!(json["booking"]["service"]["name"], "Haircut");

    let res = app(&f).oneshot(get_as(f.bob, &uri)).await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_ticket_is_not_denied() {
    let f = setup();
    create_booking(&f, f.alice, "2099-01-01T10%3A00").await;

    for uri in [
        "/bookings/ticket/validate?ticket_id=00000000-0000-4000-8000-000000000000",
        "/bookings/ticket/validate?ticket_id=garbage",
        "/bookings/ticket/validate",
    ] {
        let res = app(&f).oneshot(get_as(f.bob, uri)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK, "{uri}");
        let json = json_body(res).await;
        assert!(json["booking"].is_null(), "{uri}");
    }
}
