use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/bookings", get(handlers::bookings::customer_bookings))
        .route(
            "/bookings/provider/:provider_id",
            get(handlers::bookings::provider_bookings),
        )
        .route(
            "/bookings/create/:service_id",
            get(handlers::bookings::booking_form).post(handlers::bookings::create_booking),
        )
        .route(
            "/bookings/:id/cancel",
            get(handlers::bookings::cancel_booking).post(handlers::bookings::cancel_booking),
        )
        .route(
            "/bookings/:id/approve",
            get(handlers::bookings::approve_booking).post(handlers::bookings::approve_booking),
        )
        .route(
            "/bookings/:id/reject",
            get(handlers::bookings::reject_booking).post(handlers::bookings::reject_booking),
        )
        .route("/bookings/:id/ticket", get(handlers::bookings::view_ticket))
        .route(
            "/bookings/ticket/validate/form",
            get(handlers::bookings::ticket_validate_form),
        )
        .route(
            "/bookings/ticket/validate",
            get(handlers::bookings::validate_ticket),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
