use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Redirect;
use axum::{Form, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::{BookingDetail, FlashMessage, Provider, ProviderService, Transition};
use crate::services::bookings::{self, CreateBookingForm};
use crate::services::flash;
use crate::services::notify::{self, BookingEvent};
use crate::state::AppState;
use crate::urls;

#[derive(Serialize)]
pub struct BookingListPage {
    bookings: Vec<BookingDetail>,
    messages: Vec<FlashMessage>,
}

#[derive(Serialize)]
pub struct ProviderBookingListPage {
    provider: Provider,
    bookings: Vec<BookingDetail>,
    messages: Vec<FlashMessage>,
}

#[derive(Serialize)]
pub struct BookingFormPage {
    service: ProviderService,
    provider: Provider,
    messages: Vec<FlashMessage>,
}

#[derive(Serialize)]
pub struct TicketPage {
    booking: BookingDetail,
    messages: Vec<FlashMessage>,
}

#[derive(Serialize)]
pub struct TicketValidateFormPage {
    fields: Vec<&'static str>,
    messages: Vec<FlashMessage>,
}

#[derive(Serialize)]
pub struct TicketValidatePage {
    ticket_id: Option<String>,
    booking: Option<BookingDetail>,
    messages: Vec<FlashMessage>,
}

// GET /bookings
pub async fn customer_bookings(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<BookingListPage>, AppError> {
    let db = state.conn()?;
    let bookings = bookings::list_customer_bookings(&db, user.id())?;
    let messages = flash::drain(&db, user.id())?;

    Ok(Json(BookingListPage { bookings, messages }))
}

// GET /bookings/provider/:provider_id
pub async fn provider_bookings(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(provider_id): Path<i64>,
) -> Result<Json<ProviderBookingListPage>, AppError> {
    let db = state.conn()?;
    let (provider, bookings) = bookings::list_provider_bookings(&db, user.id(), provider_id)?;
    let messages = flash::drain(&db, user.id())?;

    Ok(Json(ProviderBookingListPage {
        provider,
        bookings,
        messages,
    }))
}

// GET /bookings/create/:service_id
pub async fn booking_form(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(service_id): Path<i64>,
) -> Result<Json<BookingFormPage>, AppError> {
    let db = state.conn()?;
    let (service, provider) = bookings::booking_form(&db, service_id)?;
    let messages = flash::drain(&db, user.id())?;

    Ok(Json(BookingFormPage {
        service,
        provider,
        messages,
    }))
}

// POST /bookings/create/:service_id
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(service_id): Path<i64>,
    Form(form): Form<CreateBookingForm>,
) -> Result<Redirect, AppError> {
    let now = Utc::now().naive_utc();
    let detail = {
        let db = state.conn()?;
        bookings::create_booking(&db, user.id(), service_id, &form, &now)?
    };

    notify::dispatch(state.notifier.as_ref(), BookingEvent::new("created", &detail)).await;

    Ok(Redirect::to(urls::SEARCH))
}

// GET|POST /bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Redirect, AppError> {
    change_state(&state, &user, id, Transition::Cancel).await
}

// GET|POST /bookings/:id/approve
pub async fn approve_booking(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Redirect, AppError> {
    change_state(&state, &user, id, Transition::Approve).await
}

// GET|POST /bookings/:id/reject
pub async fn reject_booking(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Redirect, AppError> {
    change_state(&state, &user, id, Transition::Reject).await
}

async fn change_state(
    state: &Arc<AppState>,
    user: &CurrentUser,
    id: i64,
    transition: Transition,
) -> Result<Redirect, AppError> {
    let now = Utc::now().naive_utc();
    let change = {
        let db = state.conn()?;
        bookings::change_booking_state(&db, user.id(), id, transition, &now)?
    };

    if change.outcome.is_ok() {
        let kind = change.detail.booking.status.as_str();
        notify::dispatch(state.notifier.as_ref(), BookingEvent::new(kind, &change.detail)).await;
    }

    Ok(Redirect::to(&change.redirect_to))
}

// GET /bookings/:id/ticket
pub async fn view_ticket(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<TicketPage>, AppError> {
    let db = state.conn()?;
    let booking = bookings::view_ticket(&db, user.id(), id)?;
    let messages = flash::drain(&db, user.id())?;

    Ok(Json(TicketPage { booking, messages }))
}

// GET /bookings/ticket/validate/form
pub async fn ticket_validate_form(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<TicketValidateFormPage>, AppError> {
    let db = state.conn()?;
    let messages = flash::drain(&db, user.id())?;

    Ok(Json(TicketValidateFormPage {
        fields: vec!["ticket_id"],
        messages,
    }))
}

#[derive(Deserialize)]
pub struct TicketValidateQuery {
    pub ticket_id: Option<String>,
}

// GET /bookings/ticket/validate?ticket_id=
pub async fn validate_ticket(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<TicketValidateQuery>,
) -> Result<Json<TicketValidatePage>, AppError> {
    let db = state.conn()?;
    let booking = bookings::validate_ticket(&db, user.id(), query.ticket_id.as_deref())?;
    let messages = flash::drain(&db, user.id())?;

    Ok(Json(TicketValidatePage {
        ticket_id: query.ticket_id,
        booking,
        messages,
    }))
}
