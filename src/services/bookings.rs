use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{BookingDetail, Provider, ProviderService, Transition, TransitionError};
use crate::services::{flash, policy};
use crate::urls;

const BOOKED_FOR_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingForm {
    pub booked_for: String,
    pub notes: Option<String>,
}

#[derive(Debug)]
pub struct StateChange {
    pub detail: BookingDetail,
    pub outcome: Result<(), TransitionError>,
    pub redirect_to: String,
}

pub fn parse_booked_for(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    BOOKED_FOR_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

fn load_booking(conn: &Connection, booking_id: i64) -> Result<BookingDetail, AppError> {
    queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))
}

fn load_service(conn: &Connection, service_id: i64) -> Result<(ProviderService, Provider), AppError> {
    let service = queries::get_service(conn, service_id)?
        .ok_or_else(|| AppError::NotFound(format!("service {service_id}")))?;
    let provider = queries::get_provider(conn, service.provider_id)?
        .ok_or_else(|| AppError::NotFound(format!("provider {}", service.provider_id)))?;
    Ok((service, provider))
}

// ── Listing ──

pub fn list_customer_bookings(
    conn: &Connection,
    user_id: i64,
) -> Result<Vec<BookingDetail>, AppError> {
    Ok(queries::get_bookings_for_customer(conn, user_id)?)
}

pub fn list_provider_bookings(
    conn: &Connection,
    user_id: i64,
    provider_id: i64,
) -> Result<(Provider, Vec<BookingDetail>), AppError> {
    let provider = queries::get_provider(conn, provider_id)?
        .ok_or_else(|| AppError::NotFound(format!("provider {provider_id}")))?;

    if !policy::can_list_provider_bookings(user_id, &provider) {
        tracing::warn!(user_id, provider_id, "provider booking list denied");
        return Err(AppError::Forbidden);
    }

    let bookings = queries::get_bookings_for_provider(conn, provider_id)?;
    Ok((provider, bookings))
}

// ── Creation ──

pub fn booking_form(
    conn: &Connection,
    service_id: i64,
) -> Result<(ProviderService, Provider), AppError> {
    load_service(conn, service_id)
}

fn validate_form(
    conn: &Connection,
    user_id: i64,
    service: &ProviderService,
    provider: &Provider,
    form: &CreateBookingForm,
    now: &NaiveDateTime,
) -> Result<NaiveDateTime, AppError> {
    let booked_for = parse_booked_for(&form.booked_for)
        .ok_or_else(|| AppError::Validation("Enter a valid date/time.".to_string()))?;

    if booked_for <= *now {
        return Err(AppError::Validation(
            "Booking time must be in the future.".to_string(),
        ));
    }

    if provider.owner_id == user_id {
        return Err(AppError::Validation(
            "You cannot book your own service.".to_string(),
        ));
    }

    if queries::has_active_booking(conn, user_id, service.id, &booked_for)? {
        return Err(AppError::Validation(
            "You already have a booking for this service at that time.".to_string(),
        ));
    }

    Ok(booked_for)
}

pub fn create_booking(
    conn: &Connection,
    user_id: i64,
    service_id: i64,
    form: &CreateBookingForm,
    now: &NaiveDateTime,
) -> Result<BookingDetail, AppError> {
    let (service, provider) = load_service(conn, service_id)?;
    let booked_for = validate_form(conn, user_id, &service, &provider, form, now)?;
    let notes = form
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    let tx = conn.unchecked_transaction()?;
    let booking_id = queries::insert_booking(&tx, service.id, user_id, &booked_for, notes, now)?;
    queries::insert_ticket(&tx, booking_id, &Uuid::new_v4(), now)?;
    flash::success(&tx, user_id, flash::BOOKING_SENT)?;
    tx.commit()?;

    tracing::info!(booking_id, service_id, user_id, %booked_for, "booking created");

    load_booking(conn, booking_id)
}

// ── State transitions ──

pub fn change_booking_state(
    conn: &Connection,
    user_id: i64,
    booking_id: i64,
    transition: Transition,
    now: &NaiveDateTime,
) -> Result<StateChange, AppError> {
    let detail = load_booking(conn, booking_id)?;

    if !policy::can_change_state(user_id, &detail, transition) {
        tracing::warn!(user_id, booking_id, action = transition.as_str(), "state change denied");
        return Err(AppError::Forbidden);
    }

    let redirect_to = match transition {
        Transition::Cancel => urls::booking_list(),
        Transition::Approve | Transition::Reject => urls::provider_booking_list(detail.provider.id),
    };

    let from = detail.booking.status;
    let mut updated = detail.clone();
    let outcome = match updated.booking.apply(transition) {
        Ok(()) => {
            let to = updated.booking.status;
            if queries::update_booking_status(conn, booking_id, from, to, now)? {
                updated.booking.updated_at = *now;
                Ok(())
            } else {
                // Someone else moved the booking between our read and write.
                let current = queries::get_booking(conn, booking_id)?
                    .map(|d| d.booking.status)
                    .unwrap_or(from);
                Err(TransitionError::NotAllowed {
                    action: transition.as_str(),
                    from: current,
                })
            }
        }
        Err(e) => Err(e),
    };

    let detail = match &outcome {
        Ok(()) => {
            tracing::info!(
                booking_id,
                user_id,
                from = from.as_str(),
                to = updated.booking.status.as_str(),
                "booking state changed"
            );
            updated
        }
        Err(e) => {
            tracing::warn!(booking_id, user_id, error = %e, "booking state change refused");
            flash::error(conn, user_id, flash::REQUEST_FAILED)?;
            detail
        }
    };

    Ok(StateChange {
        detail,
        outcome,
        redirect_to,
    })
}

// ── Tickets ──

pub fn view_ticket(
    conn: &Connection,
    user_id: i64,
    booking_id: i64,
) -> Result<BookingDetail, AppError> {
    let detail = load_booking(conn, booking_id)?;

    if !policy::can_view_ticket(user_id, &detail) {
        tracing::warn!(user_id, booking_id, "ticket view denied");
        return Err(AppError::Forbidden);
    }

    Ok(detail)
}

pub fn validate_ticket(
    conn: &Connection,
    user_id: i64,
    ticket_id: Option<&str>,
) -> Result<Option<BookingDetail>, AppError> {
    let detail = match ticket_id.and_then(|t| Uuid::parse_str(t.trim()).ok()) {
        Some(uuid) => queries::get_booking_by_ticket(conn, &uuid)?,
        None => None,
    };

    if !policy::can_validate_ticket(user_id, detail.as_ref()) {
        tracing::warn!(user_id, "ticket validation denied");
        return Err(AppError::Forbidden);
    }

    Ok(detail)
}
