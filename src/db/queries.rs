use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::TIMESTAMP_FORMAT;
use crate::models::{
    Booking, BookingDetail, BookingStatus, FlashLevel, FlashMessage, Provider, ProviderService,
    Ticket, User,
};

fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap_or_else(|_| Utc::now().naive_utc())
}

// ── Users ──

pub fn create_user(conn: &Connection, username: &str) -> anyhow::Result<i64> {
    conn.execute("INSERT INTO users (username) VALUES (?1)", params![username])?;
    Ok(conn.last_insert_rowid())
}

pub fn get_user(conn: &Connection, id: i64) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, username FROM users WHERE id = ?1",
            params![id],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

// ── Providers & services ──

pub fn create_provider(conn: &Connection, name: &str, owner_id: i64) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO providers (name, owner_id) VALUES (?1, ?2)",
        params![name, owner_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_provider(conn: &Connection, id: i64) -> anyhow::Result<Option<Provider>> {
    let provider = conn
        .query_row(
            "SELECT id, name, owner_id FROM providers WHERE id = ?1",
            params![id],
            |row| {
                Ok(Provider {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    owner_id: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(provider)
}

pub fn create_service(
    conn: &Connection,
    provider_id: i64,
    name: &str,
    description: Option<&str>,
    duration_minutes: i32,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO provider_services (provider_id, name, description, duration_minutes)
         VALUES (?1, ?2, ?3, ?4)",
        params![provider_id, name, description, duration_minutes],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_service(conn: &Connection, id: i64) -> anyhow::Result<Option<ProviderService>> {
    let service = conn
        .query_row(
            "SELECT id, provider_id, name, description, duration_minutes
             FROM provider_services WHERE id = ?1",
            params![id],
            |row| {
                Ok(ProviderService {
                    id: row.get(0)?,
                    provider_id: row.get(1)?,
                    name: row.get(2)?,
                    description: row.get(3)?,
                    duration_minutes: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(service)
}

// ── Bookings ──

const BOOKING_DETAIL_SELECT: &str = "SELECT b.id, b.service_id, b.booked_by, b.status, b.booked_for, b.notes, b.created_at, b.updated_at,
        s.id, s.provider_id, s.name, s.description, s.duration_minutes,
        p.id, p.name, p.owner_id,
        t.id, t.uuid, t.created_at
 FROM bookings b
 JOIN provider_services s ON s.id = b.service_id
 JOIN providers p ON p.id = s.provider_id
 LEFT JOIN tickets t ON t.booking_id = b.id";

pub fn insert_booking(
    conn: &Connection,
    service_id: i64,
    booked_by: i64,
    booked_for: &NaiveDateTime,
    notes: Option<&str>,
    now: &NaiveDateTime,
) -> anyhow::Result<i64> {
    let now = format_ts(now);
    conn.execute(
        "INSERT INTO bookings (service_id, booked_by, status, booked_for, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            service_id,
            booked_by,
            BookingStatus::Pending.as_str(),
            format_ts(booked_for),
            notes,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_ticket(
    conn: &Connection,
    booking_id: i64,
    uuid: &Uuid,
    now: &NaiveDateTime,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO tickets (booking_id, uuid, created_at) VALUES (?1, ?2, ?3)",
        params![booking_id, uuid.to_string(), format_ts(now)],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_booking(conn: &Connection, id: i64) -> anyhow::Result<Option<BookingDetail>> {
    let sql = format!("{BOOKING_DETAIL_SELECT} WHERE b.id = ?1");
    let result = conn
        .query_row(&sql, params![id], |row| Ok(parse_booking_detail_row(row)))
        .optional()?;
    result.transpose()
}

pub fn get_booking_by_ticket(
    conn: &Connection,
    uuid: &Uuid,
) -> anyhow::Result<Option<BookingDetail>> {
    let sql = format!("{BOOKING_DETAIL_SELECT} WHERE t.uuid = ?1");
    let result = conn
        .query_row(&sql, params![uuid.to_string()], |row| {
            Ok(parse_booking_detail_row(row))
        })
        .optional()?;
    result.transpose()
}

pub fn get_bookings_for_customer(
    conn: &Connection,
    user_id: i64,
) -> anyhow::Result<Vec<BookingDetail>> {
    let sql = format!(
        "{BOOKING_DETAIL_SELECT} WHERE b.booked_by = ?1 ORDER BY b.status ASC, b.booked_for DESC, b.id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id], |row| Ok(parse_booking_detail_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn get_bookings_for_provider(
    conn: &Connection,
    provider_id: i64,
) -> anyhow::Result<Vec<BookingDetail>> {
    let sql = format!(
        "{BOOKING_DETAIL_SELECT} WHERE s.provider_id = ?1 ORDER BY b.status DESC, b.booked_for DESC, b.id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![provider_id], |row| {
        Ok(parse_booking_detail_row(row))
    })?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn has_active_booking(
    conn: &Connection,
    user_id: i64,
    service_id: i64,
    booked_for: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings
         WHERE booked_by = ?1 AND service_id = ?2 AND booked_for = ?3
           AND status IN (?4, ?5)",
        params![
            user_id,
            service_id,
            format_ts(booked_for),
            BookingStatus::Pending.as_str(),
            BookingStatus::Approved.as_str(),
        ],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Moves a booking from `from` to `to`. Returns false when the stored status
/// is no longer `from`.
pub fn update_booking_status(
    conn: &Connection,
    id: i64,
    from: BookingStatus,
    to: BookingStatus,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![to.as_str(), format_ts(now), id, from.as_str()],
    )?;
    Ok(count > 0)
}

fn parse_booking_detail_row(row: &rusqlite::Row) -> anyhow::Result<BookingDetail> {
    let status_str: String = row.get(3)?;
    let booked_for_str: String = row.get(4)?;
    let created_at_str: String = row.get(6)?;
    let updated_at_str: String = row.get(7)?;

    let booking = Booking {
        id: row.get(0)?,
        service_id: row.get(1)?,
        booked_by: row.get(2)?,
        status: BookingStatus::parse(&status_str),
        booked_for: parse_ts(&booked_for_str),
        notes: row.get(5)?,
        created_at: parse_ts(&created_at_str),
        updated_at: parse_ts(&updated_at_str),
    };

    let service = ProviderService {
        id: row.get(8)?,
        provider_id: row.get(9)?,
        name: row.get(10)?,
        description: row.get(11)?,
        duration_minutes: row.get(12)?,
    };

    let provider = Provider {
        id: row.get(13)?,
        name: row.get(14)?,
        owner_id: row.get(15)?,
    };

    let ticket_id: Option<i64> = row.get(16)?;
    let ticket = match ticket_id {
        Some(id) => {
            let uuid_str: String = row.get(17)?;
            let created_at_str: String = row.get(18)?;
            Some(Ticket {
                id,
                booking_id: booking.id,
                uuid: Uuid::parse_str(&uuid_str)?,
                created_at: parse_ts(&created_at_str),
            })
        }
        None => None,
    };

    Ok(BookingDetail {
        booking,
        service,
        provider,
        ticket,
    })
}

// ── Flash messages ──

pub fn insert_flash_message(
    conn: &Connection,
    user_id: i64,
    message: &FlashMessage,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO flash_messages (user_id, level, message, extra_tags) VALUES (?1, ?2, ?3, ?4)",
        params![
            user_id,
            message.level.as_str(),
            message.message,
            message.extra_tags
        ],
    )?;
    Ok(())
}

pub fn take_flash_messages(conn: &Connection, user_id: i64) -> anyhow::Result<Vec<FlashMessage>> {
    let mut stmt = conn.prepare(
        "SELECT level, message, extra_tags FROM flash_messages WHERE user_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        let level: String = row.get(0)?;
        Ok(FlashMessage {
            level: FlashLevel::parse(&level),
            message: row.get(1)?,
            extra_tags: row.get(2)?,
        })
    })?;

    let mut messages = vec![];
    for row in rows {
        messages.push(row?);
    }

    conn.execute(
        "DELETE FROM flash_messages WHERE user_id = ?1",
        params![user_id],
    )?;
    Ok(messages)
}
