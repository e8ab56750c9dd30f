use rusqlite::Connection;

use crate::db::queries;
use crate::models::{FlashLevel, FlashMessage};

pub const BOOKING_SENT: &str = "Your booking has been sent for approval";
pub const REQUEST_FAILED: &str = "Unable to process your request.";

pub fn success(conn: &Connection, user_id: i64, message: &str) -> anyhow::Result<()> {
    add(conn, user_id, FlashLevel::Success, message, "alert alert-success")
}

pub fn error(conn: &Connection, user_id: i64, message: &str) -> anyhow::Result<()> {
    add(conn, user_id, FlashLevel::Error, message, "alert alert-error")
}

pub fn add(
    conn: &Connection,
    user_id: i64,
    level: FlashLevel,
    message: &str,
    extra_tags: &str,
) -> anyhow::Result<()> {
    queries::insert_flash_message(
        conn,
        user_id,
        &FlashMessage {
            level,
            message: message.to_string(),
            extra_tags: extra_tags.to_string(),
        },
    )
}

pub fn drain(conn: &Connection, user_id: i64) -> anyhow::Result<Vec<FlashMessage>> {
    queries::take_flash_messages(conn, user_id)
}
