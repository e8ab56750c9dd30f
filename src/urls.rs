pub const SEARCH: &str = "/search";

pub fn booking_list() -> String {
    "/bookings".to_string()
}

pub fn provider_booking_list(provider_id: i64) -> String {
    format!("/bookings/provider/{provider_id}")
}
