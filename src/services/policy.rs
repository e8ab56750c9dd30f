use crate::models::{BookingDetail, Provider, Transition};

pub fn can_list_provider_bookings(user_id: i64, provider: &Provider) -> bool {
    provider.owner_id == user_id
}

pub fn can_view_ticket(user_id: i64, detail: &BookingDetail) -> bool {
    detail.booking.booked_by == user_id
}

pub fn can_validate_ticket(user_id: i64, detail: Option<&BookingDetail>) -> bool {
    match detail {
        Some(detail) => detail.provider.owner_id == user_id,
        None => true,
    }
}

pub fn can_change_state(user_id: i64, detail: &BookingDetail, transition: Transition) -> bool {
    match transition {
        Transition::Cancel => detail.booking.booked_by == user_id,
        Transition::Approve | Transition::Reject => detail.provider.owner_id == user_id,
    }
}
