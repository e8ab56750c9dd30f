pub mod bookings;
pub mod flash;
pub mod notify;
pub mod policy;
