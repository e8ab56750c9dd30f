pub mod booking;
pub mod flash;
pub mod provider;
pub mod ticket;
pub mod user;

pub use booking::{Booking, BookingStatus, Transition, TransitionError};
pub use flash::{FlashLevel, FlashMessage};
pub use provider::{Provider, ProviderService};
pub use ticket::{BookingDetail, Ticket};
pub use user::User;
