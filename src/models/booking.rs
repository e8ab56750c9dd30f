use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub service_id: i64,
    pub booked_by: i64,
    pub status: BookingStatus,
    pub booked_for: NaiveDateTime,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "approved" => BookingStatus::Approved,
            "rejected" => BookingStatus::Rejected,
            "cancelled" => BookingStatus::Cancelled,
            _ => BookingStatus::Pending,
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Cancel,
    Approve,
    Reject,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Cancel => "cancel",
            Transition::Approve => "approve",
            Transition::Reject => "reject",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot {action} a booking that is {from}")]
    NotAllowed {
        action: &'static str,
        from: BookingStatus,
    },
}

impl Booking {
    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        match self.status {
            BookingStatus::Pending | BookingStatus::Approved => {
                self.status = BookingStatus::Cancelled;
                Ok(())
            }
            from => Err(TransitionError::NotAllowed { action: "cancel", from }),
        }
    }

    pub fn approve(&mut self) -> Result<(), TransitionError> {
        match self.status {
            BookingStatus::Pending => {
                self.status = BookingStatus::Approved;
                Ok(())
            }
            from => Err(TransitionError::NotAllowed { action: "approve", from }),
        }
    }

    pub fn reject(&mut self) -> Result<(), TransitionError> {
        match self.status {
            BookingStatus::Pending => {
                self.status = BookingStatus::Rejected;
                Ok(())
            }
            from => Err(TransitionError::NotAllowed { action: "reject", from }),
        }
    }

    pub fn apply(&mut self, transition: Transition) -> Result<(), TransitionError> {
        match transition {
            Transition::Cancel => self.cancel(),
            Transition::Approve => self.approve(),
            Transition::Reject => self.reject(),
        }
    }
}
