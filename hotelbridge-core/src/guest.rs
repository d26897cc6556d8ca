use hotelbridge_shared::Masked;
use serde::{Deserialize, Serialize};

use crate::{BookingError, BookingResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GuestType {
    Adult,
    Child,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Guest {
    pub title: String,
    pub first_name: String,
    pub last_name: String,
    pub guest_type: GuestType,
    #[serde(default)]
    pub age: Option<u8>,
    /// Zero-based index of the room the guest stays in.
    pub room_index: usize,
    #[serde(default)]
    pub lead: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactDetail {
    pub name: String,
    pub email: Masked<String>,
    pub phone: Masked<String>,
}

impl ContactDetail {
    pub fn validate(&self) -> BookingResult<()> {
        if self.name.trim().is_empty() {
            return Err(BookingError::ValidationError("Contact name is required".to_string()));
        }

        let email = self.email.expose().trim();
        let valid_email = match email.split_once('@') {
            Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
            None => false,
        };
        if !valid_email {
            return Err(BookingError::ValidationError("Contact email is invalid".to_string()));
        }

        let digits = self.phone.expose().chars().filter(|c| c.is_ascii_digit()).count();
        let allowed = self
            .phone
            .expose()
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-'));
        if !allowed || !(7..=15).contains(&digits) {
            return Err(BookingError::ValidationError("Contact phone is invalid".to_string()));
        }

        Ok(())
    }
}

/// Checks the guest list against the number of rooms being booked.
pub fn validate_guests(guests: &[Guest], room_count: usize) -> BookingResult<()> {
    if guests.is_empty() {
        return Err(BookingError::ValidationError("At least one guest is required".to_string()));
    }

    for guest in guests {
        if guest.first_name.trim().is_empty() || guest.last_name.trim().is_empty() {
            return Err(BookingError::ValidationError("Guest names must not be empty".to_string()));
        }
        if guest.room_index >= room_count {
            return Err(BookingError::ValidationError(format!(
                "Guest {} {} is assigned to room {} but only {} room(s) are booked",
                guest.first_name, guest.last_name, guest.room_index + 1, room_count
            )));
        }
        if guest.guest_type == GuestType::Child && guest.age.is_none() {
            return Err(BookingError::ValidationError("Child guests need an age".to_string()));
        }
    }

    for room in 0..room_count {
        let has_adult = guests
            .iter()
            .any(|g| g.room_index == room && g.guest_type == GuestType::Adult);
        if !has_adult {
            return Err(BookingError::ValidationError(format!("Room {} has no adult guest", room + 1)));
        }
    }

    if guests.iter().filter(|g| g.lead).count() > 1 {
        return Err(BookingError::ValidationError("Only one lead guest is allowed".to_string()));
    }

    Ok(())
}
