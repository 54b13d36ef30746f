//! Input validation for API requests.
//!
//! Guard checks live here as explicit functions; every handler calls the
//! ones relevant to its operation before touching the store. The gateway
//! runs the same checks before forwarding.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use super::error::ApiError;

lazy_static! {
    /// Regex for validating email addresses
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9][-A-Za-z0-9]*(\.[A-Za-z0-9][-A-Za-z0-9]*)*\.[A-Za-z]{2,}$"
    ).unwrap();
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.trim().is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate a user or item name
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name must not be blank".to_string());
    }

    if name.len() > 255 {
        return Err("Name is too long (max 255 characters)".to_string());
    }

    Ok(())
}

/// Validate an item or request description
pub fn validate_description(description: &str) -> Result<(), String> {
    if description.trim().is_empty() {
        return Err("Description must not be blank".to_string());
    }

    if description.len() > 1000 {
        return Err("Description is too long (max 1000 characters)".to_string());
    }

    Ok(())
}

/// Validate a comment text
pub fn validate_comment_text(text: &str) -> Result<(), String> {
    if text.trim().is_empty() {
        return Err("Comment text must not be blank".to_string());
    }

    if text.len() > 2000 {
        return Err("Comment text is too long (max 2000 characters)".to_string());
    }

    Ok(())
}

/// Validate a booking time window against the current time.
/// The window must be non-degenerate and lie entirely in the future.
pub fn validate_booking_window(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), String> {
    if start < now {
        return Err("Booking start must not be in the past".to_string());
    }

    if end < now {
        return Err("Booking end must not be in the past".to_string());
    }

    if start >= end {
        return Err("Booking start must be before its end".to_string());
    }

    Ok(())
}

/// Pagination query parameters, shared by every paginated endpoint.
/// `from` is a zero-based row offset, `size` the page size.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub from: i64,
    #[serde(default = "default_page_size")]
    pub size: i64,
}

fn default_page_size() -> i64 {
    10
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            from: 0,
            size: default_page_size(),
        }
    }
}

impl PageParams {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.from < 0 {
            return Err(ApiError::validation("Pagination 'from' must not be negative"));
        }
        if self.size <= 0 {
            return Err(ApiError::validation("Pagination 'size' must be positive"));
        }
        Ok(())
    }

    pub fn limit(&self) -> i64 {
        self.size
    }

    pub fn offset(&self) -> i64 {
        self.from
    }
}
