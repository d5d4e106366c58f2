// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Error types for registration processing.
//!
//! Every failure is returned to the immediate caller as a typed outcome.
//! The messages distinguish "nothing happened, safe to retry" failures
//! (deadline, capacity, stock) from states the caller must not retry into
//! (an existing active registration, a registration awaiting approval).

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Registration processing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// Referenced event does not exist
    #[error("event not found")]
    EventNotFound,

    /// Referenced registration does not exist
    #[error("registration not found")]
    RegistrationNotFound,

    /// Submission arrived after the registration deadline
    #[error("registration deadline has passed")]
    DeadlinePassed,

    /// Participant already holds a pending or successful registration
    #[error("already registered for this event")]
    AlreadyRegistered,

    /// Capacity-limited event has no slots left
    #[error("event is full")]
    EventFull,

    /// Requested variant is missing or lacks remaining quantity
    #[error("item {item} ({size}) is out of stock")]
    OutOfStock { item: String, size: String },

    /// Requested quantity exceeds the variant's per-registration limit
    #[error("item {item} ({size}) exceeds its purchase limit")]
    PurchaseLimitExceeded { item: String, size: String },

    /// Paid event submission arrived without a payment proof
    #[error("payment proof is required for a paid event")]
    ProofRequired,

    /// Payload kind does not match the event type
    #[error("payload does not match the event type")]
    PayloadMismatch,

    /// Caller does not own the event or registration
    #[error("not authorized for this event")]
    Unauthorized,

    /// Operation is not allowed in the current status
    #[error("operation not allowed in the current state")]
    InvalidState,

    /// Ticket is unknown, malformed, or not eligible for check-in
    #[error("invalid ticket")]
    InvalidTicket,

    /// Ticket was already checked in; carries the original check-in instant
    #[error("ticket already checked in at {at}")]
    AlreadyCheckedIn { at: DateTime<Utc> },
}

impl RegistrationError {
    /// True when the failure left nothing behind and a corrected or later
    /// resubmission may succeed.
    ///
    /// `AlreadyRegistered` and `InvalidState` are excluded: they signal that
    /// a registration already exists and resubmitting would not help.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RegistrationError::EventFull
                | RegistrationError::OutOfStock { .. }
                | RegistrationError::PurchaseLimitExceeded { .. }
                | RegistrationError::ProofRequired
                | RegistrationError::PayloadMismatch
        )
    }
}

#[cfg(test)]
mod tests {
    use super::RegistrationError;

    #[test]
    fn error_display_messages() {
        assert_eq!(RegistrationError::EventNotFound.to_string(), "event not found");
        assert_eq!(
            RegistrationError::RegistrationNotFound.to_string(),
            "registration not found"
        );
        assert_eq!(
            RegistrationError::DeadlinePassed.to_string(),
            "registration deadline has passed"
        );
        assert_eq!(
            RegistrationError::AlreadyRegistered.to_string(),
            "already registered for this event"
        );
        assert_eq!(RegistrationError::EventFull.to_string(), "event is full");
        assert_eq!(
            RegistrationError::OutOfStock {
                item: "Shirt".into(),
                size: "M".into()
            }
            .to_string(),
            "item Shirt (M) is out of stock"
        );
        assert_eq!(
            RegistrationError::PurchaseLimitExceeded {
                item: "Cap".into(),
                size: "One Size".into()
            }
            .to_string(),
            "item Cap (One Size) exceeds its purchase limit"
        );
        assert_eq!(
            RegistrationError::ProofRequired.to_string(),
            "payment proof is required for a paid event"
        );
        assert_eq!(RegistrationError::InvalidTicket.to_string(), "invalid ticket");
    }

    #[test]
    fn errors_are_cloneable() {
        let error = RegistrationError::EventFull;
        let cloned = error.clone();
        assert_eq!(error, cloned);
    }

    #[test]
    fn retryable_classification() {
        assert!(RegistrationError::EventFull.is_retryable());
        assert!(
            RegistrationError::OutOfStock {
                item: "Shirt".into(),
                size: "M".into()
            }
            .is_retryable()
        );
        assert!(!RegistrationError::AlreadyRegistered.is_retryable());
        assert!(!RegistrationError::Unauthorized.is_retryable());
    }
}
