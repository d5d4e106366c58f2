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

//! Registration records.
//!
//! Implemented State Machine
//
//  Pending ──approve──► Successful ──event completes──► Completed
//     │                      │
//     │                      └──cancel──► Cancelled (+ reservation released)
//     ├──reject──► Rejected
//     └──cancel──► Cancelled
//
//! Free-path registrations are born `Successful`. All transitions and the
//! attendance write go through the record's mutex, so concurrent callers
//! racing on the same registration serialize and exactly one of them wins.

use crate::base::{EventId, ParticipantId};
use crate::error::RegistrationError;
use crate::event::VariantKey;
use crate::ticket::{CheckInCode, TicketId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// Registration lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
pub enum RegistrationStatus {
    /// Awaiting an organizer's payment decision; no resource held yet.
    Pending,
    /// Admitted; holds a capacity slot or stock and owns a check-in code.
    Successful,
    Rejected,
    Cancelled,
    Completed,
}

impl RegistrationStatus {
    /// Terminal statuses no longer block a fresh submission.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RegistrationStatus::Rejected
                | RegistrationStatus::Cancelled
                | RegistrationStatus::Completed
        )
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegistrationStatus::Pending => "Pending",
            RegistrationStatus::Successful => "Successful",
            RegistrationStatus::Rejected => "Rejected",
            RegistrationStatus::Cancelled => "Cancelled",
            RegistrationStatus::Completed => "Completed",
        };
        write!(f, "{name}")
    }
}

/// One purchased merchandise line with the unit price locked in at
/// submission time.
#[derive(Debug, Clone, PartialEq, serde::Serialize, Deserialize)]
pub struct PurchaseLine {
    pub key: VariantKey,
    pub quantity: u32,
    /// Variant price at the moment of purchase; later price edits to the
    /// event do not change what this registration owes.
    pub unit_price: Decimal,
}

impl PurchaseLine {
    /// Line total: unit price times quantity.
    pub fn total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// What the participant submitted; the two kinds are mutually exclusive
/// per registration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, Deserialize)]
pub enum RegistrationPayload {
    /// Free-form form answers of a `Normal` event.
    Form(BTreeMap<String, String>),
    /// Purchased variant lines of a `Merchandise` event.
    Purchase(Vec<PurchaseLine>),
}

impl RegistrationPayload {
    /// One-line human-readable summary for reports.
    pub fn summary(&self) -> String {
        match self {
            RegistrationPayload::Form(answers) => answers
                .iter()
                .map(|(question, answer)| format!("{question}={answer}"))
                .collect::<Vec<_>>()
                .join("; "),
            RegistrationPayload::Purchase(lines) => lines
                .iter()
                .map(|line| format!("{} x{}", line.key, line.quantity))
                .collect::<Vec<_>>()
                .join("; "),
        }
    }

    /// Total owed across purchase lines; zero for form payloads.
    pub fn order_total(&self) -> Decimal {
        match self {
            RegistrationPayload::Form(_) => Decimal::ZERO,
            RegistrationPayload::Purchase(lines) => lines.iter().map(PurchaseLine::total).sum(),
        }
    }
}

#[derive(Debug)]
struct RegistrationState {
    status: RegistrationStatus,
    /// Present only once the registration is `Successful`.
    check_in_code: Option<CheckInCode>,
    attended: bool,
    attended_at: Option<DateTime<Utc>>,
}

/// One participant's claim against one event.
///
/// Created by the workflow engine at submission time, mutated by the payment
/// approval path and the attendance tracker, never deleted: a registration
/// only ever reaches a terminal status.
#[derive(Debug)]
pub struct Registration {
    ticket: TicketId,
    participant: ParticipantId,
    event: EventId,
    payload: RegistrationPayload,
    team_name: Option<String>,
    payment_proof: Option<String>,
    registered_at: DateTime<Utc>,
    inner: Mutex<RegistrationState>,
}

impl Registration {
    /// Creates a paid-path registration awaiting approval.
    pub(crate) fn pending(
        ticket: TicketId,
        participant: ParticipantId,
        event: EventId,
        payload: RegistrationPayload,
        team_name: Option<String>,
        payment_proof: Option<String>,
        registered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            ticket,
            participant,
            event,
            payload,
            team_name,
            payment_proof,
            registered_at,
            inner: Mutex::new(RegistrationState {
                status: RegistrationStatus::Pending,
                check_in_code: None,
                attended: false,
                attended_at: None,
            }),
        }
    }

    /// Creates a free-path registration that is admitted immediately.
    pub(crate) fn successful(
        ticket: TicketId,
        participant: ParticipantId,
        event: EventId,
        payload: RegistrationPayload,
        team_name: Option<String>,
        check_in_code: CheckInCode,
        registered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            ticket,
            participant,
            event,
            payload,
            team_name,
            payment_proof: None,
            registered_at,
            inner: Mutex::new(RegistrationState {
                status: RegistrationStatus::Successful,
                check_in_code: Some(check_in_code),
                attended: false,
                attended_at: None,
            }),
        }
    }

    pub fn ticket(&self) -> &TicketId {
        &self.ticket
    }

    pub fn participant(&self) -> ParticipantId {
        self.participant
    }

    pub fn event(&self) -> EventId {
        self.event
    }

    pub fn payload(&self) -> &RegistrationPayload {
        &self.payload
    }

    pub fn team_name(&self) -> Option<&str> {
        self.team_name.as_deref()
    }

    pub fn payment_proof(&self) -> Option<&str> {
        self.payment_proof.as_deref()
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    pub fn status(&self) -> RegistrationStatus {
        self.inner.lock().status
    }

    pub fn check_in_code(&self) -> Option<CheckInCode> {
        self.inner.lock().check_in_code.clone()
    }

    pub fn attended(&self) -> bool {
        self.inner.lock().attended
    }

    pub fn attended_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().attended_at
    }

    /// `Pending` -> `Successful`, attaching the check-in code.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::InvalidState`] unless currently `Pending`; a
    /// caller losing an approval race observes this instead of applying a
    /// second transition.
    pub(crate) fn finalize(&self, code: CheckInCode) -> Result<(), RegistrationError> {
        let mut state = self.inner.lock();
        if state.status != RegistrationStatus::Pending {
            return Err(RegistrationError::InvalidState);
        }
        state.status = RegistrationStatus::Successful;
        state.check_in_code = Some(code);
        Ok(())
    }

    /// `Pending` -> `Rejected`.
    pub(crate) fn reject(&self) -> Result<(), RegistrationError> {
        let mut state = self.inner.lock();
        if state.status != RegistrationStatus::Pending {
            return Err(RegistrationError::InvalidState);
        }
        state.status = RegistrationStatus::Rejected;
        Ok(())
    }

    /// `Pending` | `Successful` -> `Cancelled`; returns the prior status so
    /// the caller knows whether a reservation must be released.
    pub(crate) fn cancel(&self) -> Result<RegistrationStatus, RegistrationError> {
        let mut state = self.inner.lock();
        let prior = state.status;
        if prior.is_terminal() {
            return Err(RegistrationError::InvalidState);
        }
        state.status = RegistrationStatus::Cancelled;
        Ok(prior)
    }

    /// `Successful` + attended -> `Completed`; returns whether it applied.
    pub(crate) fn complete(&self) -> bool {
        let mut state = self.inner.lock();
        if state.status == RegistrationStatus::Successful && state.attended {
            state.status = RegistrationStatus::Completed;
            true
        } else {
            false
        }
    }

    /// Records attendance exactly once.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::InvalidTicket`] - status is not `Successful`.
    /// - [`RegistrationError::AlreadyCheckedIn`] - attendance was already
    ///   recorded; carries the original check-in instant.
    pub(crate) fn check_in(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, RegistrationError> {
        let mut state = self.inner.lock();
        if state.status != RegistrationStatus::Successful {
            return Err(RegistrationError::InvalidTicket);
        }
        if let Some(at) = state.attended_at {
            return Err(RegistrationError::AlreadyCheckedIn { at });
        }
        state.attended = true;
        state.attended_at = Some(now);
        Ok(now)
    }
}

impl Serialize for Registration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let state = self.inner.lock();
        let mut record = serializer.serialize_struct("Registration", 9)?;
        record.serialize_field("ticket", &self.ticket)?;
        record.serialize_field("participant", &self.participant)?;
        record.serialize_field("event", &self.event)?;
        record.serialize_field("status", &state.status)?;
        record.serialize_field("team_name", &self.team_name)?;
        record.serialize_field("registered_at", &self.registered_at)?;
        record.serialize_field("check_in_code", &state.check_in_code)?;
        record.serialize_field("attended", &state.attended)?;
        record.serialize_field("attended_at", &state.attended_at)?;
        record.end()
    }
}
