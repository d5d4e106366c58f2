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

//! # EventDesk
//!
//! This library provides a registration and fulfillment engine for events
//! that may be capacity-limited, backed by merchandise stock, and optionally
//! fee-gated behind manual payment approval.
//!
//! ## Core Components
//!
//! - [`Engine`]: Central workflow processor admitting submissions and
//!   driving registrations through approval, cancellation, and check-in
//! - [`Inventory`]: Per-event ledger with atomic reserve/release of capacity
//!   slots and variant stock
//! - [`TicketIssuer`]: Collision-checked ticket ids and their derived
//!   check-in codes
//! - [`Registration`]: A participant's claim on an event, with a guarded
//!   status and attendance state machine
//! - [`RegistrationError`]: Typed outcomes for every admission and lifecycle
//!   failure
//!
//! ## Example
//!
//! ```
//! use chrono::{Duration, Utc};
//! use eventdesk_rs::{
//!     Engine, Event, EventId, OrganizerId, ParticipantId, Schedule, Submission,
//!     SubmissionDetails, SubmitOutcome,
//! };
//! use rust_decimal::Decimal;
//! use std::collections::BTreeMap;
//!
//! let engine = Engine::new();
//! let now = Utc::now();
//!
//! engine
//!     .add_event(Event::normal(
//!         EventId(1),
//!         "Rust Meetup",
//!         OrganizerId(7),
//!         Schedule {
//!             deadline: now + Duration::hours(1),
//!             starts_at: now + Duration::hours(2),
//!             ends_at: now + Duration::hours(4),
//!         },
//!         Some(100),
//!         Decimal::ZERO,
//!     ))
//!     .unwrap();
//!
//! let outcome = engine
//!     .submit(Submission {
//!         event: EventId(1),
//!         participant: ParticipantId(42),
//!         details: SubmissionDetails::Form(BTreeMap::new()),
//!         team_name: None,
//!         payment_proof: None,
//!     })
//!     .unwrap();
//!
//! // Free event: admitted immediately, ticket and check-in code issued.
//! assert!(matches!(outcome, SubmitOutcome::Confirmed { .. }));
//! ```
//!
//! ## Thread Safety
//!
//! All engine operations take `&self` and are safe to call from concurrent
//! request handlers. Availability checks and counter updates are single
//! atomic steps, so overlapping submissions for the last capacity slot or
//! stock unit resolve to exactly one winner.

pub mod error;
pub mod event;
pub mod inventory;
pub mod notify;
pub mod registration;
pub mod report;
mod base;
mod engine;
mod ticket;

pub use base::{EventId, OrganizerId, ParticipantId};
pub use engine::{Availability, Decision, Engine, SubmitOutcome, Submission, SubmissionDetails};
pub use error::RegistrationError;
pub use event::{Event, EventStatus, EventType, Schedule, Variant, VariantKey};
pub use inventory::{Inventory, ItemRequest, ReserveRequest};
pub use notify::{NotificationQueue, NotificationSink, TicketNotification};
pub use registration::{PurchaseLine, Registration, RegistrationPayload, RegistrationStatus};
pub use report::{Contact, EmptyDirectory, ParticipantDirectory, ReportRow};
pub use ticket::{CHECK_IN_PREFIX, CheckInCode, TICKET_PREFIX, TicketId, TicketIssuer};
