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

//! Registration workflow engine.
//!
//! The [`Engine`] is the central component that admits submissions, drives
//! registrations through the approval lifecycle, and records attendance.
//!
//! # Admission
//!
//! - **Free events**: the capacity slot or stock is reserved at submission
//!   time; on success the registration is born `Successful` with a ticket
//!   and check-in code.
//! - **Paid events**: the submission is parked `Pending` with its payment
//!   proof and **no reservation**; the resource is reserved only when an
//!   organizer approves. Deferring the reservation keeps scarce inventory
//!   from being locked behind unverified payments, at the price of a
//!   possible `OutOfStock`/`EventFull` outcome at approval time, which is
//!   surfaced to the organizer rather than silently approved.
//!
//! # Thread Safety
//!
//! The engine uses [`DashMap`] for events and registrations. Duplicate
//! prevention and ticket uniqueness are entry-API check-and-inserts, the
//! inventory check-and-reserve runs under one mutex per event, and every
//! registration serializes its own transitions, so concurrent submissions
//! for the last unit cannot both succeed.

use crate::base::{EventId, OrganizerId, ParticipantId};
use crate::error::RegistrationError;
use crate::event::{Event, EventStatus, EventType};
use crate::inventory::{ItemRequest, ReserveRequest};
use crate::notify::{NotificationQueue, TicketNotification};
use crate::registration::{
    PurchaseLine, Registration, RegistrationPayload, RegistrationStatus,
};
use crate::ticket::{CheckInCode, TicketId, TicketIssuer};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// What a participant submits for one event.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub event: EventId,
    pub participant: ParticipantId,
    pub details: SubmissionDetails,
    pub team_name: Option<String>,
    /// Reference to an out-of-band payment (screenshot id, UPI reference).
    /// Required whenever the event charges a fee.
    pub payment_proof: Option<String>,
}

/// Event-type specific half of a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionDetails {
    /// Form answers for a `Normal` event.
    Form(BTreeMap<String, String>),
    /// Ordered variant lines for a `Merchandise` event. Unit prices are
    /// stamped by the engine from the event's variants, never taken from
    /// the caller.
    Order(Vec<ItemRequest>),
}

/// Successful result of a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Admitted immediately (free path); the resource is held.
    Confirmed {
        ticket: TicketId,
        check_in_code: CheckInCode,
    },
    /// Parked for organizer approval (paid path); nothing is held yet and
    /// the participant must not resubmit.
    PendingApproval { ticket: TicketId },
}

impl SubmitOutcome {
    pub fn ticket(&self) -> &TicketId {
        match self {
            SubmitOutcome::Confirmed { ticket, .. } => ticket,
            SubmitOutcome::PendingApproval { ticket } => ticket,
        }
    }
}

/// Organizer decision on a pending paid registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

/// Availability snapshot of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Availability {
    /// True when submissions would currently pass the deadline and
    /// resource checks.
    pub is_open: bool,
    pub deadline_passed: bool,
    /// `Normal` events only: capacity limit reached.
    pub is_full: bool,
    /// `Merchandise` events only: every variant is out of stock.
    pub sold_out: bool,
}

/// Registration workflow engine managing events and registrations.
///
/// # Invariants
///
/// - Ticket ids are globally unique across all registrations.
/// - A participant holds at most one `Pending`/`Successful` registration
///   per event.
/// - The units reserved against an event never exceed its capacity or
///   per-variant stock.
/// - Attendance is recorded exactly once per ticket.
pub struct Engine {
    /// Events indexed by event id.
    events: DashMap<EventId, Event>,
    /// Registrations indexed by ticket id.
    registrations: DashMap<TicketId, Arc<Registration>>,
    /// Ticket of the active (`Pending`/`Successful`) registration per
    /// (participant, event) pair. The entry-API insert on this map is the
    /// duplicate-registration gate.
    active: DashMap<(ParticipantId, EventId), TicketId>,
    issuer: TicketIssuer,
    notifications: NotificationQueue,
}

impl Engine {
    /// Creates a new engine with no events or registrations.
    pub fn new() -> Self {
        Engine {
            events: DashMap::new(),
            registrations: DashMap::new(),
            active: DashMap::new(),
            issuer: TicketIssuer::new(),
            notifications: NotificationQueue::new(),
        }
    }

    /// Registers an event with the engine.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::InvalidState`] if the event id is already in
    /// use.
    pub fn add_event(&self, event: Event) -> Result<(), RegistrationError> {
        match self.events.entry(event.id()) {
            Entry::Occupied(_) => Err(RegistrationError::InvalidState),
            Entry::Vacant(slot) => {
                slot.insert(event);
                Ok(())
            }
        }
    }

    /// Processes one registration submission.
    ///
    /// Checks run in order: event exists, deadline not passed, payload
    /// matches the event type, no active registration for the
    /// (participant, event) pair; then the fee decides the path. Free
    /// events reserve the resource now and finalize; paid events require a
    /// payment proof and park the registration `Pending` without touching
    /// inventory.
    ///
    /// A failure after the duplicate gate was claimed releases the claim
    /// before returning, so "nothing happened" failures are always safe to
    /// retry.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::EventNotFound`] - unknown event id.
    /// - [`RegistrationError::DeadlinePassed`] - submitted too late.
    /// - [`RegistrationError::PayloadMismatch`] - form answers for a
    ///   merchandise event, an order for a normal event, or an empty/zero
    ///   quantity order.
    /// - [`RegistrationError::AlreadyRegistered`] - an active registration
    ///   exists for this participant and event.
    /// - [`RegistrationError::EventFull`] / [`RegistrationError::OutOfStock`]
    ///   / [`RegistrationError::PurchaseLimitExceeded`] - free path only;
    ///   the reservation failed and nothing was recorded.
    /// - [`RegistrationError::ProofRequired`] - paid path without a proof.
    pub fn submit(&self, submission: Submission) -> Result<SubmitOutcome, RegistrationError> {
        let event = self
            .events
            .get(&submission.event)
            .ok_or(RegistrationError::EventNotFound)?;

        let now = Utc::now();
        if now > event.deadline() {
            return Err(RegistrationError::DeadlinePassed);
        }

        // Build the reservation request and the stored payload together;
        // the two payload kinds are mutually exclusive per event type.
        let (request, payload) = Self::plan_submission(&event, &submission.details)?;

        // Atomic duplicate gate: claiming the (participant, event) entry
        // and checking for an existing active registration is one step.
        let pair = (submission.participant, submission.event);
        let ticket = self.issuer.issue();
        match self.active.entry(pair) {
            Entry::Occupied(_) => {
                self.issuer.forget(&ticket);
                return Err(RegistrationError::AlreadyRegistered);
            }
            Entry::Vacant(slot) => {
                slot.insert(ticket.clone());
            }
        }

        if !event.is_free() {
            // Paid path: proof required, registration parked, no
            // reservation until an organizer approves.
            let has_proof = submission
                .payment_proof
                .as_deref()
                .is_some_and(|proof| !proof.trim().is_empty());
            if !has_proof {
                self.unwind_claim(&pair, &ticket);
                return Err(RegistrationError::ProofRequired);
            }

            let registration = Arc::new(Registration::pending(
                ticket.clone(),
                submission.participant,
                submission.event,
                payload,
                submission.team_name,
                submission.payment_proof,
                now,
            ));
            self.registrations.insert(ticket.clone(), registration);
            debug!(%ticket, event = %submission.event, "registration parked for approval");
            return Ok(SubmitOutcome::PendingApproval { ticket });
        }

        // Free path: reserve now. On failure the duplicate claim is undone
        // so the participant can retry once units free up.
        if let Err(err) = event.inventory().try_reserve(&ticket, &request) {
            self.unwind_claim(&pair, &ticket);
            return Err(err);
        }

        let check_in_code = CheckInCode::derive(&ticket);
        let registration = Arc::new(Registration::successful(
            ticket.clone(),
            submission.participant,
            submission.event,
            payload,
            submission.team_name,
            check_in_code.clone(),
            now,
        ));
        self.registrations.insert(ticket.clone(), registration);
        self.push_notification(&event, submission.participant, &ticket, &check_in_code);
        debug!(%ticket, event = %submission.event, "registration finalized");

        Ok(SubmitOutcome::Confirmed {
            ticket,
            check_in_code,
        })
    }

    /// Resolves a pending paid registration to success or rejection.
    ///
    /// Approval performs the deferred reservation first; if the resource
    /// ran out since submission, the registration stays `Pending` and the
    /// shortage is surfaced so the organizer sees it explicitly.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::RegistrationNotFound`] /
    ///   [`RegistrationError::EventNotFound`] - either record is missing.
    /// - [`RegistrationError::Unauthorized`] - caller does not own the
    ///   event.
    /// - [`RegistrationError::InvalidState`] - registration is not
    ///   `Pending`.
    /// - [`RegistrationError::EventFull`] / [`RegistrationError::OutOfStock`]
    ///   - approval failed because the resource is gone; nothing changed.
    pub fn resolve(
        &self,
        ticket: &TicketId,
        organizer: OrganizerId,
        decision: Decision,
    ) -> Result<RegistrationStatus, RegistrationError> {
        let registration = self
            .registrations
            .get(ticket)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(RegistrationError::RegistrationNotFound)?;
        let event = self
            .events
            .get(&registration.event())
            .ok_or(RegistrationError::EventNotFound)?;

        if event.organizer() != organizer {
            return Err(RegistrationError::Unauthorized);
        }
        if registration.status() != RegistrationStatus::Pending {
            return Err(RegistrationError::InvalidState);
        }

        match decision {
            Decision::Reject => {
                registration.reject()?;
                // A rejected registration never held a reservation; only
                // the duplicate gate needs to open up again.
                self.active
                    .remove(&(registration.participant(), registration.event()));
                debug!(%ticket, "registration rejected");
                Ok(RegistrationStatus::Rejected)
            }
            Decision::Approve => {
                let request = Self::reservation_for(registration.payload());
                event.inventory().try_reserve(ticket, &request)?;

                let check_in_code = CheckInCode::derive(ticket);
                if let Err(err) = registration.finalize(check_in_code.clone()) {
                    // Lost a race against a concurrent resolve. If the
                    // winner approved, the hold now belongs to them; if the
                    // winner rejected or the participant cancelled, the
                    // reservation taken above must not outlive this call.
                    if registration.status() != RegistrationStatus::Successful {
                        event.inventory().release(ticket);
                    }
                    return Err(err);
                }

                self.push_notification(
                    &event,
                    registration.participant(),
                    ticket,
                    &check_in_code,
                );
                debug!(%ticket, "registration approved");
                Ok(RegistrationStatus::Successful)
            }
        }
    }

    /// Validates a ticket (or scanned check-in code) and records a one-time
    /// attendance, returning the check-in instant.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::InvalidTicket`] - malformed scan, unknown
    ///   ticket, or registration not `Successful`.
    /// - [`RegistrationError::Unauthorized`] - caller does not own the
    ///   ticket's event.
    /// - [`RegistrationError::AlreadyCheckedIn`] - attendance was already
    ///   recorded; carries the original instant.
    pub fn check_in(
        &self,
        scan: &str,
        organizer: OrganizerId,
    ) -> Result<DateTime<Utc>, RegistrationError> {
        let ticket = TicketId::from_scan(scan).ok_or(RegistrationError::InvalidTicket)?;
        let registration = self
            .registrations
            .get(&ticket)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(RegistrationError::InvalidTicket)?;

        // Tickets that never reached `Successful` are not valid entry
        // artifacts, regardless of who asks.
        if registration.status() != RegistrationStatus::Successful {
            return Err(RegistrationError::InvalidTicket);
        }

        let event = self
            .events
            .get(&registration.event())
            .ok_or(RegistrationError::EventNotFound)?;
        if event.organizer() != organizer {
            return Err(RegistrationError::Unauthorized);
        }

        registration.check_in(Utc::now())
    }

    /// Cancels the participant's own registration, releasing any held
    /// reservation and reopening the duplicate gate.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::RegistrationNotFound`] - unknown ticket.
    /// - [`RegistrationError::Unauthorized`] - ticket belongs to another
    ///   participant.
    /// - [`RegistrationError::InvalidState`] - registration already
    ///   terminal.
    pub fn cancel(
        &self,
        ticket: &TicketId,
        participant: ParticipantId,
    ) -> Result<(), RegistrationError> {
        let registration = self
            .registrations
            .get(ticket)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(RegistrationError::RegistrationNotFound)?;
        if registration.participant() != participant {
            return Err(RegistrationError::Unauthorized);
        }

        let prior = registration.cancel()?;
        if prior == RegistrationStatus::Successful {
            if let Some(event) = self.events.get(&registration.event()) {
                event.inventory().release(ticket);
            }
        }
        self.active.remove(&(participant, registration.event()));
        debug!(%ticket, "registration cancelled");
        Ok(())
    }

    /// Applies an owner-checked, forward-only event lifecycle transition.
    ///
    /// Entering `Completed` settles the event's registrations: attended
    /// `Successful` registrations become `Completed` (terminal).
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::EventNotFound`] - unknown event id.
    /// - [`RegistrationError::Unauthorized`] - caller does not own the
    ///   event.
    /// - [`RegistrationError::InvalidState`] - transition is not a legal
    ///   forward step.
    pub fn set_event_status(
        &self,
        id: EventId,
        organizer: OrganizerId,
        next: EventStatus,
    ) -> Result<(), RegistrationError> {
        let event = self.events.get(&id).ok_or(RegistrationError::EventNotFound)?;
        if event.organizer() != organizer {
            return Err(RegistrationError::Unauthorized);
        }
        event.transition(next)?;

        if next == EventStatus::Completed {
            for registration in self.registrations_for_event(id) {
                if registration.complete() {
                    self.active.remove(&(registration.participant(), id));
                }
            }
        }
        Ok(())
    }

    /// Availability snapshot for one event.
    ///
    /// Fullness and stock exhaustion are two independent predicates; the
    /// one that does not apply to the event's type reports `false`.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::EventNotFound`] if the event does not exist.
    pub fn availability(&self, id: EventId) -> Result<Availability, RegistrationError> {
        let event = self.events.get(&id).ok_or(RegistrationError::EventNotFound)?;
        let deadline_passed = Utc::now() > event.deadline();
        let is_full = event.inventory().is_full();
        let sold_out = event.inventory().is_sold_out();
        let has_units = match event.event_type() {
            EventType::Normal => !is_full,
            EventType::Merchandise => !sold_out,
        };
        Ok(Availability {
            is_open: !deadline_passed && has_units,
            deadline_passed,
            is_full,
            sold_out,
        })
    }

    /// Pending paid registrations across the organizer's events, oldest
    /// first.
    pub fn pending_approvals(&self, organizer: OrganizerId) -> Vec<Arc<Registration>> {
        let mut pending: Vec<Arc<Registration>> = self
            .registrations
            .iter()
            .filter(|entry| entry.value().status() == RegistrationStatus::Pending)
            .filter(|entry| {
                self.events
                    .get(&entry.value().event())
                    .is_some_and(|event| event.organizer() == organizer)
            })
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        pending.sort_by_key(|registration| registration.registered_at());
        pending
    }

    /// Revenue collected by one event: fee per admitted head for `Normal`,
    /// sum of purchase-line totals for `Merchandise`. Counts `Successful`
    /// and `Completed` registrations.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::EventNotFound`] if the event does not exist.
    pub fn revenue(&self, id: EventId) -> Result<Decimal, RegistrationError> {
        let event = self.events.get(&id).ok_or(RegistrationError::EventNotFound)?;
        let admitted = self
            .registrations_for_event(id)
            .into_iter()
            .filter(|registration| {
                matches!(
                    registration.status(),
                    RegistrationStatus::Successful | RegistrationStatus::Completed
                )
            });

        let total = match event.event_type() {
            EventType::Normal => event.fee() * Decimal::from(admitted.count() as u64),
            EventType::Merchandise => admitted
                .map(|registration| registration.payload().order_total())
                .sum(),
        };
        Ok(total)
    }

    /// Retrieves an event by id.
    pub fn event(&self, id: &EventId) -> Option<dashmap::mapref::one::Ref<'_, EventId, Event>> {
        self.events.get(id)
    }

    /// Retrieves a registration by ticket id.
    pub fn registration(&self, ticket: &TicketId) -> Option<Arc<Registration>> {
        self.registrations
            .get(ticket)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// All registrations recorded against one event, in no particular
    /// order.
    pub fn registrations_for_event(&self, id: EventId) -> Vec<Arc<Registration>> {
        self.registrations
            .iter()
            .filter(|entry| entry.value().event() == id)
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// The finalize-notification outbox.
    pub fn notifications(&self) -> &NotificationQueue {
        &self.notifications
    }

    /// Number of registrations ever recorded.
    pub fn registration_count(&self) -> usize {
        self.registrations.len()
    }

    /// Maps submission details onto a reservation request and the payload
    /// to store, stamping purchase-line prices from the event's variants.
    fn plan_submission(
        event: &Event,
        details: &SubmissionDetails,
    ) -> Result<(ReserveRequest, RegistrationPayload), RegistrationError> {
        match (event.event_type(), details) {
            (EventType::Normal, SubmissionDetails::Form(answers)) => Ok((
                ReserveRequest::Slot,
                RegistrationPayload::Form(answers.clone()),
            )),
            (EventType::Merchandise, SubmissionDetails::Order(lines)) => {
                if lines.is_empty() || lines.iter().any(|line| line.quantity == 0) {
                    return Err(RegistrationError::PayloadMismatch);
                }
                let mut purchase = Vec::with_capacity(lines.len());
                for line in lines {
                    let unit_price = event.inventory().unit_price(&line.key).ok_or_else(|| {
                        RegistrationError::OutOfStock {
                            item: line.key.item.clone(),
                            size: line.key.size.clone(),
                        }
                    })?;
                    purchase.push(PurchaseLine {
                        key: line.key.clone(),
                        quantity: line.quantity,
                        unit_price,
                    });
                }
                Ok((
                    ReserveRequest::Items(lines.clone()),
                    RegistrationPayload::Purchase(purchase),
                ))
            }
            _ => Err(RegistrationError::PayloadMismatch),
        }
    }

    /// Reservation request matching a stored payload, used when approval
    /// performs the deferred reservation.
    fn reservation_for(payload: &RegistrationPayload) -> ReserveRequest {
        match payload {
            RegistrationPayload::Form(_) => ReserveRequest::Slot,
            RegistrationPayload::Purchase(lines) => ReserveRequest::Items(
                lines
                    .iter()
                    .map(|line| ItemRequest::new(line.key.clone(), line.quantity))
                    .collect(),
            ),
        }
    }

    /// Undoes the duplicate-gate claim after a submission failed before a
    /// registration was recorded; inventory was either never touched or
    /// already released by the caller.
    fn unwind_claim(&self, pair: &(ParticipantId, EventId), ticket: &TicketId) {
        self.active.remove(pair);
        self.issuer.forget(ticket);
    }

    fn push_notification(
        &self,
        event: &Event,
        participant: ParticipantId,
        ticket: &TicketId,
        check_in_code: &CheckInCode,
    ) {
        self.notifications.push(TicketNotification {
            participant,
            event: event.id(),
            event_name: event.name().to_string(),
            event_type: event.event_type(),
            ticket: ticket.clone(),
            check_in_code: check_in_code.clone(),
        });
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
