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

//! Event records.
//!
//! An event is either `Normal` (participants fill a form, admission consumes
//! an optional capacity slot) or `Merchandise` (participants order sized
//! variants, admission consumes stock). The capacity and stock counters live
//! in the event's [`Inventory`] and are mutated only through its reservation
//! operations.

use crate::base::{EventId, OrganizerId};
use crate::error::RegistrationError;
use crate::inventory::Inventory;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Event kind, deciding which payload a registration carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Normal,
    Merchandise,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Normal => write!(f, "Normal"),
            EventType::Merchandise => write!(f, "Merchandise"),
        }
    }
}

/// Event lifecycle status.
///
/// Transitions move forward only:
/// `Draft` -> `Published` -> `Ongoing` -> `Completed` | `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    Draft,
    Published,
    Ongoing,
    Completed,
    Closed,
}

impl EventStatus {
    /// Whether `next` is a legal forward transition from `self`.
    pub fn allows(self, next: EventStatus) -> bool {
        matches!(
            (self, next),
            (EventStatus::Draft, EventStatus::Published)
                | (EventStatus::Published, EventStatus::Ongoing)
                | (EventStatus::Ongoing, EventStatus::Completed)
                | (EventStatus::Ongoing, EventStatus::Closed)
        )
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventStatus::Draft => "Draft",
            EventStatus::Published => "Published",
            EventStatus::Ongoing => "Ongoing",
            EventStatus::Completed => "Completed",
            EventStatus::Closed => "Closed",
        };
        write!(f, "{name}")
    }
}

/// Key of a merchandise variant: an (item name, size) pair, unique within
/// an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantKey {
    pub item: String,
    pub size: String,
}

impl VariantKey {
    pub fn new(item: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            size: size.into(),
        }
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.item, self.size)
    }
}

/// A purchasable merchandise option with its own price and stock count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub key: VariantKey,
    /// Unit price. Registrations store this price at purchase time.
    pub price: Decimal,
    /// Remaining quantity.
    pub stock: u32,
    /// Optional per-registration purchase limit.
    pub purchase_limit: Option<u32>,
}

impl Variant {
    pub fn new(
        item: impl Into<String>,
        size: impl Into<String>,
        price: Decimal,
        stock: u32,
    ) -> Self {
        Self {
            key: VariantKey::new(item, size),
            price,
            stock,
            purchase_limit: None,
        }
    }

    pub fn with_purchase_limit(mut self, limit: u32) -> Self {
        self.purchase_limit = Some(limit);
        self
    }
}

/// Registration window and event timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Last instant at which submissions are accepted.
    pub deadline: DateTime<Utc>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// An activity a participant can register for.
///
/// The event owns the authoritative capacity/stock counters through its
/// [`Inventory`]; nothing outside the inventory's reserve/release operations
/// touches them.
#[derive(Debug)]
pub struct Event {
    id: EventId,
    name: String,
    organizer: OrganizerId,
    event_type: EventType,
    schedule: Schedule,
    /// Registration fee; zero means the free admission path.
    fee: Decimal,
    status: Mutex<EventStatus>,
    inventory: Inventory,
}

impl Event {
    /// Creates a capacity-limited (or unlimited) `Normal` event.
    pub fn normal(
        id: EventId,
        name: impl Into<String>,
        organizer: OrganizerId,
        schedule: Schedule,
        capacity: Option<u32>,
        fee: Decimal,
    ) -> Self {
        debug_assert!(fee >= Decimal::ZERO, "fee must be non-negative: {fee}");
        Self {
            id,
            name: name.into(),
            organizer,
            event_type: EventType::Normal,
            schedule,
            fee,
            status: Mutex::new(EventStatus::Draft),
            inventory: Inventory::for_capacity(capacity),
        }
    }

    /// Creates a `Merchandise` event backed by variant stock.
    pub fn merchandise(
        id: EventId,
        name: impl Into<String>,
        organizer: OrganizerId,
        schedule: Schedule,
        variants: Vec<Variant>,
        fee: Decimal,
    ) -> Self {
        debug_assert!(fee >= Decimal::ZERO, "fee must be non-negative: {fee}");
        debug_assert!(
            !variants.is_empty(),
            "a merchandise event needs at least one variant"
        );
        Self {
            id,
            name: name.into(),
            organizer,
            event_type: EventType::Merchandise,
            schedule,
            fee,
            status: Mutex::new(EventStatus::Draft),
            inventory: Inventory::for_variants(variants),
        }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn organizer(&self) -> OrganizerId {
        self.organizer
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.schedule.deadline
    }

    pub fn fee(&self) -> Decimal {
        self.fee
    }

    /// True when registrations take the free admission path.
    pub fn is_free(&self) -> bool {
        self.fee.is_zero()
    }

    pub fn status(&self) -> EventStatus {
        *self.status.lock()
    }

    /// Applies a forward lifecycle transition.
    pub(crate) fn transition(&self, next: EventStatus) -> Result<(), RegistrationError> {
        let mut status = self.status.lock();
        if !status.allows(next) {
            return Err(RegistrationError::InvalidState);
        }
        *status = next;
        Ok(())
    }

    /// Marks a freshly created event as accepting registrations.
    pub fn publish(&self) -> Result<(), RegistrationError> {
        self.transition(EventStatus::Published)
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }
}
