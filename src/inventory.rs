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

//! Inventory ledger.
//!
//! Tracks remaining capacity for capacity-limited events and remaining
//! quantity per merchandise variant, and guarantees the sum of reserved
//! units never exceeds the declared limit under concurrent callers.
//!
//! The availability check and the counter update happen under one mutex,
//! so there is no read-then-write gap: two concurrent reservations for the
//! last unit cannot both observe it as available.

use crate::error::RegistrationError;
use crate::event::{Variant, VariantKey};
use crate::ticket::TicketId;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One requested merchandise line: a variant key and a quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRequest {
    pub key: VariantKey,
    pub quantity: u32,
}

impl ItemRequest {
    pub fn new(key: VariantKey, quantity: u32) -> Self {
        Self { key, quantity }
    }
}

/// What a reservation consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveRequest {
    /// One capacity slot of a `Normal` event.
    Slot,
    /// A list of merchandise lines, reserved all-or-nothing.
    Items(Vec<ItemRequest>),
}

#[derive(Debug)]
struct InventoryState {
    /// Capacity limit for `Normal` events; `None` means unlimited.
    capacity: Option<u32>,
    /// Slots currently reserved against the capacity limit.
    reserved: u32,
    /// Variant stock for `Merchandise` events, keyed by (item, size).
    variants: HashMap<VariantKey, Variant>,
    /// Declared variant order, for listings and reports.
    order: Vec<VariantKey>,
    /// Outstanding reservations keyed by ticket id.
    ///
    /// Keying holds by ticket makes `try_reserve` idempotent per ticket and
    /// `release` idempotent against double-release: a hold is created at
    /// most once and reversed at most once.
    holds: HashMap<TicketId, ReserveRequest>,
}

impl InventoryState {
    fn assert_invariants(&self) {
        if let Some(limit) = self.capacity {
            debug_assert!(
                self.reserved <= limit,
                "Invariant violated: reserved {} exceeds capacity {}",
                self.reserved,
                limit
            );
        }
    }
}

/// Per-event inventory with atomic reserve/release operations.
#[derive(Debug)]
pub struct Inventory {
    inner: Mutex<InventoryState>,
}

impl Inventory {
    /// Inventory for a `Normal` event: an optional capacity limit.
    pub fn for_capacity(capacity: Option<u32>) -> Self {
        Self {
            inner: Mutex::new(InventoryState {
                capacity,
                reserved: 0,
                variants: HashMap::new(),
                order: Vec::new(),
                holds: HashMap::new(),
            }),
        }
    }

    /// Inventory for a `Merchandise` event: per-variant stock.
    pub fn for_variants(variants: Vec<Variant>) -> Self {
        let order: Vec<VariantKey> = variants.iter().map(|v| v.key.clone()).collect();
        let variants = variants.into_iter().map(|v| (v.key.clone(), v)).collect();
        Self {
            inner: Mutex::new(InventoryState {
                capacity: None,
                reserved: 0,
                variants,
                order,
                holds: HashMap::new(),
            }),
        }
    }

    /// Atomically checks availability and reserves the requested units.
    ///
    /// For [`ReserveRequest::Slot`] this succeeds iff the reserved count is
    /// below the capacity limit (or no limit is configured). For
    /// [`ReserveRequest::Items`] every requested line is validated before
    /// any stock is touched; either all lines are decremented together or
    /// none are.
    ///
    /// A ticket that already holds a reservation gets `Ok` without a second
    /// decrement, so a racing caller retrying the same finalization cannot
    /// double-reserve.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::EventFull`] - no capacity slot left.
    /// - [`RegistrationError::OutOfStock`] - a line names an unknown variant
    ///   or asks for more than its remaining quantity.
    /// - [`RegistrationError::PurchaseLimitExceeded`] - a line exceeds the
    ///   variant's per-registration limit.
    pub fn try_reserve(
        &self,
        ticket: &TicketId,
        request: &ReserveRequest,
    ) -> Result<(), RegistrationError> {
        let mut state = self.inner.lock();

        if state.holds.contains_key(ticket) {
            return Ok(());
        }

        match request {
            ReserveRequest::Slot => {
                if let Some(limit) = state.capacity {
                    if state.reserved >= limit {
                        return Err(RegistrationError::EventFull);
                    }
                }
                state.reserved += 1;
            }
            ReserveRequest::Items(lines) => {
                // First pass: validate every line while holding the lock.
                for line in lines {
                    debug_assert!(line.quantity > 0, "zero-quantity line reached the ledger");
                    let variant = state.variants.get(&line.key).ok_or_else(|| {
                        RegistrationError::OutOfStock {
                            item: line.key.item.clone(),
                            size: line.key.size.clone(),
                        }
                    })?;
                    if let Some(limit) = variant.purchase_limit {
                        if line.quantity > limit {
                            return Err(RegistrationError::PurchaseLimitExceeded {
                                item: line.key.item.clone(),
                                size: line.key.size.clone(),
                            });
                        }
                    }
                    if variant.stock < line.quantity {
                        return Err(RegistrationError::OutOfStock {
                            item: line.key.item.clone(),
                            size: line.key.size.clone(),
                        });
                    }
                }
                // Second pass: every line validated, decrement together.
                for line in lines {
                    state.variants.get_mut(&line.key).unwrap().stock -= line.quantity;
                }
            }
        }

        state.holds.insert(ticket.clone(), request.clone());
        state.assert_invariants();
        Ok(())
    }

    /// Reverses the reservation held under `ticket`, if any.
    ///
    /// Idempotent: releasing a ticket without an outstanding hold is a
    /// no-op, so a double-release can never inflate stock.
    pub fn release(&self, ticket: &TicketId) {
        let mut state = self.inner.lock();
        let Some(held) = state.holds.remove(ticket) else {
            return;
        };

        match held {
            ReserveRequest::Slot => {
                state.reserved = state.reserved.saturating_sub(1);
            }
            ReserveRequest::Items(lines) => {
                for line in lines {
                    if let Some(variant) = state.variants.get_mut(&line.key) {
                        variant.stock += line.quantity;
                    }
                }
            }
        }
        state.assert_invariants();
    }

    /// Whether `ticket` currently holds a reservation.
    pub fn holds(&self, ticket: &TicketId) -> bool {
        self.inner.lock().holds.contains_key(ticket)
    }

    /// `Normal`-event fullness: a capacity limit exists and is exhausted.
    ///
    /// Independent from [`Inventory::is_sold_out`]; the two predicates are
    /// never inferred from one another.
    pub fn is_full(&self) -> bool {
        let state = self.inner.lock();
        match state.capacity {
            Some(limit) => state.reserved >= limit,
            None => false,
        }
    }

    /// `Merchandise`-event exhaustion: variants exist and none has stock.
    pub fn is_sold_out(&self) -> bool {
        let state = self.inner.lock();
        !state.variants.is_empty() && state.variants.values().all(|v| v.stock == 0)
    }

    /// Slots still available, or `None` when the event is unlimited.
    pub fn remaining_capacity(&self) -> Option<u32> {
        let state = self.inner.lock();
        state.capacity.map(|limit| limit.saturating_sub(state.reserved))
    }

    /// Slots currently reserved.
    pub fn reserved(&self) -> u32 {
        self.inner.lock().reserved
    }

    /// Remaining quantity of one variant, or `None` if the key is unknown.
    pub fn variant_stock(&self, key: &VariantKey) -> Option<u32> {
        self.inner.lock().variants.get(key).map(|v| v.stock)
    }

    /// Unit price of one variant, or `None` if the key is unknown.
    pub fn unit_price(&self, key: &VariantKey) -> Option<Decimal> {
        self.inner.lock().variants.get(key).map(|v| v.price)
    }

    /// Snapshot of all variants in their declared order.
    pub fn variants(&self) -> Vec<Variant> {
        let state = self.inner.lock();
        state
            .order
            .iter()
            .filter_map(|key| state.variants.get(key).cloned())
            .collect()
    }
}
