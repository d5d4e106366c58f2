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

//! Ticket identifiers and check-in codes.
//!
//! A ticket id is `TICK-` followed by 8 uppercase hex characters drawn from
//! 4 random bytes. The check-in code is the ticket id behind a `QR-` prefix;
//! the mapping is invertible, so the attendance path never needs a lookup
//! table to get from a scanned code back to the ticket.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal prefix of every ticket identifier.
pub const TICKET_PREFIX: &str = "TICK-";

/// Literal prefix of every check-in code.
pub const CHECK_IN_PREFIX: &str = "QR-";

/// Number of hex characters following the ticket prefix.
const SUFFIX_LEN: usize = 8;

/// Unique identifier for an issued ticket.
///
/// Always stored case-normalized (uppercase); parsing accepts any case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    /// Samples a fresh candidate id from 4 random bytes.
    ///
    /// Uniqueness is not guaranteed here; [`TicketIssuer::issue`] checks the
    /// candidate against every previously issued id before accepting it.
    fn sample() -> Self {
        let bytes: [u8; 4] = rand::random();
        let mut id = String::with_capacity(TICKET_PREFIX.len() + SUFFIX_LEN);
        id.push_str(TICKET_PREFIX);
        for byte in bytes {
            id.push_str(&format!("{byte:02X}"));
        }
        TicketId(id)
    }

    /// Parses a ticket id, normalizing case.
    ///
    /// Returns `None` unless the input is the ticket prefix followed by
    /// exactly 8 hex characters.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase();
        let suffix = normalized.strip_prefix(TICKET_PREFIX)?;
        if suffix.len() != SUFFIX_LEN || !suffix.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(TicketId(normalized))
    }

    /// Parses a scanned value that may be either a bare ticket id or a
    /// check-in code.
    pub fn from_scan(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let candidate = trimmed
            .strip_prefix(CHECK_IN_PREFIX)
            .or_else(|| {
                // Scanners are not case-preserving; accept a lowercased prefix too.
                let upper = trimmed.get(..CHECK_IN_PREFIX.len())?;
                upper
                    .eq_ignore_ascii_case(CHECK_IN_PREFIX)
                    .then(|| &trimmed[CHECK_IN_PREFIX.len()..])
            })
            .unwrap_or(trimmed);
        Self::parse(candidate)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Value encoded into the participant's scannable artifact.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct CheckInCode(String);

impl CheckInCode {
    /// Derives the check-in code for a ticket. Deterministic and one-to-one.
    pub fn derive(ticket: &TicketId) -> Self {
        CheckInCode(format!("{CHECK_IN_PREFIX}{ticket}"))
    }

    /// Recovers the ticket id the code was derived from.
    pub fn ticket_id(&self) -> TicketId {
        TicketId(self.0[CHECK_IN_PREFIX.len()..].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CheckInCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issues ticket ids that are unique across all registrations.
///
/// The issuer keeps every id it has handed out in a [`DashMap`] and claims a
/// candidate through the entry API, so two concurrent calls can never accept
/// the same id. A collision with a previously issued id is handled by
/// re-sampling, not assumed away.
#[derive(Debug)]
pub struct TicketIssuer {
    issued: DashMap<TicketId, ()>,
}

impl TicketIssuer {
    /// Creates an issuer with no outstanding tickets.
    pub fn new() -> Self {
        Self {
            issued: DashMap::new(),
        }
    }

    /// Issues a fresh, globally unique ticket id.
    pub fn issue(&self) -> TicketId {
        loop {
            let candidate = TicketId::sample();
            match self.issued.entry(candidate.clone()) {
                // Collision with an existing ticket: re-sample.
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    slot.insert(());
                    return candidate;
                }
            }
        }
    }

    /// Returns an id to the pool after a submission failed before any
    /// registration was recorded under it.
    pub fn forget(&self, ticket: &TicketId) {
        self.issued.remove(ticket);
    }

    /// Number of ids issued and still claimed.
    pub fn issued_count(&self) -> usize {
        self.issued.len()
    }
}

impl Default for TicketIssuer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn issued_tickets_match_format() {
        let issuer = TicketIssuer::new();
        let ticket = issuer.issue();
        let raw = ticket.as_str();

        assert!(raw.starts_with(TICKET_PREFIX));
        let suffix = &raw[TICKET_PREFIX.len()..];
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn parse_normalizes_case() {
        let parsed = TicketId::parse("tick-a1b2c3d4").unwrap();
        assert_eq!(parsed.as_str(), "TICK-A1B2C3D4");
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!(TicketId::parse("TICK-XYZ").is_none());
        assert!(TicketId::parse("TICK-A1B2C3D").is_none());
        assert!(TicketId::parse("TICK-A1B2C3D4E").is_none());
        assert!(TicketId::parse("TCKT-A1B2C3D4").is_none());
        assert!(TicketId::parse("").is_none());
    }

    #[test]
    fn check_in_code_round_trips() {
        let ticket = TicketId::parse("TICK-0011AABB").unwrap();
        let code = CheckInCode::derive(&ticket);

        assert_eq!(code.as_str(), "QR-TICK-0011AABB");
        assert_eq!(code.ticket_id(), ticket);
    }

    #[test]
    fn from_scan_accepts_both_forms() {
        let ticket = TicketId::parse("TICK-0011AABB").unwrap();

        assert_eq!(TicketId::from_scan("TICK-0011AABB").unwrap(), ticket);
        assert_eq!(TicketId::from_scan("QR-TICK-0011AABB").unwrap(), ticket);
        assert_eq!(TicketId::from_scan("qr-tick-0011aabb").unwrap(), ticket);
        assert_eq!(TicketId::from_scan("  QR-TICK-0011AABB  ").unwrap(), ticket);
        assert!(TicketId::from_scan("QR-").is_none());
        assert!(TicketId::from_scan("garbage").is_none());
    }

    #[test]
    fn issuer_never_repeats_ids() {
        let issuer = TicketIssuer::new();
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(issuer.issue()));
        }
        assert_eq!(issuer.issued_count(), 1000);
    }

    #[test]
    fn forget_releases_the_id() {
        let issuer = TicketIssuer::new();
        let ticket = issuer.issue();
        assert_eq!(issuer.issued_count(), 1);

        issuer.forget(&ticket);
        assert_eq!(issuer.issued_count(), 0);
    }
}
