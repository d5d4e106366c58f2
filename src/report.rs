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

//! Participant reports.
//!
//! One row per registration, exportable as CSV for organizers. Names and
//! emails come from the identity collaborator through the
//! [`ParticipantDirectory`] seam; the engine itself only knows participant
//! ids.

use crate::base::{EventId, OrganizerId, ParticipantId};
use crate::engine::Engine;
use crate::error::RegistrationError;
use crate::registration::RegistrationStatus;
use crate::ticket::TicketId;
use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::io::Write;

/// Contact details supplied by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub name: String,
    pub email: String,
}

/// Resolves participant ids to contact details.
pub trait ParticipantDirectory {
    fn contact(&self, participant: ParticipantId) -> Option<Contact>;
}

/// Directory that knows nobody; rows fall back to placeholder contacts.
#[derive(Debug, Default)]
pub struct EmptyDirectory;

impl ParticipantDirectory for EmptyDirectory {
    fn contact(&self, _participant: ParticipantId) -> Option<Contact> {
        None
    }
}

/// One report row.
///
/// `team` is available to programmatic consumers (dashboards, team stats)
/// but stays out of the CSV export, whose columns are fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub name: String,
    pub email: String,
    pub registered_at: DateTime<Utc>,
    pub ticket: TicketId,
    pub status: RegistrationStatus,
    /// Form answers or purchased items, flattened to one line.
    pub summary: String,
    pub team: String,
    pub attended: bool,
    pub checked_in_at: Option<DateTime<Utc>>,
}

impl Serialize for ReportRow {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut row = serializer.serialize_struct("ReportRow", 8)?;
        row.serialize_field("Name", &self.name)?;
        row.serialize_field("Email", &self.email)?;
        row.serialize_field(
            "Registration Date",
            &self.registered_at.format("%Y-%m-%d").to_string(),
        )?;
        row.serialize_field("Ticket ID", &self.ticket)?;
        row.serialize_field("Status", &self.status.to_string())?;
        row.serialize_field("Custom Responses/Items", &self.summary)?;
        row.serialize_field("Attended", if self.attended { "YES" } else { "NO" })?;
        let checked_in = match self.checked_in_at {
            Some(at) => at.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => "N/A".to_string(),
        };
        row.serialize_field("Check-in Time", &checked_in)?;
        row.end()
    }
}

/// Builds the participant report for an organizer's event, newest
/// registration first.
///
/// # Errors
///
/// - [`RegistrationError::EventNotFound`] - unknown event id.
/// - [`RegistrationError::Unauthorized`] - caller does not own the event.
pub fn participant_report(
    engine: &Engine,
    event_id: EventId,
    organizer: OrganizerId,
    directory: &dyn ParticipantDirectory,
) -> Result<Vec<ReportRow>, RegistrationError> {
    {
        let event = engine
            .event(&event_id)
            .ok_or(RegistrationError::EventNotFound)?;
        if event.organizer() != organizer {
            return Err(RegistrationError::Unauthorized);
        }
    }

    let mut registrations = engine.registrations_for_event(event_id);
    registrations.sort_by_key(|registration| std::cmp::Reverse(registration.registered_at()));

    let rows = registrations
        .into_iter()
        .map(|registration| {
            let contact = directory.contact(registration.participant()).unwrap_or(Contact {
                name: format!("Participant {}", registration.participant()),
                email: "N/A".to_string(),
            });
            ReportRow {
                name: contact.name,
                email: contact.email,
                registered_at: registration.registered_at(),
                ticket: registration.ticket().clone(),
                status: registration.status(),
                summary: registration.payload().summary(),
                team: registration
                    .team_name()
                    .unwrap_or("Individual")
                    .to_string(),
                attended: registration.attended(),
                checked_in_at: registration.attended_at(),
            }
        })
        .collect();
    Ok(rows)
}

/// Writes report rows as CSV.
///
/// Columns: `Name, Email, Registration Date, Ticket ID, Status,
/// Custom Responses/Items, Attended, Check-in Time`.
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_report<W: Write>(rows: &[ReportRow], writer: W) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
