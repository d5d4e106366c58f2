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

use chrono::{Duration, Utc};
use clap::Parser;
use csv::{ReaderBuilder, Trim};
use eventdesk_rs::{
    Decision, EmptyDirectory, Engine, Event, EventId, OrganizerId, ParticipantId, Schedule,
    Submission, SubmissionDetails,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::process;
use tracing::debug;

/// Event id and organizer id used for the ad-hoc event the CLI drives.
const EVENT: EventId = EventId(1);
const ORGANIZER: OrganizerId = OrganizerId(1);

/// EventDesk - Process registration CSV files
///
/// Builds a single event from the command-line options, streams submissions
/// from a CSV file through the registration engine, and prints the
/// participant report to stdout.
#[derive(Parser, Debug)]
#[command(name = "eventdesk-rs")]
#[command(about = "A registration engine that processes submission CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with submissions
    ///
    /// Expected format: participant,team,proof,answers
    /// Example: cargo run -- submissions.csv > report.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Capacity limit of the event; omit for unlimited
    #[arg(long)]
    capacity: Option<u32>,

    /// Registration fee; a non-zero fee parks submissions for approval
    #[arg(long, default_value = "0")]
    fee: Decimal,

    /// Approve all pending paid registrations after ingest
    #[arg(long)]
    approve_all: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args = Args::parse();

    // Open input file
    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let engine = build_engine(args.capacity, args.fee);

    // Process submissions from CSV
    if let Err(e) = process_submissions(BufReader::new(file), &engine) {
        eprintln!("Error processing submissions: {}", e);
        process::exit(1);
    }

    // Resolve the paid queue if asked to
    if args.approve_all {
        for registration in engine.pending_approvals(ORGANIZER) {
            if let Err(e) = engine.resolve(registration.ticket(), ORGANIZER, Decision::Approve) {
                eprintln!("Skipping approval of {}: {}", registration.ticket(), e);
            }
        }
    }

    // Write the participant report to stdout
    let rows = match eventdesk_rs::report::participant_report(
        &engine,
        EVENT,
        ORGANIZER,
        &EmptyDirectory,
    ) {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("Error building report: {}", e);
            process::exit(1);
        }
    };
    if let Err(e) = eventdesk_rs::report::write_report(&rows, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Engine preloaded with the one event this run registers against.
fn build_engine(capacity: Option<u32>, fee: Decimal) -> Engine {
    let engine = Engine::new();
    let now = Utc::now();
    let event = Event::normal(
        EVENT,
        "EventDesk CLI Run",
        ORGANIZER,
        Schedule {
            deadline: now + Duration::hours(1),
            starts_at: now + Duration::hours(2),
            ends_at: now + Duration::hours(4),
        },
        capacity,
        fee,
    );
    event.publish().expect("fresh event publishes");
    engine.add_event(event).expect("engine starts empty");
    engine
}

/// Raw CSV record matching the input format.
///
/// Fields: `participant, team, proof, answers`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    participant: u32,
    team: Option<String>,
    proof: Option<String>,
    answers: Option<String>,
}

impl CsvRecord {
    /// Converts a CSV record into a submission.
    ///
    /// The `answers` field holds `key=value` pairs separated by `;`.
    fn into_submission(self) -> Submission {
        let mut answers = BTreeMap::new();
        if let Some(raw) = self.answers.as_deref() {
            for pair in raw.split(';') {
                if let Some((key, value)) = pair.split_once('=') {
                    answers.insert(key.trim().to_string(), value.trim().to_string());
                }
            }
        }
        Submission {
            event: EVENT,
            participant: ParticipantId(self.participant),
            details: SubmissionDetails::Form(answers),
            team_name: self.team.filter(|t| !t.is_empty()),
            payment_proof: self.proof.filter(|p| !p.is_empty()),
        }
    }
}

/// Process submissions from a CSV reader.
///
/// Uses streaming parsing so arbitrarily large files never load into memory
/// at once. Malformed rows and rejected submissions are skipped; rejection
/// reasons surface in the debug log, not on stdout.
///
/// # CSV Format
///
/// Expected columns: `participant, team, proof, answers`
/// - `participant`: Participant id (u32)
/// - `team`: Optional team name
/// - `proof`: Optional payment proof reference (required for paid runs)
/// - `answers`: Optional `key=value` pairs separated by `;`
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn process_submissions<R: Read>(reader: R, engine: &Engine) -> Result<(), csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true) // Allow missing trailing fields
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        match result {
            Ok(record) => {
                let submission = record.into_submission();
                let participant = submission.participant;
                if let Err(e) = engine.submit(submission) {
                    debug!(%participant, "skipping submission: {e}");
                }
            }
            Err(e) => {
                // Skip malformed rows
                debug!("skipping malformed row: {e}");
                continue;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventdesk_rs::RegistrationStatus;
    use rust_decimal_macros::dec;
    use std::io::Cursor;

    #[test]
    fn parse_simple_submission() {
        let csv = "participant,team,proof,answers\n1,,,topic=async\n";
        let engine = build_engine(None, Decimal::ZERO);

        process_submissions(Cursor::new(csv), &engine).unwrap();

        assert_eq!(engine.registration_count(), 1);
        let registration = &engine.registrations_for_event(EVENT)[0];
        assert_eq!(registration.status(), RegistrationStatus::Successful);
        assert_eq!(registration.payload().summary(), "topic=async");
    }

    #[test]
    fn duplicate_participant_rows_are_skipped() {
        let csv = "participant,team,proof,answers\n\
                   1,,,\n\
                   1,,,\n\
                   2,,,\n";
        let engine = build_engine(None, Decimal::ZERO);

        process_submissions(Cursor::new(csv), &engine).unwrap();

        assert_eq!(engine.registration_count(), 2);
    }

    #[test]
    fn capacity_caps_successful_rows() {
        let csv = "participant,team,proof,answers\n\
                   1,,,\n\
                   2,,,\n\
                   3,,,\n";
        let engine = build_engine(Some(2), Decimal::ZERO);

        process_submissions(Cursor::new(csv), &engine).unwrap();

        assert_eq!(engine.registration_count(), 2);
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let csv = "participant,team,proof,answers\n\
                   1,,,\n\
                   not-a-number,x,y,z\n\
                   2,,,\n";
        let engine = build_engine(None, Decimal::ZERO);

        process_submissions(Cursor::new(csv), &engine).unwrap();

        assert_eq!(engine.registration_count(), 2);
    }

    #[test]
    fn paid_run_parks_rows_with_proof() {
        let csv = "participant,team,proof,answers\n\
                   1,,upi-001,\n\
                   2,,,\n";
        let engine = build_engine(None, dec!(50.00));

        process_submissions(Cursor::new(csv), &engine).unwrap();

        // Row without a proof was rejected; the other is parked.
        assert_eq!(engine.registration_count(), 1);
        let registration = &engine.registrations_for_event(EVENT)[0];
        assert_eq!(registration.status(), RegistrationStatus::Pending);

        // Approval path admits it.
        engine
            .resolve(registration.ticket(), ORGANIZER, Decision::Approve)
            .unwrap();
        assert_eq!(registration.status(), RegistrationStatus::Successful);
    }

    #[test]
    fn team_names_survive_into_the_report() {
        let csv = "participant,team,proof,answers\n1,ferris,,\n";
        let engine = build_engine(None, Decimal::ZERO);
        process_submissions(Cursor::new(csv), &engine).unwrap();

        let rows =
            eventdesk_rs::report::participant_report(&engine, EVENT, ORGANIZER, &EmptyDirectory)
                .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].team, "ferris");
    }
}
