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

//! Benchmarks for the registration engine.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Single-threaded submission processing
//! - Multi-threaded concurrent submissions
//! - Merchandise reservations
//! - Check-in throughput

use chrono::{Duration, Utc};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use eventdesk_rs::{
    Engine, Event, EventId, ItemRequest, OrganizerId, ParticipantId, Schedule, Submission,
    SubmissionDetails, Variant, VariantKey,
};
use rayon::prelude::*;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;

// =============================================================================
// Helper Functions
// =============================================================================

const ORGANIZER: OrganizerId = OrganizerId(1);

fn open_schedule() -> Schedule {
    let now = Utc::now();
    Schedule {
        deadline: now + Duration::hours(1),
        starts_at: now + Duration::hours(2),
        ends_at: now + Duration::hours(4),
    }
}

fn engine_with_normal_event(capacity: Option<u32>) -> Engine {
    let engine = Engine::new();
    let event = Event::normal(
        EventId(1),
        "Bench Event",
        ORGANIZER,
        open_schedule(),
        capacity,
        Decimal::ZERO,
    );
    event.publish().unwrap();
    engine.add_event(event).unwrap();
    engine
}

fn engine_with_merch_event(stock: u32) -> Engine {
    let engine = Engine::new();
    let event = Event::merchandise(
        EventId(1),
        "Bench Merch",
        ORGANIZER,
        open_schedule(),
        vec![Variant::new("Shirt", "M", Decimal::new(1500, 2), stock)],
        Decimal::ZERO,
    );
    event.publish().unwrap();
    engine.add_event(event).unwrap();
    engine
}

fn form_submission(participant: u32) -> Submission {
    Submission {
        event: EventId(1),
        participant: ParticipantId(participant),
        details: SubmissionDetails::Form(BTreeMap::new()),
        team_name: None,
        payment_proof: None,
    }
}

fn order_submission(participant: u32) -> Submission {
    Submission {
        event: EventId(1),
        participant: ParticipantId(participant),
        details: SubmissionDetails::Order(vec![ItemRequest::new(
            VariantKey::new("Shirt", "M"),
            1,
        )]),
        team_name: None,
        payment_proof: None,
    }
}

// =============================================================================
// Single-Threaded Benchmarks
// =============================================================================

fn bench_single_submission(c: &mut Criterion) {
    c.bench_function("single_submission", |b| {
        let engine = engine_with_normal_event(None);
        let mut participant = 0u32;
        b.iter(|| {
            engine
                .submit(black_box(form_submission(participant)))
                .unwrap();
            participant += 1;
        })
    });
}

fn bench_merch_submission(c: &mut Criterion) {
    c.bench_function("merch_submission", |b| {
        let engine = engine_with_merch_event(u32::MAX);
        let mut participant = 0u32;
        b.iter(|| {
            engine
                .submit(black_box(order_submission(participant)))
                .unwrap();
            participant += 1;
        })
    });
}

fn bench_check_in(c: &mut Criterion) {
    c.bench_function("check_in", |b| {
        let engine = engine_with_normal_event(None);
        let mut participant = 0u32;
        b.iter_with_setup(
            || {
                let outcome = engine.submit(form_submission(participant)).unwrap();
                participant += 1;
                outcome.ticket().clone()
            },
            |ticket| {
                engine.check_in(ticket.as_str(), ORGANIZER).unwrap();
            },
        )
    });
}

// =============================================================================
// Throughput Benchmarks
// =============================================================================

fn bench_submission_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("submission_throughput");

    for count in [100usize, 1000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let engine = engine_with_normal_event(None);
                for participant in 0..count {
                    engine.submit(form_submission(participant as u32)).unwrap();
                }
            })
        });
    }
    group.finish();
}

fn bench_concurrent_submissions(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_submissions");
    group.throughput(Throughput::Elements(1000));

    group.bench_function("rayon_1000", |b| {
        b.iter(|| {
            let engine = Arc::new(engine_with_normal_event(None));
            (0..1000u32).into_par_iter().for_each(|participant| {
                engine.submit(form_submission(participant)).unwrap();
            });
        })
    });

    // Contended: everyone fights for the same small stock.
    group.bench_function("rayon_contended_stock", |b| {
        b.iter(|| {
            let engine = Arc::new(engine_with_merch_event(100));
            (0..1000u32).into_par_iter().for_each(|participant| {
                let _ = engine.submit(order_submission(participant));
            });
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_single_submission,
    bench_merch_submission,
    bench_check_in,
    bench_submission_throughput,
    bench_concurrent_submissions,
);
criterion_main!(benches);
