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

//! Finalize-notification outbox.
//!
//! Every successful finalization (free-path submission or approved payment)
//! enqueues exactly one [`TicketNotification`]. Delivery is fire-and-forget:
//! a failing sink is logged and never rolls back or blocks the registration
//! that produced the notification.

use crate::base::{EventId, ParticipantId};
use crate::event::EventType;
use crate::ticket::{CheckInCode, TicketId};
use crossbeam::queue::SegQueue;
use serde::Serialize;
use tracing::warn;

/// Payload handed to the notification collaborator when a registration is
/// finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketNotification {
    pub participant: ParticipantId,
    pub event: EventId,
    pub event_name: String,
    pub event_type: EventType,
    pub ticket: TicketId,
    /// Value to encode into the participant's scannable artifact.
    pub check_in_code: CheckInCode,
}

/// Destination for finalize notifications (mail gateway, webhook, ...).
pub trait NotificationSink {
    /// Delivers one notification. The returned error is only ever logged.
    fn deliver(&self, notification: &TicketNotification) -> Result<(), String>;
}

/// FIFO queue of not-yet-dispatched notifications.
///
/// Backed by a lock-free [`SegQueue`] so the engine can push from any
/// request handler without contending with the dispatcher.
#[derive(Debug, Default)]
pub struct NotificationQueue {
    queue: SegQueue<TicketNotification>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self {
            queue: SegQueue::new(),
        }
    }

    pub(crate) fn push(&self, notification: TicketNotification) {
        self.queue.push(notification);
    }

    /// Removes and returns all queued notifications in FIFO order.
    pub fn drain(&self) -> Vec<TicketNotification> {
        let mut drained = Vec::with_capacity(self.queue.len());
        while let Some(notification) = self.queue.pop() {
            drained.push(notification);
        }
        drained
    }

    /// Drains the queue into `sink`, returning how many deliveries
    /// succeeded. Failed deliveries are logged and dropped; they never
    /// affect registration state.
    pub fn dispatch(&self, sink: &dyn NotificationSink) -> usize {
        let mut delivered = 0;
        while let Some(notification) = self.queue.pop() {
            match sink.deliver(&notification) {
                Ok(()) => delivered += 1,
                Err(reason) => {
                    warn!(
                        ticket = %notification.ticket,
                        participant = %notification.participant,
                        %reason,
                        "ticket notification delivery failed"
                    );
                }
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn notification(n: u32) -> TicketNotification {
        let ticket = crate::ticket::TicketId::parse(&format!("TICK-{n:08X}")).unwrap();
        TicketNotification {
            participant: ParticipantId(n),
            event: EventId(1),
            event_name: "Hack Night".to_string(),
            event_type: EventType::Normal,
            check_in_code: CheckInCode::derive(&ticket),
            ticket,
        }
    }

    struct CountingSink {
        delivered: AtomicUsize,
        fail_every: Option<usize>,
    }

    impl NotificationSink for CountingSink {
        fn deliver(&self, _notification: &TicketNotification) -> Result<(), String> {
            let n = self.delivered.fetch_add(1, Ordering::SeqCst);
            if let Some(every) = self.fail_every {
                if n % every == 0 {
                    return Err("gateway unavailable".to_string());
                }
            }
            Ok(())
        }
    }

    #[test]
    fn drain_preserves_fifo_order() {
        let queue = NotificationQueue::new();
        for n in 0..5 {
            queue.push(notification(n));
        }

        let drained = queue.drain();
        assert_eq!(drained.len(), 5);
        assert!(queue.is_empty());
        let participants: Vec<u32> = drained.iter().map(|n| n.participant.0).collect();
        assert_eq!(participants, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn dispatch_counts_successes_only() {
        let queue = NotificationQueue::new();
        for n in 0..6 {
            queue.push(notification(n));
        }

        let sink = CountingSink {
            delivered: AtomicUsize::new(1),
            fail_every: Some(3),
        };
        let delivered = queue.dispatch(&sink);

        // Two of six deliveries failed; all six were attempted and dropped.
        assert_eq!(delivered, 4);
        assert!(queue.is_empty());
    }

    #[test]
    fn failing_sink_does_not_panic_or_requeue() {
        let queue = NotificationQueue::new();
        queue.push(notification(1));

        struct AlwaysFails;
        impl NotificationSink for AlwaysFails {
            fn deliver(&self, _notification: &TicketNotification) -> Result<(), String> {
                Err("smtp timeout".to_string())
            }
        }

        assert_eq!(queue.dispatch(&AlwaysFails), 0);
        assert!(queue.is_empty());
    }
}
