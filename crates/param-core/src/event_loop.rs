//! Single-task event loop driving a [`ParameterServer`].
//!
//! Timer ticks and bus events are multiplexed with `tokio::select!` inside
//! one task. Each event is handled to completion before the next is polled,
//! so handlers never interleave.

use std::future::Future;
use std::time::Duration;

use futures::{Stream, StreamExt as _};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::ServerError;
use crate::publish::UpdatePublisher;
use crate::server::{EventKind, EventReport, ParameterServer, ServerEvent};

/// How often the full parameter set is republished with no other activity.
pub const DEFAULT_PUBLISH_PERIOD: Duration = Duration::from_secs(5);

/// Shortest period accepted by [`run_event_loop`].
const MIN_PUBLISH_PERIOD: Duration = Duration::from_millis(1);

/// Counters describing one run of the event loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventLoopStats {
    /// Timer ticks handled.
    pub timer_ticks: u64,
    /// Request-channel triggers handled.
    pub requests: u64,
    /// Update-channel messages inspected.
    pub updates: u64,
    /// Set requests handled.
    pub sets: u64,
    /// Snapshots successfully published.
    pub publishes: u64,
    /// Foreign server sightings.
    pub conflicts: u64,
}

impl EventLoopStats {
    fn record(&mut self, kind: EventKind, report: &EventReport) {
        let counter = match kind {
            EventKind::TimerTick => &mut self.timer_ticks,
            EventKind::Request => &mut self.requests,
            EventKind::Update => &mut self.updates,
            EventKind::Set => &mut self.sets,
        };
        *counter = counter.saturating_add(1);
        self.publishes = self.publishes.saturating_add(u64::from(report.published));
        if report.foreign_server.is_some() {
            self.conflicts = self.conflicts.saturating_add(1);
        }
    }
}

/// Run `server` until `shutdown` resolves or a fatal error occurs.
///
/// The timer first fires one full `period` after the loop starts and then
/// every `period`; if handling falls behind, missed ticks are delayed rather
/// than bunched. If `events` ends, the loop keeps running on the timer
/// alone. Periods shorter than one millisecond are raised to one
/// millisecond.
///
/// # Errors
///
/// Returns the first [`ServerError`] raised by a handler.
pub async fn run_event_loop<S, P, F>(
    server: &mut ParameterServer,
    events: S,
    publisher: &mut P,
    period: Duration,
    shutdown: F,
) -> Result<EventLoopStats, ServerError>
where
    S: Stream<Item = ServerEvent> + Unpin,
    P: UpdatePublisher,
    F: Future<Output = ()>,
{
    let period = period.max(MIN_PUBLISH_PERIOD);
    let start = Instant::now()
        .checked_add(period)
        .unwrap_or_else(Instant::now);
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut events = events;
    let mut events_open = true;
    let mut stats = EventLoopStats::default();
    tokio::pin!(shutdown);

    info!(
        server_id = %server.id(),
        period_ms = period.as_millis(),
        update_channel = server.channels().update,
        request_channel = server.channels().request,
        set_channel = server.channels().set,
        "parameter server running"
    );

    loop {
        let event = tokio::select! {
            biased;

            () = &mut shutdown => {
                info!(?stats, "shutdown requested, leaving event loop");
                return Ok(stats);
            }
            _ = ticker.tick() => ServerEvent::TimerTick,
            next = events.next(), if events_open => {
                if let Some(event) = next {
                    event
                } else {
                    warn!("bus event stream closed, continuing with timer only");
                    events_open = false;
                    continue;
                }
            }
        };

        let kind = event.kind();
        debug!(event = kind.as_str(), "handling event");
        let report = server.handle(event, publisher).await?;
        stats.record(kind, &report);
    }
}
