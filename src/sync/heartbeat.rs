use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Fixed-period timer driving background refreshes.
///
/// The timer is armed once with [`start`](Heartbeat::start) and then lives as
/// long as its owner. A tick that fires while the previous cycle is still in
/// flight is skipped rather than queued.
#[derive(Debug)]
pub struct Heartbeat {
    period: Duration,
    interval: Option<Interval>,
    in_flight: bool,
    /// Ticks dropped because a cycle was still running.
    skipped: u64,
}

impl Heartbeat {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
            in_flight: false,
            skipped: 0,
        }
    }

    /// Arm the timer; the first tick comes one period from now.
    ///
    /// Returns `false` if it was already running.
    pub fn start(&mut self) -> bool {
        if self.interval.is_some() {
            return false;
        }

        let mut interval = tokio::time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.interval = Some(interval);
        tracing::info!("Heartbeat started, every {:?}", self.period);
        true
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait for the next tick; never resolves until started.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending().await,
        }
    }

    /// Claim the slot for a refresh cycle; `false` means one is still running.
    pub fn begin_cycle(&mut self) -> bool {
        if self.in_flight {
            self.skipped += 1;
            tracing::debug!("Heartbeat tick skipped, previous cycle still running");
            return false;
        }
        self.in_flight = true;
        true
    }

    pub fn end_cycle(&mut self) {
        self.in_flight = false;
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}
