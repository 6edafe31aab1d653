//! Weekly automation: the Friday request reminder and the Sunday
//! publication of the coming week.
//!
//! Each job runs at most once per planned week. A job that fails is retried on
//! the next check; a publication that never happens is covered by the lazy
//! materialization in [`SeatService`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::model::week_start;
use crate::core::service::SeatService;
use crate::core::spawn::{Spawn, StopHandle};

/// Default pause between schedule checks.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// A job that came due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum WeeklyJob {
    /// Remind employees to file requests.
    Reminder {
        /// Monday of the week being planned.
        week_start: NaiveDate,
    },
    /// Materialize the week and send everyone their schedule.
    Publish {
        /// Monday of the week being published.
        week_start: NaiveDate,
    },
}

impl WeeklyJob {
    const fn week_start(self) -> NaiveDate {
        match self {
            Self::Reminder { week_start } | Self::Publish { week_start } => week_start,
        }
    }
}

/// Local times of the two jobs. The reminder runs on Friday, the publication
/// on Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklyTimes {
    /// Friday reminder time.
    pub reminder_at: NaiveTime,
    /// Sunday publication time.
    pub publish_at: NaiveTime,
}

/// Background task running the weekly jobs against a service.
pub struct WeeklyTasks {
    service: Arc<SeatService>,
    times: WeeklyTimes,
    interval: Duration,
    last_reminder: Mutex<Option<NaiveDate>>,
    last_publish: Mutex<Option<NaiveDate>>,
}

impl WeeklyTasks {
    /// Jobs for `service`, checked every `interval`.
    pub fn new(service: Arc<SeatService>, times: WeeklyTimes, interval: Duration) -> Self {
        Self {
            service,
            times,
            interval: if interval.is_zero() { DEFAULT_CHECK_INTERVAL } else { interval },
            last_reminder: Mutex::new(None),
            last_publish: Mutex::new(None),
        }
    }

    /// The job due at office-local `now`, unless it already ran for its week.
    pub fn due(&self, now: NaiveDateTime) -> Option<WeeklyJob> {
        let coming = week_start(now.date()) + chrono::Duration::days(7);
        match now.weekday() {
            Weekday::Fri if now.time() >= self.times.reminder_at => {
                (*self.last_reminder.lock() != Some(coming)).then_some(WeeklyJob::Reminder { week_start: coming })
            }
            Weekday::Sun if now.time() >= self.times.publish_at => {
                (*self.last_publish.lock() != Some(coming)).then_some(WeeklyJob::Publish { week_start: coming })
            }
            _ => None,
        }
    }

    /// Run the job due now, if any. Returns the job when it completed.
    pub async fn run_once(&self) -> Option<WeeklyJob> {
        let job = self.due(self.service.local_now().naive_local())?;
        let result = match job {
            WeeklyJob::Reminder { week_start } => self.service.send_reminders(week_start).await,
            WeeklyJob::Publish { week_start } => self.service.publish_week(week_start).await,
        };
        match result {
            Ok(delivered) => {
                let slot = match job {
                    WeeklyJob::Reminder { .. } => &self.last_reminder,
                    WeeklyJob::Publish { .. } => &self.last_publish,
                };
                *slot.lock() = Some(job.week_start());
                info!(?job, delivered, "weekly job done");
                Some(job)
            }
            Err(err) => {
                warn!(?job, error = %err, "weekly job failed; retrying at the next check");
                None
            }
        }
    }

    /// Spawn the loop. The first check runs one interval after start.
    pub fn start<S: Spawn>(self, spawner: &S) -> StopHandle {
        let handle = StopHandle::new();
        let loop_handle = handle.clone();
        info!(interval_secs = self.interval.as_secs(), "weekly jobs started");
        spawner.spawn(async move {
            let start = tokio::time::Instant::now() + self.interval;
            let mut ticker = tokio::time::interval_at(start, self.interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    () = loop_handle.stop_requested() => {}
                }
                if loop_handle.is_stopped() {
                    break;
                }
                if let Some(job) = self.run_once().await {
                    debug!(?job, "weekly check ran a job");
                }
            }
            info!("weekly jobs stopped");
        });
        handle
    }
}
