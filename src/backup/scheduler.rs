//! Fires backup runs on their cron schedules.
//!
//! One thread owns the clock and sleeps until the earliest due job, or until a shutdown
//! message arrives. Due jobs are handed to a rayon pool so jobs with different names run
//! in parallel. A job whose previous run is still going skips the trigger instead of
//! queueing behind it. Schedules are evaluated in the host's local time.

use crate::backup::backup_config::{check_unique_names, BackupDefinition};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddMsg;
use crate::backup::runner::BackupRunner;
use chrono::{DateTime, Local, TimeZone};
use rayon::ThreadPool;
use std::any::Any;
use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use tracing::{error, info, warn};
use validator::Validate;

/// Next fire time strictly after `after`, read on the wall clock of `after`'s timezone.
pub fn next_run<Tz: TimeZone>(cron: &str, after: &DateTime<Tz>) -> Result<DateTime<Tz>> {
    cron_parser::parse(cron, after).map_err(|e| Error::cron(cron, e.to_string()))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Next due time of every registered job, in registration order.
pub struct Timetable<Tz: TimeZone> {
    next_runs: Vec<DateTime<Tz>>,
}

impl<Tz: TimeZone> Timetable<Tz> {
    pub fn earliest(&self) -> Option<&DateTime<Tz>> {
        self.next_runs.iter().min()
    }
}

struct ScheduledJob {
    definition: BackupDefinition,
    running: AtomicBool,
}

/// Clears the job's running flag when its run ends, even by panic.
struct RunningGuard(Arc<ScheduledJob>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::Release);
    }
}

#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

struct InFlightGuard(Arc<InFlight>);

impl InFlightGuard {
    fn new(in_flight: Arc<InFlight>) -> Self {
        *in_flight
            .count
            .lock()
            .unwrap_or_else(PoisonError::into_inner) += 1;
        Self(in_flight)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut count = self
            .0
            .count
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *count -= 1;
        if *count == 0 {
            self.0.idle.notify_all();
        }
    }
}

pub struct Scheduler {
    jobs: Vec<Arc<ScheduledJob>>,
    runner: BackupRunner,
    pool: Arc<ThreadPool>,
    in_flight: Arc<InFlight>,
}

impl Scheduler {
    /// Registers every definition once. Invalid or duplicate definitions are rejected
    /// before anything is scheduled.
    pub fn new(
        definitions: Vec<BackupDefinition>,
        runner: BackupRunner,
        pool: Arc<ThreadPool>,
    ) -> Result<Self> {
        for definition in &definitions {
            definition
                .validate()
                .map_err(Error::from)
                .add_msg(format!("Backup {:?} rejected", definition.name()))?;
        }
        check_unique_names(&definitions)?;

        let jobs = definitions
            .into_iter()
            .map(|definition| {
                Arc::new(ScheduledJob {
                    definition,
                    running: AtomicBool::new(false),
                })
            })
            .collect();

        Ok(Self {
            jobs,
            runner,
            pool,
            in_flight: Arc::default(),
        })
    }

    pub fn job_names(&self) -> impl Iterator<Item = &str> {
        self.jobs.iter().map(|job| job.definition.name().as_ref())
    }

    fn job(&self, name: &str) -> Result<&Arc<ScheduledJob>> {
        self.jobs
            .iter()
            .find(|job| job.definition.name().as_ref() == name)
            .ok_or_else(|| Error::config(format!("unknown backup {name:?}")))
    }

    /// Starts a run of `name` right away, outside its schedule.
    pub fn trigger(&self, name: &str) -> Result<()> {
        self.dispatch(self.job(name)?);
        Ok(())
    }

    /// Starts every named backup, or none of them if any name is unknown.
    pub fn trigger_all<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        let jobs = names
            .iter()
            .map(|name| self.job(name.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        jobs.into_iter().for_each(|job| self.dispatch(job));
        Ok(())
    }

    fn dispatch(&self, job: &Arc<ScheduledJob>) {
        let name = job.definition.name();
        if job
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Backup {} is still running, skipping this trigger", name);
            return;
        }

        let running = RunningGuard(job.clone());
        let in_flight = InFlightGuard::new(self.in_flight.clone());
        let runner = self.runner.clone();
        self.pool.spawn(move || {
            let _in_flight = in_flight;
            let definition = &running.0.definition;
            match std::panic::catch_unwind(AssertUnwindSafe(|| runner.run(definition))) {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => error!("{e}"),
                Err(payload) => error!(
                    "Backup {} panicked: {}",
                    definition.name(),
                    panic_message(payload.as_ref())
                ),
            }
        });
    }

    /// Blocks until no run is in progress.
    pub fn wait_idle(&self) {
        let count = self
            .in_flight
            .count
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let _idle = self
            .in_flight
            .idle
            .wait_while(count, |count| *count > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Due times of every job, computed from `now`.
    pub fn timetable<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<Timetable<Tz>> {
        let next_runs = self
            .jobs
            .iter()
            .map(|job| next_run(job.definition.cron(), now))
            .collect::<Result<Vec<_>>>()?;
        Ok(Timetable { next_runs })
    }

    /// Dispatches every job due at `now` and moves its due time past `now`.
    /// Returns how many jobs were due.
    pub fn tick<Tz>(&self, timetable: &mut Timetable<Tz>, now: &DateTime<Tz>) -> Result<usize>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let mut due = 0;
        for (job, at) in self.jobs.iter().zip(timetable.next_runs.iter_mut()) {
            if *at <= *now {
                due += 1;
                self.dispatch(job);
                *at = next_run(job.definition.cron(), now)?;
                info!("Backup {} next runs at {at}", job.definition.name());
            }
        }
        Ok(due)
    }

    /// Runs the schedule on local time until a message arrives on `shutdown` or its
    /// sender is dropped, then waits for in-progress runs to finish.
    pub fn run_until(&self, shutdown: &Receiver<()>) -> Result<()> {
        self.run_with_clock(shutdown, Local::now)
    }

    /// [`Scheduler::run_until`] reading the time from `clock`.
    pub fn run_with_clock<Tz, F>(&self, shutdown: &Receiver<()>, clock: F) -> Result<()>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
        F: Fn() -> DateTime<Tz>,
    {
        let mut timetable = self.timetable(&clock())?;
        for (job, at) in self.jobs.iter().zip(&timetable.next_runs) {
            info!("Backup {} first runs at {at}", job.definition.name());
        }

        loop {
            let now = clock();
            let Some(due) = timetable.earliest().cloned() else {
                info!("No backups scheduled, waiting for shutdown");
                let _ = shutdown.recv();
                break;
            };

            if now < due {
                let wait = (due.clone() - now.clone()).to_std().unwrap_or_default();
                info!("Sleeping until {due}");
                match shutdown.recv_timeout(wait) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(_) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }

            self.tick(&mut timetable, &now)?;
        }

        info!("Shutdown requested, waiting for running backups");
        self.wait_idle();
        info!("All backups finished");
        Ok(())
    }
}
