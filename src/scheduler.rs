//! Background collection: a cancellable timer that polls every target vehicle and fans the
//! merged records out to registered callbacks.
//!
//! Each tick spawns one collection run. Scheduled and one-shot runs share one run lock: a tick
//! that finds the lock held is skipped and counted, while [`Scheduler::collect_once`] waits for
//! it. [`Scheduler::stop`] signals the timer and drains the in-flight run without interrupting it.

pub mod callback;
pub mod record;

pub use callback::*;
pub use record::*;

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use tokio::{
	sync::watch,
	task::JoinHandle,
	time::{self, MissedTickBehavior},
};
// self
use crate::{
	_prelude::*,
	auth::Vin,
	error::ConfigError,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	request::{Endpoint, EndpointDescriptor, RequestExecutor, vins_from_vehicle_list},
};

/// Snapshot of the scheduler counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
	/// Timer ticks observed.
	pub ticks: u64,
	/// Ticks skipped because a run was still in flight.
	pub skipped: u64,
	/// Collection runs started (scheduled or one-shot).
	pub runs_started: u64,
	/// Collection runs finished.
	pub runs_completed: u64,
	/// Records handed to callbacks.
	pub records_dispatched: u64,
	/// Callback invocations that failed or panicked.
	pub callback_failures: u64,
}

#[derive(Debug, Default)]
struct StatsCounters {
	ticks: AtomicU64,
	skipped: AtomicU64,
	runs_started: AtomicU64,
	runs_completed: AtomicU64,
	records_dispatched: AtomicU64,
	callback_failures: AtomicU64,
}
impl StatsCounters {
	fn bump(counter: &AtomicU64, by: u64) {
		counter.fetch_add(by, Ordering::Relaxed);
	}

	fn snapshot(&self) -> SchedulerStats {
		SchedulerStats {
			ticks: self.ticks.load(Ordering::Relaxed),
			skipped: self.skipped.load(Ordering::Relaxed),
			runs_started: self.runs_started.load(Ordering::Relaxed),
			runs_completed: self.runs_completed.load(Ordering::Relaxed),
			records_dispatched: self.records_dispatched.load(Ordering::Relaxed),
			callback_failures: self.callback_failures.load(Ordering::Relaxed),
		}
	}
}

#[derive(Debug)]
struct Collector {
	executor: Arc<RequestExecutor>,
	vins: Vec<Vin>,
	endpoints: Vec<Endpoint>,
	callbacks: CallbackRegistry,
	run_lock: Arc<AsyncMutex<()>>,
	stats: StatsCounters,
}
impl Collector {
	/// Runs one collection. Callers must hold `run_lock`.
	async fn run_locked(&self) -> Vec<CollectedRecord> {
		const KIND: FlowKind = FlowKind::Collection;

		let span = FlowSpan::new(KIND, "collect");

		StatsCounters::bump(&self.stats.runs_started, 1);
		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let records = span.instrument(self.collect_all()).await;

		StatsCounters::bump(&self.stats.runs_completed, 1);
		obs::record_flow_outcome(
			KIND,
			if records.is_empty() { FlowOutcome::Failure } else { FlowOutcome::Success },
		);

		records
	}

	async fn collect_all(&self) -> Vec<CollectedRecord> {
		let vins = self.target_vins().await;
		let mut records = Vec::with_capacity(vins.len());

		for vin in vins {
			let Some(record) = self.collect_vehicle(&vin).await else {
				tracing::warn!(vin = %vin, "Every endpoint failed; no record produced.");

				continue;
			};
			let report = self.callbacks.dispatch(&vin, &record);

			StatsCounters::bump(&self.stats.records_dispatched, 1);
			StatsCounters::bump(&self.stats.callback_failures, report.failed as u64);

			records.push(record);
		}

		tracing::info!(records = records.len(), "Collection run finished.");

		records
	}

	async fn target_vins(&self) -> Vec<Vin> {
		if !self.vins.is_empty() {
			return self.vins.clone();
		}

		match self.executor.execute(&EndpointDescriptor::vehicle_list()).await {
			Ok(body) => vins_from_vehicle_list(&body),
			Err(e) => {
				tracing::error!(error = %e, "Failed to list vehicles.");

				Vec::new()
			},
		}
	}

	async fn collect_vehicle(&self, vin: &Vin) -> Option<CollectedRecord> {
		let mut record = CollectedRecord::new(vin.clone(), OffsetDateTime::now_utc());

		for endpoint in &self.endpoints {
			match self.executor.execute(&endpoint.descriptor(vin)).await {
				Ok(value) => record.insert(endpoint.name(), value),
				Err(e) => {
					tracing::warn!(vin = %vin, endpoint = %endpoint, error = %e, "Endpoint collection failed.");
				},
			}
		}

		(!record.is_empty()).then_some(record)
	}
}

#[derive(Debug)]
struct TimerTask {
	stop_tx: watch::Sender<bool>,
	handle: JoinHandle<()>,
}

/// Periodic collector over a shared [`RequestExecutor`].
#[derive(Debug)]
pub struct Scheduler {
	collector: Arc<Collector>,
	timer: Mutex<Option<TimerTask>>,
}
impl Scheduler {
	/// Creates a stopped scheduler.
	///
	/// An empty `vins` list means "every vehicle returned by the vehicle-list endpoint".
	pub fn new(executor: Arc<RequestExecutor>, vins: Vec<Vin>, endpoints: Vec<Endpoint>) -> Self {
		Self {
			collector: Arc::new(Collector {
				executor,
				vins,
				endpoints,
				callbacks: CallbackRegistry::default(),
				run_lock: Arc::new(AsyncMutex::new(())),
				stats: StatsCounters::default(),
			}),
			timer: Mutex::new(None),
		}
	}

	/// Callback registry shared with the collection runs.
	pub fn callbacks(&self) -> &CallbackRegistry {
		&self.collector.callbacks
	}

	/// Registers a data callback; see [`CallbackRegistry::register_data_callback`].
	pub fn register_data_callback<F>(&self, name: impl Into<String>, callback: F) -> bool
	where
		F: 'static + Fn(&Vin, &CollectedRecord) -> CallbackResult + Send + Sync,
	{
		self.collector.callbacks.register_data_callback(name, callback)
	}

	/// Removes a data callback; see [`CallbackRegistry::unregister`].
	pub fn unregister(&self, name: &str) -> bool {
		self.collector.callbacks.unregister(name)
	}

	/// Returns `true` while the timer is running.
	pub fn is_running(&self) -> bool {
		self.timer.lock().is_some()
	}

	/// Counter snapshot.
	pub fn stats(&self) -> SchedulerStats {
		self.collector.stats.snapshot()
	}

	/// Starts the timer on the current Tokio runtime. The first run starts immediately.
	///
	/// Calling `start` on a running scheduler is a no-op.
	pub fn start(&self, interval: StdDuration) -> Result<()> {
		if interval.is_zero() {
			return Err(ConfigError::ZeroInterval.into());
		}

		let mut timer = self.timer.lock();

		if timer.is_some() {
			tracing::debug!("Scheduler already running.");

			return Ok(());
		}

		let (stop_tx, stop_rx) = watch::channel(false);
		let handle = tokio::spawn(timer_loop(self.collector.clone(), interval, stop_rx));

		*timer = Some(TimerTask { stop_tx, handle });

		tracing::info!(interval_ms = interval.as_millis() as u64, "Scheduler started.");

		Ok(())
	}

	/// Stops the timer and waits for an in-flight run to finish. Repeated calls are no-ops.
	pub async fn stop(&self) {
		let Some(TimerTask { stop_tx, handle }) = self.timer.lock().take() else {
			return;
		};
		let _ = stop_tx.send(true);

		if let Err(e) = handle.await {
			tracing::error!(error = %e, "Scheduler timer task ended abnormally.");
		}

		tracing::info!("Scheduler stopped.");
	}

	/// Runs one collection in the caller's task and returns the records produced.
	///
	/// Waits for a scheduled run that is already in flight; ticks arriving meanwhile are skipped.
	pub async fn collect_once(&self) -> Vec<CollectedRecord> {
		let _exclusive = self.collector.run_lock.lock().await;

		self.collector.run_locked().await
	}
}
impl Drop for Scheduler {
	fn drop(&mut self) {
		if let Some(TimerTask { stop_tx, .. }) = self.timer.get_mut().take() {
			let _ = stop_tx.send(true);
		}
	}
}

async fn timer_loop(collector: Arc<Collector>, period: StdDuration, mut stop_rx: watch::Receiver<bool>) {
	let mut interval = time::interval(period);
	let mut current_run: Option<JoinHandle<()>> = None;

	interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

	loop {
		tokio::select! {
			biased;
			changed = stop_rx.changed() => {
				if changed.is_err() || *stop_rx.borrow() {
					break;
				}

				continue;
			},
			_ = interval.tick() => {},
		}

		StatsCounters::bump(&collector.stats.ticks, 1);

		let Some(exclusive) = collector.run_lock.try_lock_arc() else {
			StatsCounters::bump(&collector.stats.skipped, 1);
			tracing::debug!("Previous collection still running; skipping tick.");

			continue;
		};
		let runner = collector.clone();

		current_run = Some(tokio::spawn(async move {
			runner.run_locked().await;

			drop(exclusive);
		}));
	}

	if let Some(run) = current_run
		&& let Err(e) = run.await
	{
		tracing::error!(error = %e, "Collection run ended abnormally.");
	}
}
