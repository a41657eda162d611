//! Named data callbacks with failure isolation.

// std
use std::panic::{self, AssertUnwindSafe};
// self
use crate::{_prelude::*, auth::Vin, scheduler::CollectedRecord};

/// Error type callbacks may return.
pub type CallbackError = Box<dyn StdError + Send + Sync>;
/// Result returned by a data callback.
pub type CallbackResult = std::result::Result<(), CallbackError>;
/// Shared data callback invoked once per collected vehicle record.
pub type DataCallback = Arc<dyn Fn(&Vin, &CollectedRecord) -> CallbackResult + Send + Sync>;

/// Outcome of one fan-out over the registry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
	/// Callbacks invoked.
	pub invoked: usize,
	/// Callbacks that returned an error or panicked.
	pub failed: usize,
}

/// Registry mapping unique names to data callbacks.
///
/// Registering under an existing name replaces the previous callback. Clones share the same
/// underlying registry.
#[derive(Clone, Default)]
pub struct CallbackRegistry {
	callbacks: Arc<RwLock<BTreeMap<String, DataCallback>>>,
}
impl CallbackRegistry {
	/// Registers `callback` under `name`; returns `true` when it replaced an existing entry.
	pub fn register_data_callback<F>(&self, name: impl Into<String>, callback: F) -> bool
	where
		F: 'static + Fn(&Vin, &CollectedRecord) -> CallbackResult + Send + Sync,
	{
		let name = name.into();
		let replaced = self.callbacks.write().insert(name.clone(), Arc::new(callback)).is_some();

		tracing::debug!(callback = %name, replaced, "Data callback registered.");

		replaced
	}

	/// Removes the callback registered under `name`; returns `true` if one existed.
	pub fn unregister(&self, name: &str) -> bool {
		self.callbacks.write().remove(name).is_some()
	}

	/// Registered names in sorted order.
	pub fn names(&self) -> Vec<String> {
		self.callbacks.read().keys().cloned().collect()
	}

	/// Number of registered callbacks.
	pub fn len(&self) -> usize {
		self.callbacks.read().len()
	}

	/// Returns `true` when nothing is registered.
	pub fn is_empty(&self) -> bool {
		self.callbacks.read().is_empty()
	}

	/// Invokes every callback with `(vin, record)`.
	///
	/// Errors and panics are logged and counted; they never stop the remaining callbacks.
	pub fn dispatch(&self, vin: &Vin, record: &CollectedRecord) -> DispatchReport {
		// Snapshot so callbacks may (un)register without deadlocking.
		let snapshot = self
			.callbacks
			.read()
			.iter()
			.map(|(name, callback)| (name.clone(), callback.clone()))
			.collect::<Vec<_>>();
		let mut report = DispatchReport::default();

		for (name, callback) in snapshot {
			report.invoked += 1;

			match panic::catch_unwind(AssertUnwindSafe(|| callback(vin, record))) {
				Ok(Ok(())) => {},
				Ok(Err(e)) => {
					report.failed += 1;

					tracing::error!(callback = %name, vin = %vin, error = %e, "Data callback failed.");
				},
				Err(payload) => {
					report.failed += 1;

					tracing::error!(
						callback = %name,
						vin = %vin,
						panic = panic_message(payload.as_ref()),
						"Data callback panicked."
					);
				},
			}
		}

		report
	}
}
impl Debug for CallbackRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CallbackRegistry").field("names", &self.names()).finish()
	}
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
	if let Some(message) = payload.downcast_ref::<&str>() {
		*message
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message.as_str()
	} else {
		"<non-string panic payload>"
	}
}
