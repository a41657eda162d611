//! Request descriptors and the connected-vehicle endpoint and command catalogs.

// std
use std::borrow::Cow;
// crates.io
use reqwest::Method;
use serde_json::json;
// self
use crate::{_prelude::*, auth::Vin};

/// Default engine runtime (minutes) for [`Command::EngineStart`].
pub const DEFAULT_ENGINE_RUNTIME_MINUTES: u32 = 15;

const CONNECTED_VEHICLE: &str = "/connected-vehicle/v2/vehicles";

/// Everything the executor needs to issue, cache, and report one API call.
#[derive(Clone, Debug, PartialEq)]
pub struct EndpointDescriptor {
	/// Logical name; used as the record key and in the cache key.
	pub name: Cow<'static, str>,
	/// HTTP method.
	pub method: Method,
	/// Path appended to the API base URL.
	pub path: String,
	/// Vehicle the call targets, if any.
	pub vin: Option<Vin>,
	/// JSON request body.
	pub body: Option<Value>,
	/// Cache lifetime; `None` disables caching.
	pub ttl: Option<Duration>,
}
impl EndpointDescriptor {
	/// Uncached GET descriptor.
	pub fn get(name: impl Into<Cow<'static, str>>, path: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			method: Method::GET,
			path: path.into(),
			vin: None,
			body: None,
			ttl: None,
		}
	}

	/// Uncached POST descriptor with an optional JSON body.
	pub fn post(
		name: impl Into<Cow<'static, str>>,
		path: impl Into<String>,
		body: Option<Value>,
	) -> Self {
		Self { method: Method::POST, body, ..Self::get(name, path) }
	}

	/// Account-level vehicle list (`/connected-vehicle/v2/vehicles`).
	pub fn vehicle_list() -> Self {
		Self::get("vehicles", CONNECTED_VEHICLE).with_ttl(Duration::HOUR)
	}

	/// Tags the descriptor with the vehicle it targets.
	pub fn with_vin(mut self, vin: Vin) -> Self {
		self.vin = Some(vin);

		self
	}

	/// Enables caching with the provided lifetime.
	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = Some(ttl);

		self
	}

	/// Disables caching.
	pub fn without_cache(mut self) -> Self {
		self.ttl = None;

		self
	}

	/// Cache key (`<vin>:<name>`, or `<name>` for account-level calls) when caching applies.
	///
	/// Only GET requests with a positive TTL are cacheable.
	pub fn cache_key(&self) -> Option<String> {
		if self.method != Method::GET || !self.ttl.is_some_and(Duration::is_positive) {
			return None;
		}

		Some(match &self.vin {
			Some(vin) => format!("{vin}:{}", self.name),
			None => self.name.to_string(),
		})
	}
}

/// Extracts the VINs from a vehicle-list response (`{"data": [{"vin": ..}, ..]}`).
///
/// Entries with a missing or invalid VIN are skipped.
pub fn vins_from_vehicle_list(body: &Value) -> Vec<Vin> {
	let Some(entries) = body.get("data").and_then(Value::as_array) else {
		return Vec::new();
	};

	entries
		.iter()
		.filter_map(|entry| entry.get("vin").and_then(Value::as_str))
		.filter_map(|raw| match Vin::new(raw) {
			Ok(vin) => Some(vin),
			Err(e) => {
				tracing::warn!(vin = raw, error = %e, "Skipping vehicle with an invalid VIN.");

				None
			},
		})
		.collect()
}

/// Per-vehicle GET resources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
	/// Model, year, and other static vehicle attributes.
	VehicleDetails,
	/// Battery, range, and charging state (energy API, not enveloped).
	EnergyState,
	/// Which energy-state fields the vehicle supports.
	EnergyCapabilities,
	/// Fuel level.
	Fuel,
	/// Odometer reading.
	Odometer,
	/// Last known position.
	Location,
	/// Active warnings.
	Warnings,
	/// Door and lock status.
	Doors,
	/// Window status.
	Windows,
	/// Brake fluid level.
	BrakeFluid,
	/// Washer fluid level.
	WasherFluid,
	/// Tyre pressure status.
	Tyres,
}
impl Endpoint {
	/// Every catalog entry.
	pub const ALL: [Endpoint; 12] = [
		Endpoint::VehicleDetails,
		Endpoint::EnergyState,
		Endpoint::EnergyCapabilities,
		Endpoint::Fuel,
		Endpoint::Odometer,
		Endpoint::Location,
		Endpoint::Warnings,
		Endpoint::Doors,
		Endpoint::Windows,
		Endpoint::BrakeFluid,
		Endpoint::WasherFluid,
		Endpoint::Tyres,
	];

	/// Stable label used as the record key.
	pub const fn name(self) -> &'static str {
		match self {
			Endpoint::VehicleDetails => "vehicle_details",
			Endpoint::EnergyState => "energy_state",
			Endpoint::EnergyCapabilities => "energy_capabilities",
			Endpoint::Fuel => "fuel",
			Endpoint::Odometer => "odometer",
			Endpoint::Location => "location",
			Endpoint::Warnings => "warnings",
			Endpoint::Doors => "doors",
			Endpoint::Windows => "windows",
			Endpoint::BrakeFluid => "brake_fluid",
			Endpoint::WasherFluid => "washer_fluid",
			Endpoint::Tyres => "tyres",
		}
	}

	/// Request path for `vin`.
	pub fn path(self, vin: &Vin) -> String {
		match self {
			Endpoint::VehicleDetails => format!("{CONNECTED_VEHICLE}/{vin}"),
			Endpoint::EnergyState => format!("/energy/v2/vehicles/{vin}/state"),
			Endpoint::EnergyCapabilities => format!("/energy/v2/vehicles/{vin}/capabilities"),
			Endpoint::Location => format!("/location/v1/vehicles/{vin}/location"),
			Endpoint::Fuel => format!("{CONNECTED_VEHICLE}/{vin}/fuel"),
			Endpoint::Odometer => format!("{CONNECTED_VEHICLE}/{vin}/odometer"),
			Endpoint::Warnings => format!("{CONNECTED_VEHICLE}/{vin}/warnings"),
			Endpoint::Doors => format!("{CONNECTED_VEHICLE}/{vin}/doors"),
			Endpoint::Windows => format!("{CONNECTED_VEHICLE}/{vin}/windows"),
			Endpoint::BrakeFluid => format!("{CONNECTED_VEHICLE}/{vin}/brake-fluid"),
			Endpoint::WasherFluid => format!("{CONNECTED_VEHICLE}/{vin}/washer-fluid"),
			Endpoint::Tyres => format!("{CONNECTED_VEHICLE}/{vin}/tyres"),
		}
	}

	/// Default cache lifetime.
	pub const fn default_ttl(self) -> Duration {
		match self {
			Endpoint::VehicleDetails | Endpoint::EnergyCapabilities => Duration::HOUR,
			Endpoint::Warnings | Endpoint::BrakeFluid | Endpoint::WasherFluid | Endpoint::Tyres =>
				Duration::minutes(5),
			Endpoint::Doors | Endpoint::Windows => Duration::seconds(30),
			Endpoint::EnergyState | Endpoint::Fuel | Endpoint::Odometer | Endpoint::Location =>
				Duration::MINUTE,
		}
	}

	/// Whether the response wraps its payload in a `data` envelope.
	pub const fn is_enveloped(self) -> bool {
		!matches!(self, Endpoint::EnergyState | Endpoint::EnergyCapabilities)
	}

	/// Cacheable descriptor for `vin` using [`Endpoint::default_ttl`].
	pub fn descriptor(self, vin: &Vin) -> EndpointDescriptor {
		EndpointDescriptor::get(self.name(), self.path(vin))
			.with_vin(vin.clone())
			.with_ttl(self.default_ttl())
	}
}
impl Display for Endpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.name())
	}
}
impl FromStr for Endpoint {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let needle = s.trim().replace('-', "_").to_ascii_lowercase();

		Endpoint::ALL
			.into_iter()
			.find(|endpoint| endpoint.name() == needle)
			.ok_or_else(|| format!("unknown endpoint {s:?}"))
	}
}

/// Remote commands. Commands are POSTs and never cached.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
	/// Lock the doors.
	Lock,
	/// Unlock the doors.
	Unlock,
	/// Start the engine for the given number of minutes.
	EngineStart {
		/// Runtime in minutes.
		runtime_minutes: u32,
	},
	/// Stop the engine.
	EngineStop,
	/// Start climatization, optionally targeting a cabin temperature (°C).
	ClimatizationStart {
		/// Target temperature in Celsius.
		temperature: Option<f64>,
	},
	/// Stop climatization.
	ClimatizationStop,
}
impl Command {
	/// Stable label used in logs and descriptors.
	pub const fn name(self) -> &'static str {
		match self {
			Command::Lock => "lock",
			Command::Unlock => "unlock",
			Command::EngineStart { .. } => "engine-start",
			Command::EngineStop => "engine-stop",
			Command::ClimatizationStart { .. } => "climatization-start",
			Command::ClimatizationStop => "climatization-stop",
		}
	}

	/// JSON body sent with the command, if any.
	pub fn body(self) -> Option<Value> {
		match self {
			Command::EngineStart { runtime_minutes } => Some(json!({ "runtime": runtime_minutes })),
			Command::ClimatizationStart { temperature: Some(temperature) } =>
				Some(json!({ "temperature": temperature })),
			Command::ClimatizationStart { temperature: None } => Some(json!({})),
			_ => None,
		}
	}

	/// Uncached POST descriptor for `vin`.
	pub fn descriptor(self, vin: &Vin) -> EndpointDescriptor {
		EndpointDescriptor::post(
			self.name(),
			format!("{CONNECTED_VEHICLE}/{vin}/commands/{}", self.name()),
			self.body(),
		)
		.with_vin(vin.clone())
	}
}
