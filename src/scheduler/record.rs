//! Per-vehicle record produced by one collection run.

// self
use crate::{
	_prelude::*,
	auth::{Vin, token::record::timestamp},
};

/// Flat merge of every endpoint response collected for one vehicle in one run.
///
/// Serializes as `{ "vin": .., "collected_at": <RFC 3339>, "<endpoint>": <response>, .. }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollectedRecord {
	/// Vehicle the data belongs to.
	pub vin: Vin,
	/// Instant the run started collecting this vehicle.
	#[serde(with = "timestamp")]
	pub collected_at: OffsetDateTime,
	/// Responses keyed by endpoint name.
	#[serde(flatten)]
	pub data: BTreeMap<String, Value>,
}
impl CollectedRecord {
	/// Creates an empty record.
	pub fn new(vin: Vin, collected_at: OffsetDateTime) -> Self {
		Self { vin, collected_at, data: BTreeMap::new() }
	}

	/// Stores the response for `endpoint`, replacing any previous value.
	pub fn insert(&mut self, endpoint: impl Into<String>, value: Value) {
		self.data.insert(endpoint.into(), value);
	}

	/// Response collected for `endpoint`, if any.
	pub fn get(&self, endpoint: &str) -> Option<&Value> {
		self.data.get(endpoint)
	}

	/// Returns `true` when no endpoint produced data.
	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}

	/// Flat JSON object form.
	pub fn to_json(&self) -> serde_json::Result<Value> {
		serde_json::to_value(self)
	}
}
