//! Scope modeling helpers and the predefined Volvo scope sets.

// std
use std::{cmp::Ordering, collections::BTreeSet, slice::Iter};
// crates.io
use serde::{Deserializer, Serializer, de::Error as DeError, ser::SerializeSeq};
// self
use crate::_prelude::*;

const OPENID: &str = "openid";
const DEFAULT_SCOPES: &[&str] = &[
	OPENID,
	"conve:battery_charge_level",
	"conve:commands",
	"conve:brake_status",
	"conve:diagnostics_engine_status",
	"conve:fuel_status",
	"conve:vehicle_relation",
	"conve:warnings",
	"energy:state:read",
	"energy:capability:read",
	"location:read",
];
const BASIC_SCOPES: &[&str] = &[
	OPENID,
	"conve:vehicle_relation",
	"conve:fuel_status",
	"conve:battery_charge_level",
	"energy:state:read",
];
const COMMAND_SCOPES: &[&str] = &[OPENID, "conve:commands", "conve:vehicle_relation"];
const ALL_SCOPES: &[&str] = &[
	OPENID,
	"conve:battery_charge_level",
	"conve:commands",
	"conve:brake_status",
	"conve:diagnostics_engine_status",
	"conve:fuel_status",
	"conve:vehicle_relation",
	"conve:warnings",
	"conve:climatization_start_stop",
	"conve:engine_start_stop",
	"conve:honk_blink",
	"conve:lock_unlock",
	"conve:preclimatization",
	"conve:trip_statistics",
	"energy:state:read",
	"energy:capability:read",
	"location:read",
];

/// Errors emitted when validating scopes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ScopeValidationError {
	/// Empty scope entries are not allowed.
	#[error("Scope entries cannot be empty.")]
	Empty,
	/// Scopes cannot contain embedded whitespace characters.
	#[error("Scope contains whitespace: {scope}.")]
	ContainsWhitespace {
		/// The offending scope string.
		scope: String,
	},
}

/// Named scope bundles offered by the Volvo developer portal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ScopeCategory {
	/// Read access to the common status endpoints plus energy and location.
	#[default]
	Default,
	/// Minimal read access (relation, fuel, battery, energy state).
	Basic,
	/// Remote command access.
	Command,
	/// Every scope the API publishes.
	All,
}
impl ScopeCategory {
	/// Looks up a bundle by its case-insensitive name (`default`, `basic`, `command`, `all`).
	pub fn from_name(name: &str) -> Option<Self> {
		match name.trim().to_ascii_lowercase().as_str() {
			"default" => Some(Self::Default),
			"basic" => Some(Self::Basic),
			"command" => Some(Self::Command),
			"all" => Some(Self::All),
			_ => None,
		}
	}

	fn scopes(self) -> &'static [&'static str] {
		match self {
			Self::Default => DEFAULT_SCOPES,
			Self::Basic => BASIC_SCOPES,
			Self::Command => COMMAND_SCOPES,
			Self::All => ALL_SCOPES,
		}
	}
}

/// Normalized, deduplicated, sorted set of OAuth scopes.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ScopeSet {
	scopes: Arc<[String]>,
}
impl ScopeSet {
	/// Creates a normalized scope set from any iterator.
	pub fn new<I, S>(scopes: I) -> Result<Self, ScopeValidationError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Ok(Self { scopes: normalize(scopes)? })
	}

	/// Returns the predefined scope set for a category.
	pub fn category(category: ScopeCategory) -> Self {
		Self { scopes: Arc::from(sorted_static(category.scopes())) }
	}

	/// Parses a comma-separated list (the `SCOPES` variable format).
	///
	/// Blank entries between commas are ignored.
	pub fn from_comma_separated(raw: &str) -> Result<Self, ScopeValidationError> {
		Self::new(raw.split(',').map(str::trim).filter(|s| !s.is_empty()))
	}

	/// Number of distinct scopes.
	pub fn len(&self) -> usize {
		self.scopes.len()
	}

	/// Returns true if no scopes are defined.
	pub fn is_empty(&self) -> bool {
		self.scopes.is_empty()
	}

	/// Returns true if the normalized set contains the provided scope.
	pub fn contains(&self, scope: &str) -> bool {
		self.scopes.binary_search_by(|candidate| candidate.as_str().cmp(scope)).is_ok()
	}

	/// Iterator over normalized scopes.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.scopes.iter().map(|s| s.as_str())
	}

	/// Returns the space-delimited representation used in the `scope` parameter.
	pub fn normalized(&self) -> String {
		self.scopes.join(" ")
	}
}
impl PartialOrd for ScopeSet {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}
impl Ord for ScopeSet {
	fn cmp(&self, other: &Self) -> Ordering {
		self.scopes.cmp(&other.scopes)
	}
}
impl Debug for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ScopeSet").field(&self.scopes).finish()
	}
}
impl Display for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.normalized())
	}
}

/// Iterator over scope strings.
pub struct ScopeIter<'a> {
	inner: Iter<'a, String>,
}
impl<'a> Iterator for ScopeIter<'a> {
	type Item = &'a str;

	fn next(&mut self) -> Option<Self::Item> {
		self.inner.next().map(|s| s.as_str())
	}
}
impl<'a> IntoIterator for &'a ScopeSet {
	type IntoIter = ScopeIter<'a>;
	type Item = &'a str;

	fn into_iter(self) -> Self::IntoIter {
		ScopeIter { inner: self.scopes.iter() }
	}
}
impl FromStr for ScopeSet {
	type Err = ScopeValidationError;

	/// Parses a space-delimited scope string, as returned by token endpoints.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.is_empty() {
			return Ok(Self::default());
		}
		if s.chars().all(char::is_whitespace) {
			return Err(ScopeValidationError::Empty);
		}

		Self::new(s.split_whitespace())
	}
}
impl Serialize for ScopeSet {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut seq = serializer.serialize_seq(Some(self.scopes.len()))?;

		for scope in self.scopes.iter() {
			seq.serialize_element(scope)?;
		}

		seq.end()
	}
}
impl<'de> Deserialize<'de> for ScopeSet {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let values = <Vec<String>>::deserialize(deserializer)?;

		ScopeSet::new(values).map_err(DeError::custom)
	}
}

fn normalize<I, S>(scopes: I) -> Result<Arc<[String]>, ScopeValidationError>
where
	I: IntoIterator<Item = S>,
	S: Into<String>,
{
	let mut set = BTreeSet::new();

	for scope in scopes {
		let owned: String = scope.into();

		if owned.is_empty() {
			return Err(ScopeValidationError::Empty);
		}
		if owned.chars().any(char::is_whitespace) {
			return Err(ScopeValidationError::ContainsWhitespace { scope: owned });
		}

		set.insert(owned);
	}

	Ok(Arc::from(set.into_iter().collect::<Vec<_>>()))
}

fn sorted_static(scopes: &[&str]) -> Vec<String> {
	scopes.iter().map(|s| (*s).to_owned()).collect::<BTreeSet<_>>().into_iter().collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn scopes_normalize_and_deduplicate() {
		let lhs = ScopeSet::new(["openid", "conve:fuel_status", "openid"])
			.expect("Left-hand scope set should be valid.");
		let rhs = ScopeSet::new(["conve:fuel_status", "openid"])
			.expect("Right-hand scope set should be valid.");

		assert_eq!(lhs, rhs);
		assert_eq!(lhs.normalized(), "conve:fuel_status openid");
	}

	#[test]
	fn comma_separated_variable_parses() {
		let set = ScopeSet::from_comma_separated(" openid, energy:state:read ,,")
			.expect("Comma-separated scopes should parse.");

		assert_eq!(set.len(), 2);
		assert!(set.contains("energy:state:read"));
		assert!(ScopeSet::from_comma_separated("open id").is_err());
	}

	#[test]
	fn scopes_reject_whitespace_padding() {
		let err = ScopeSet::new([" openid "]).expect_err("Padded scopes must be rejected.");

		assert!(matches!(err, ScopeValidationError::ContainsWhitespace { .. }));
		assert!(ScopeSet::from_str("").is_ok(), "Empty string represents an empty scope set.");
		assert!(ScopeSet::from_str("   ").is_err(), "Whitespace-only input must be rejected.");
	}

	#[test]
	fn categories_include_openid() {
		for category in
			[ScopeCategory::Default, ScopeCategory::Basic, ScopeCategory::Command, ScopeCategory::All]
		{
			assert!(ScopeSet::category(category).contains("openid"));
		}

		assert!(ScopeSet::category(ScopeCategory::All).contains("conve:lock_unlock"));
		assert!(!ScopeSet::category(ScopeCategory::Basic).contains("conve:commands"));
		assert_eq!(ScopeCategory::from_name(" COMMAND "), Some(ScopeCategory::Command));
		assert_eq!(ScopeCategory::from_name("default"), Some(ScopeCategory::Default));
		assert_eq!(ScopeCategory::from_name("unknown"), None);
	}

	#[test]
	fn serde_uses_string_arrays() {
		let set = ScopeSet::new(["openid", "location:read"]).expect("Scope set should be valid.");
		let payload = serde_json::to_string(&set).expect("Scope set should serialize.");

		assert_eq!(payload, "[\"location:read\",\"openid\"]");
		assert!(serde_json::from_str::<ScopeSet>("[\"\"]").is_err());
	}
}
