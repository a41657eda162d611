//! Strongly typed vehicle identifiers used as cache and record keys.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

const VIN_LEN: usize = 17;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("VIN cannot be empty.")]
	Empty,
	/// The identifier contains characters outside `[A-Z0-9]`.
	#[error("VIN contains an invalid character {found:?}.")]
	InvalidCharacter {
		/// First offending character.
		found: char,
	},
	/// The identifier does not have exactly 17 characters.
	#[error("VIN must be {expected} characters long, got {actual}.")]
	InvalidLength {
		/// Required character count.
		expected: usize,
		/// Observed character count.
		actual: usize,
	},
}

/// Vehicle Identification Number (ISO 3779), normalized to upper case.
///
/// The letters `I`, `O`, and `Q` never appear in a VIN and are rejected.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Vin(String);
impl Vin {
	/// Creates a VIN after normalization and validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		let normalized = value.as_ref().to_ascii_uppercase();

		validate(&normalized)?;

		Ok(Self(normalized))
	}

	/// Returns the VIN as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Deref for Vin {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for Vin {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for Vin {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl From<Vin> for String {
	fn from(value: Vin) -> Self {
		value.0
	}
}
impl TryFrom<String> for Vin {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl FromStr for Vin {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl Debug for Vin {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Vin({})", self.0)
	}
}
impl Display for Vin {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

fn validate(view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty);
	}
	if let Some(found) =
		view.chars().find(|c| !c.is_ascii_alphanumeric() || matches!(c, 'I' | 'O' | 'Q'))
	{
		return Err(IdentifierError::InvalidCharacter { found });
	}

	let actual = view.chars().count();

	if actual != VIN_LEN {
		return Err(IdentifierError::InvalidLength { expected: VIN_LEN, actual });
	}

	Ok(())
}
