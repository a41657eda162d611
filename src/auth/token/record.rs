//! Persisted token set, lifecycle helpers, and builder.

// crates.io
use time::format_description::well_known::{Iso8601, Rfc3339};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, token::secret::TokenSecret},
};

/// Current lifecycle status for a token set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token is usable.
	Active,
	/// Token passed its (margin-adjusted) expiry instant.
	Expired,
	/// The refresh token was rejected; a new authorization is required.
	Revoked,
}

/// Errors produced by [`TokenSetBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenSetBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
}

/// Credentials issued by the token endpoint.
///
/// `expires_at` already has the safety margin subtracted, so "expired" means "refresh now".
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenSet {
	/// Bearer token sent with API requests.
	pub access_token: TokenSecret,
	/// Refresh token, if the authority issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Margin-adjusted expiry instant.
	#[serde(with = "timestamp", default = "timestamp::epoch")]
	pub expires_at: OffsetDateTime,
	/// Scopes granted with this token.
	#[serde(default)]
	pub scopes: ScopeSet,
	/// Instant the token endpoint answered.
	#[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
	pub issued_at: Option<OffsetDateTime>,
	/// Instant the refresh token was rejected.
	#[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
	pub revoked_at: Option<OffsetDateTime>,
}
impl TokenSet {
	/// Returns a builder for constructing token sets from endpoint responses.
	pub fn builder() -> TokenSetBuilder {
		TokenSetBuilder::default()
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		if self.revoked_at.is_some() {
			return TokenStatus::Revoked;
		}
		if instant >= self.expires_at {
			return TokenStatus::Expired;
		}

		TokenStatus::Active
	}

	/// Convenience helper that checks the status using the current UTC instant.
	pub fn status(&self) -> TokenStatus {
		self.status_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` if the token is usable at the provided instant.
	pub fn is_active_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), TokenStatus::Active)
	}

	/// Returns `true` if the token has been revoked.
	pub fn is_revoked(&self) -> bool {
		self.revoked_at.is_some()
	}

	/// Marks the token set as revoked.
	pub fn revoke(&mut self, instant: OffsetDateTime) {
		self.revoked_at = Some(instant);
	}
}
impl Debug for TokenSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenSet")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_at", &self.expires_at)
			.field("scopes", &self.scopes)
			.field("issued_at", &self.issued_at)
			.field("revoked_at", &self.revoked_at)
			.finish()
	}
}

/// Builder for [`TokenSet`].
#[derive(Clone, Debug, Default)]
pub struct TokenSetBuilder {
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	scopes: ScopeSet,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
	safety_margin: Duration,
}
impl TokenSetBuilder {
	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the granted scopes.
	pub fn scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = scopes;

		self
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant; the safety margin is not applied to it.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets the server-declared lifetime relative to the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Subtracts `margin` from a relative expiry so refreshes happen early.
	pub fn safety_margin(mut self, margin: Duration) -> Self {
		self.safety_margin = if margin.is_negative() { Duration::ZERO } else { margin };

		self
	}

	/// Consumes the builder and produces a [`TokenSet`].
	pub fn build(self) -> Result<TokenSet, TokenSetBuilderError> {
		let access_token = self.access_token.ok_or(TokenSetBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(lifetime)) => issued_at + (lifetime - self.safety_margin).max(Duration::ZERO),
			(None, None) => return Err(TokenSetBuilderError::MissingExpiry),
		};

		Ok(TokenSet {
			access_token,
			refresh_token: self.refresh_token,
			expires_at,
			scopes: self.scopes,
			issued_at: Some(issued_at),
			revoked_at: None,
		})
	}
}

/// Timestamp (de)serialization for the token file.
///
/// Writes RFC 3339. Reads RFC 3339, naive ISO-8601 (taken as UTC), or epoch seconds.
pub(crate) mod timestamp {
	// crates.io
	use serde::{Deserializer, Serializer, de::Error as DeError};
	// self
	use super::*;

	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Raw {
		Seconds(i64),
		Fractional(f64),
		Text(String),
	}

	pub(crate) fn epoch() -> OffsetDateTime {
		OffsetDateTime::UNIX_EPOCH
	}

	pub(crate) fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let formatted = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;

		serializer.serialize_str(&formatted)
	}

	pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
	where
		D: Deserializer<'de>,
	{
		match <Option<Raw>>::deserialize(deserializer)? {
			// An expiry-less legacy file is treated as already expired.
			None => Ok(epoch()),
			Some(raw) => parse_raw(raw).map_err(DeError::custom),
		}
	}

	pub(crate) fn parse_text(raw: &str) -> Result<OffsetDateTime, String> {
		if let Ok(instant) = OffsetDateTime::parse(raw, &Rfc3339) {
			return Ok(instant);
		}
		if let Ok(instant) = OffsetDateTime::parse(raw, &Iso8601::DEFAULT) {
			return Ok(instant);
		}

		time::PrimitiveDateTime::parse(raw, &Iso8601::DEFAULT)
			.map(time::PrimitiveDateTime::assume_utc)
			.map_err(|e| format!("unsupported timestamp {raw:?}: {e}"))
	}

	fn parse_raw(raw: Raw) -> Result<OffsetDateTime, String> {
		match raw {
			Raw::Seconds(secs) => OffsetDateTime::from_unix_timestamp(secs)
				.map_err(|e| format!("epoch seconds out of range: {e}")),
			Raw::Fractional(secs) => OffsetDateTime::from_unix_timestamp(secs.trunc() as i64)
				.map_err(|e| format!("epoch seconds out of range: {e}")),
			Raw::Text(text) => parse_text(&text),
		}
	}

	pub(crate) mod option {
		// self
		use super::*;

		pub(crate) fn serialize<S>(
			value: &Option<OffsetDateTime>,
			serializer: S,
		) -> Result<S::Ok, S::Error>
		where
			S: Serializer,
		{
			match value {
				Some(instant) => super::serialize(instant, serializer),
				None => serializer.serialize_none(),
			}
		}

		pub(crate) fn deserialize<'de, D>(
			deserializer: D,
		) -> Result<Option<OffsetDateTime>, D::Error>
		where
			D: Deserializer<'de>,
		{
			<Option<Raw>>::deserialize(deserializer)?
				.map(parse_raw)
				.transpose()
				.map_err(DeError::custom)
		}
	}
}
