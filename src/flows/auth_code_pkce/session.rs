// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, auth::ScopeSet};

const STATE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;

/// Supported PKCE challenge methods surfaced via [`PkceChallenge`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Handshake material created when an authorization starts.
///
/// Callers keep it until the redirect arrives and hand it back to
/// [`Authorizer::complete_authorization`](crate::flows::Authorizer::complete_authorization).
#[derive(Clone)]
pub struct PkceChallenge {
	/// PKCE code challenge derived from the secret verifier.
	pub challenge: String,
	/// Opaque state value that must round-trip via the redirect.
	pub state: String,
	/// PKCE challenge method (always `S256`).
	pub method: PkceCodeChallengeMethod,
	/// Redirect URI placed in the authorization URL.
	pub redirect_uri: Url,
	/// Scopes requested in the authorization URL.
	pub scopes: ScopeSet,
	verifier: String,
}
impl PkceChallenge {
	pub(crate) fn generate(redirect_uri: Url, scopes: ScopeSet) -> Self {
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let challenge = compute_pkce_challenge(&verifier);

		Self {
			challenge,
			state: random_string(STATE_LEN),
			method: PkceCodeChallengeMethod::S256,
			redirect_uri,
			scopes,
			verifier,
		}
	}

	/// Secret verifier sent with the code exchange. Callers must avoid logging it.
	pub fn verifier(&self) -> &str {
		&self.verifier
	}

	/// Validates the returned `state` parameter after the authorization redirect.
	pub fn validate_state(&self, returned_state: &str) -> Result<()> {
		if returned_state == self.state {
			Ok(())
		} else {
			Err(Error::authentication("Authorization state mismatch"))
		}
	}
}
impl Debug for PkceChallenge {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PkceChallenge")
			.field("challenge", &self.challenge)
			.field("state", &self.state)
			.field("method", &self.method)
			.field("redirect_uri", &self.redirect_uri.as_str())
			.field("scopes", &self.scopes)
			.field("verifier", &"<redacted>")
			.finish()
	}
}

pub(super) fn build_authorize_url(
	endpoint: Url,
	client_id: &str,
	challenge: &PkceChallenge,
) -> Url {
	let mut url = endpoint;
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", client_id);
	pairs.append_pair("redirect_uri", challenge.redirect_uri.as_str());

	if !challenge.scopes.is_empty() {
		pairs.append_pair("scope", &challenge.scopes.normalized());
	}

	pairs.append_pair("state", &challenge.state);
	pairs.append_pair("code_challenge", &challenge.challenge);
	pairs.append_pair("code_challenge_method", challenge.method.as_str());

	drop(pairs);

	url
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

pub(super) fn compute_pkce_challenge(verifier: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(verifier.as_bytes());
	let digest = hasher.finalize();
	URL_SAFE_NO_PAD.encode(digest)
}
