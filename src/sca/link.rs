//! SCA link formatting.
//!
//! Redirect templates carry `[CLIENT_ID]`, `[TPP_REDIRECT_URI]` and `[TPP_STATE]`; decoupled
//! deep links carry `[AUTOSTART_TOKEN]`. Substituted values are form-encoded so a redirect URI
//! with its own query survives as a single parameter.

// crates.io
use rand::{Rng, distr::Alphanumeric};
use url::form_urlencoded;
// self
use crate::{_prelude::*, sca::ScaError};

/// Client id placeholder in redirect templates.
pub const CLIENT_ID_PLACEHOLDER: &str = "[CLIENT_ID]";
/// Redirect URI placeholder in redirect templates.
pub const REDIRECT_URI_PLACEHOLDER: &str = "[TPP_REDIRECT_URI]";
/// State placeholder in redirect templates.
pub const STATE_PLACEHOLDER: &str = "[TPP_STATE]";
/// Challenge placeholder in decoupled deep-link templates.
pub const AUTOSTART_TOKEN_PLACEHOLDER: &str = "[AUTOSTART_TOKEN]";

const STATE_LEN: usize = 32;

/// Formats a redirect or OAuth-redirect template into the URL the PSU visits.
pub fn redirect_link(
	template: &str,
	client_id: &str,
	redirect_uri: &Url,
	state: &str,
) -> Result<Url> {
	let link = template
		.replace(CLIENT_ID_PLACEHOLDER, &encode(client_id))
		.replace(REDIRECT_URI_PLACEHOLDER, &encode(redirect_uri.as_str()))
		.replace(STATE_PLACEHOLDER, &encode(state));

	parse(link)
}

/// Formats the decoupled deep link embedding the raw challenge.
pub fn decoupled_link(template: &str, challenge: &str) -> Result<Url> {
	parse(template.replace(AUTOSTART_TOKEN_PLACEHOLDER, &encode(challenge)))
}

/// Opaque state token round-tripped through the OAuth redirect.
pub fn random_state() -> String {
	rand::rng().sample_iter(Alphanumeric).take(STATE_LEN).map(char::from).collect()
}

fn encode(value: &str) -> String {
	form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn parse(link: String) -> Result<Url> {
	match Url::parse(&link) {
		Ok(url) => Ok(url),
		Err(source) => Err(ScaError::InvalidScaLink { link, source }.into()),
	}
}
