//! Classifies the SCA method from an update-PSU-data response.
//!
//! Priority for `REDIRECT` is the OAuth link, then the plain redirect link, then
//! [`ScaMethod::Undefined`]. `DECOUPLED` takes the first challenge value. Anything unrecognized
//! is `Undefined` with empty data; deciding whether that is fatal is the caller's business.

// self
use crate::{
	_prelude::*,
	api::UpdatePsuDataResponse,
	http::ApiResponse,
	sca::{SCA_APPROACH_HEADER, ScaApproach, ScaError, ScaMethod},
};

const OPERATION: &str = "update PSU data";

/// Method plus its payload (URL template or challenge token).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScaResolution {
	/// Resolved method.
	pub method: ScaMethod,
	/// Method-specific data; empty for [`ScaMethod::Undefined`].
	pub data: String,
}
impl ScaResolution {
	/// Creates a resolution.
	pub fn new(method: ScaMethod, data: impl Into<String>) -> Self {
		Self { method, data: data.into() }
	}

	/// The `(Undefined, "")` resolution.
	pub fn undefined() -> Self {
		Self::default()
	}
}

/// Resolves the SCA method from the raw update-PSU-data response.
pub fn resolve(response: &ApiResponse) -> Result<ScaResolution> {
	if !response.is_success() {
		return Err(ScaError::MalformedResponse {
			status: response.status,
			body: response.body.clone(),
		}
		.into());
	}

	let approach = response
		.header(SCA_APPROACH_HEADER)
		.map(ScaApproach::parse)
		.ok_or(ScaError::UnknownScaApproach)?;
	let resolution = match approach {
		ScaApproach::Redirect => resolve_redirect(&response.json(OPERATION)?),
		ScaApproach::Decoupled => resolve_decoupled(&response.json(OPERATION)?),
		ScaApproach::Other(value) => {
			tracing::warn!(approach = value.as_str(), "Unrecognized SCA approach.");

			ScaResolution::undefined()
		},
	};

	tracing::debug!(method = %resolution.method, "Resolved SCA method.");

	Ok(resolution)
}

fn resolve_redirect(body: &UpdatePsuDataResponse) -> ScaResolution {
	if let Some(link) = &body.links.sca_oauth {
		return ScaResolution::new(ScaMethod::OAuthRedirect, link.href.as_str());
	}
	if let Some(link) = &body.links.sca_redirect {
		return ScaResolution::new(ScaMethod::Redirect, link.href.as_str());
	}

	ScaResolution::undefined()
}

fn resolve_decoupled(body: &UpdatePsuDataResponse) -> ScaResolution {
	match body.challenge() {
		Some(challenge) => ScaResolution::new(ScaMethod::Decoupled, challenge),
		None => ScaResolution::undefined(),
	}
}
