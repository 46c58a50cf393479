//! Strong Customer Authentication: method classification and the completion state machine.

pub mod flow;
pub mod link;
pub mod resolver;

pub use flow::*;
pub use link::*;
pub use resolver::*;

// self
use crate::_prelude::*;

/// Response header advertising the SCA approach.
pub const SCA_APPROACH_HEADER: &str = "aspsp-sca-approach";

/// SCA method a payment's authorisation resolves to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScaMethod {
	#[default]
	/// Nothing recognizable was advertised.
	Undefined,
	/// Redirect to an OAuth authorize URL, then exchange the returned code.
	OAuthRedirect,
	/// Plain redirect; the bank reports completion through the SCA status.
	Redirect,
	/// Out-of-band confirmation on another device.
	Decoupled,
}
impl ScaMethod {
	/// Returns a stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			ScaMethod::Undefined => "undefined",
			ScaMethod::OAuthRedirect => "oauth_redirect",
			ScaMethod::Redirect => "redirect",
			ScaMethod::Decoupled => "decoupled",
		}
	}

	/// Whether a sub-flow exists for this method.
	pub const fn is_defined(self) -> bool {
		!matches!(self, ScaMethod::Undefined)
	}
}
impl Display for ScaMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Approach advertised through [`SCA_APPROACH_HEADER`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScaApproach {
	/// `REDIRECT`.
	Redirect,
	/// `DECOUPLED`.
	Decoupled,
	/// Any other value, kept verbatim.
	Other(String),
}
impl ScaApproach {
	/// Classifies a header value; the match is case-sensitive.
	pub fn parse(value: &str) -> Self {
		match value {
			"REDIRECT" => ScaApproach::Redirect,
			"DECOUPLED" => ScaApproach::Decoupled,
			other => ScaApproach::Other(other.to_owned()),
		}
	}
}

/// Terminal result of the SCA sub-flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScaOutcome {
	/// SCA completed.
	Finalised,
	/// SCA failed or was abandoned.
	Failed,
}
impl ScaOutcome {
	/// True for [`ScaOutcome::Finalised`].
	pub const fn is_success(self) -> bool {
		matches!(self, ScaOutcome::Finalised)
	}
}

/// SCA status string reported by the API.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScaStatus(String);
impl ScaStatus {
	/// Terminal success status.
	pub const FINALISED: &'static str = "finalised";
	/// Terminal failure status.
	pub const FAILED: &'static str = "failed";

	/// Wraps a status value.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Raw status value.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Terminal outcome, or `None` while SCA is still running. Unknown values are non-terminal.
	pub fn outcome(&self) -> Option<ScaOutcome> {
		match self.0.as_str() {
			Self::FINALISED => Some(ScaOutcome::Finalised),
			Self::FAILED => Some(ScaOutcome::Failed),
			_ => None,
		}
	}
}
impl Display for ScaStatus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// SCA classification and flow failures.
#[derive(Debug, ThisError)]
pub enum ScaError {
	/// Update-PSU-data answered with a non-success status; the body is kept verbatim.
	#[error("Update PSU data failed with HTTP {status}: {body}")]
	MalformedResponse {
		/// HTTP status code.
		status: u16,
		/// Raw response body.
		body: String,
	},
	/// The response carried no SCA approach header.
	#[error("The response does not advertise an SCA approach.")]
	UnknownScaApproach,
	/// No sub-flow exists for the resolved method.
	#[error("No usable SCA method was advertised; cannot continue.")]
	UndefinedMethod,
	/// The payment already has a resolved SCA method.
	#[error("SCA method is already resolved to {method}.")]
	AlreadyResolved {
		/// Method resolved earlier in the run.
		method: ScaMethod,
	},
	/// The SCA sub-flow already reached a terminal outcome for this payment.
	#[error("SCA already completed as {outcome:?}.")]
	AlreadyCompleted {
		/// Outcome recorded by the earlier run.
		outcome: ScaOutcome,
	},
	/// The SCA link does not form a valid URL after substitution.
	#[error("SCA link `{link}` is not a valid URL.")]
	InvalidScaLink {
		/// Link after placeholder substitution.
		link: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn only_finalised_and_failed_are_terminal() {
		assert_eq!(ScaStatus::new("finalised").outcome(), Some(ScaOutcome::Finalised));
		assert_eq!(ScaStatus::new("failed").outcome(), Some(ScaOutcome::Failed));

		for status in ["received", "started", "scaMethodSelected", "Finalised", "exempted", ""] {
			assert_eq!(ScaStatus::new(status).outcome(), None, "{status} must keep polling.");
		}
	}

	#[test]
	fn approach_matching_is_case_sensitive() {
		assert_eq!(ScaApproach::parse("REDIRECT"), ScaApproach::Redirect);
		assert_eq!(ScaApproach::parse("DECOUPLED"), ScaApproach::Decoupled);
		assert_eq!(ScaApproach::parse("redirect"), ScaApproach::Other("redirect".into()));
	}
}
