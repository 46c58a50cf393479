//! Token acquisition: client-credentials for API access and code exchange after OAuth SCA.

pub mod client;
pub mod secret;
pub mod token;

pub use client::*;
pub use secret::*;
pub use token::*;

// self
use crate::{_prelude::*, api::ApiFuture, error::ConfigError};

/// Header carrying the payment id on the code exchange.
pub const PAYMENT_ID_HEADER: &str = "X-PaymentId";
/// Header carrying the authorisation id on the code exchange.
pub const PAYMENT_AUTHORISATION_ID_HEADER: &str = "X-PaymentAuthorisationId";

/// OAuth 2.0 grant types used against the authorization server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Authorization Code grant, used after OAuth-redirect SCA.
	AuthorizationCode,
	/// Client Credentials grant for API access.
	ClientCredentials,
}
impl GrantType {
	/// Returns the RFC 6749 identifier for the grant type.
	pub fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::ClientCredentials => "client_credentials",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Token endpoint failures.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// Server rejected the grant (bad or reused code).
	#[error("Authorization server rejected the {grant} grant: {reason}")]
	InvalidGrant {
		/// Grant label.
		grant: GrantType,
		/// Server-supplied reason.
		reason: String,
	},
	/// Client authentication failed.
	#[error("Client authentication failed: {reason}")]
	InvalidClient {
		/// Server-supplied reason.
		reason: String,
	},
	/// Any other OAuth error code.
	#[error("Authorization server returned `{code}` for the {grant} grant.")]
	Rejected {
		/// Grant label.
		grant: GrantType,
		/// OAuth `error` field.
		code: String,
		/// OAuth `error_description` field.
		description: Option<String>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Server answered with something the OAuth client could not interpret.
	#[error("Token endpoint returned an unexpected response: {message}")]
	TokenEndpoint {
		/// Failure summary.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint responded with malformed JSON.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Payment identifiers the code exchange binds the new token to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentContextHeaders {
	/// Payment id assigned at creation.
	pub payment_id: String,
	/// Authorisation id of the running SCA.
	pub authorisation_id: String,
}
impl PaymentContextHeaders {
	/// Creates the header pair.
	pub fn new(payment_id: impl Into<String>, authorisation_id: impl Into<String>) -> Self {
		Self { payment_id: payment_id.into(), authorisation_id: authorisation_id.into() }
	}

	/// Renders the pair as HTTP headers.
	pub fn to_header_map(&self) -> Result<HeaderMap> {
		let mut headers = HeaderMap::new();

		headers.insert(
			HeaderName::from_static("x-paymentid"),
			header_value(PAYMENT_ID_HEADER, &self.payment_id)?,
		);
		headers.insert(
			HeaderName::from_static("x-paymentauthorisationid"),
			header_value(PAYMENT_AUTHORISATION_ID_HEADER, &self.authorisation_id)?,
		);

		Ok(headers)
	}
}

/// Source of bearer tokens for the payment flow.
pub trait TokenProvider
where
	Self: Send + Sync,
{
	/// Performs the client-credentials grant for `scope`.
	fn client_credentials<'a>(&'a self, scope: &'a str) -> ApiFuture<'a, BearerToken>;

	/// Exchanges an authorization code, binding the token to the payment context.
	fn exchange_code<'a>(
		&'a self,
		scope: &'a str,
		code: &'a str,
		context: &'a PaymentContextHeaders,
	) -> ApiFuture<'a, BearerToken>;
}

pub(crate) fn header_value(header: &'static str, value: &str) -> Result<HeaderValue> {
	HeaderValue::from_str(value).map_err(|_| ConfigError::InvalidHeader { header }.into())
}
