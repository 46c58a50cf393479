//! Crate-level error types shared by the API client, token client, SCA flow, and orchestrator.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration or input problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Token endpoint failure.
	#[error(transparent)]
	Auth(#[from] crate::auth::AuthError),
	/// SCA classification or flow failure.
	#[error(transparent)]
	Sca(#[from] crate::sca::ScaError),

	/// Payment API answered with a non-success status; the body is kept verbatim.
	#[error("The {operation} call failed with HTTP {status}: {body}")]
	Api {
		/// API operation label.
		operation: &'static str,
		/// HTTP status code.
		status: u16,
		/// Raw response body.
		body: String,
	},
	/// Payment API answered with a success status but an unexpected body.
	#[error("The {operation} response could not be decoded.")]
	Decode {
		/// API operation label.
		operation: &'static str,
		/// Structured parsing failure, including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// A call needs an identifier an earlier step has not assigned yet.
	#[error("Payment has no {field} yet.")]
	MissingIdentifier {
		/// Identifier name.
		field: &'static str,
	},
	/// An identifier was already assigned earlier in the run.
	#[error("Payment {field} is already assigned.")]
	IdentifierReassigned {
		/// Identifier name.
		field: &'static str,
	},
	/// Polling gave up before a terminal status was observed.
	#[error("Polling {operation} timed out after {attempts} attempts.")]
	Timeout {
		/// Polled operation label.
		operation: &'static str,
		/// Number of completed attempts.
		attempts: u32,
	},
	/// Polling was cancelled by the caller.
	#[error("Polling {operation} was cancelled.")]
	Cancelled {
		/// Polled operation label.
		operation: &'static str,
	},
}
impl Error {
	/// Returns true when the error came from an HTTP response with the provided status.
	pub fn is_api_status(&self, status: u16) -> bool {
		matches!(self, Self::Api { status: actual, .. } if *actual == status)
	}
}

/// Configuration and input failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// An endpoint or redirect URL cannot be parsed.
	#[error("The {field} URL is invalid.")]
	InvalidUrl {
		/// Settings field holding the URL.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A header value contains characters HTTP does not allow.
	#[error("The {header} header value is invalid.")]
	InvalidHeader {
		/// Header name.
		header: &'static str,
	},
	/// The named payment is not present in the catalog.
	#[error("Payment `{name}` was not found in the catalog.")]
	PaymentNotFound {
		/// Requested payment name.
		name: String,
	},
	/// A settings or catalog file could not be read.
	#[error("Unable to read {path}.")]
	Read {
		/// File path.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// A settings or catalog file is not valid JSON of the expected shape.
	#[error("Unable to parse {path}.")]
	Parse {
		/// File path.
		path: String,
		/// Structured parsing failure, including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The client certificate could not be loaded.
	#[error("Client certificate {path} could not be loaded.")]
	Certificate {
		/// Certificate path.
		path: String,
		/// Underlying failure.
		#[source]
		source: BoxError,
	},
	/// Production requires a client certificate.
	#[error("The production environment requires a client certificate.")]
	MissingCertificate,
	/// No client secret was configured.
	#[error("No client secret configured; set `client_secret` or PSD2_CLIENT_SECRET.")]
	MissingClientSecret,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Wraps a certificate loading failure.
	pub fn certificate(
		path: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Certificate { path: path.into(), source: Box::new(src) }
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {endpoint}.")]
	Network {
		/// Endpoint label (`token endpoint` or the API operation).
		endpoint: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: &'static str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}
}
