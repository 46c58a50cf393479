//! Transport primitives shared by the token client and the payment API client.
//!
//! [`TokenHttpClient`] is the token client's only dependency on an HTTP stack. It hands out
//! [`AsyncHttpClient`] handles that the `oauth2` crate drives, each carrying a
//! [`ResponseMetadataSlot`] (so error mapping can see the HTTP status) and a set of extra headers
//! that are stamped onto the token request. The payment API uses [`ReqwestHttpClient`] directly
//! and reads every response into an [`ApiResponse`].

// std
use std::ops::Deref;
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
use reqwest::{Identity, Response};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	config::Settings,
	error::{ConfigError, TransportError},
};

/// Abstraction over HTTP transports capable of executing OAuth token exchanges while publishing
/// response metadata.
///
/// Implementations must be `Send + Sync + 'static` so they can be shared behind an `Arc`, and the
/// handles they return must own whatever state is required so request futures remain `Send`.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds a handle that records outcomes in `slot` and adds `headers` to every request.
	///
	/// Call [`ResponseMetadataSlot::take`] before submitting the request and
	/// [`ResponseMetadataSlot::store`] once a status is known.
	fn with_metadata(&self, slot: ResponseMetadataSlot, headers: HeaderMap) -> Self::Handle;
}

/// Captures metadata from the most recent HTTP response for downstream error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the endpoint, if available.
	pub status: Option<u16>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Token requests should not follow redirects; configure any custom [`ReqwestClient`]
/// accordingly before wrapping it.
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client for the configured environment.
	///
	/// Sets the user agent, disables redirect following, and loads the PEM client identity when a
	/// certificate is configured. Production refuses to build without one.
	pub fn from_settings(settings: &Settings) -> Result<Self> {
		let mut builder = ReqwestClient::builder()
			.user_agent(settings.user_agent.as_str())
			.redirect(reqwest::redirect::Policy::none());

		match &settings.client_certificate {
			Some(path) => {
				let pem = std::fs::read(path)
					.map_err(|e| ConfigError::certificate(path.display().to_string(), e))?;
				let identity = Identity::from_pem(&pem)
					.map_err(|e| ConfigError::certificate(path.display().to_string(), e))?;

				builder = builder.identity(identity);
			},
			None if settings.environment.requires_certificate() =>
				return Err(ConfigError::MissingCertificate.into()),
			None => {},
		}

		Ok(Self(builder.build().map_err(ConfigError::http_client_build)?))
	}

	/// Builds an instrumented handle that captures response metadata.
	pub(crate) fn instrumented(
		&self,
		slot: ResponseMetadataSlot,
		headers: HeaderMap,
	) -> InstrumentedHandle {
		InstrumentedHandle::new(self.0.clone(), slot, headers)
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl TokenHttpClient for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot, headers: HeaderMap) -> Self::Handle {
		self.instrumented(slot, headers)
	}
}

/// Instrumented adapter that implements [`AsyncHttpClient`] for reqwest.
pub(crate) struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
	headers: HeaderMap,
}

/// Handle returned by [`ReqwestHttpClient`] that satisfies [`TokenHttpClient`].
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
impl InstrumentedHandle {
	fn new(client: ReqwestClient, slot: ResponseMetadataSlot, headers: HeaderMap) -> Self {
		Self(Arc::new(InstrumentedHttpClient { client, slot, headers }))
	}
}
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let mut request: reqwest::Request = request.try_into().map_err(Box::new)?;

			for (name, value) in client.headers.iter() {
				request.headers_mut().insert(name.clone(), value.clone());
			}

			let response = client.client.execute(request).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();

			client.slot.store(ResponseMetadata { status: Some(status.as_u16()) });

			let mut body = response.bytes().await.map_err(Box::new)?.to_vec();

			if status.is_success() {
				body = default_token_type(body);
			}

			let mut response_new = HttpResponse::new(body);

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

// Token responses may omit `token_type`; the `oauth2` parser requires it.
fn default_token_type(body: Vec<u8>) -> Vec<u8> {
	let parsed = serde_json::from_slice::<serde_json::Map<String, serde_json::Value>>(&body);

	match parsed {
		Ok(mut fields) if !fields.contains_key("token_type") => {
			fields.insert("token_type".into(), "Bearer".into());

			serde_json::to_vec(&fields).unwrap_or(body)
		},
		_ => body,
	}
}

/// Fully-read payment API response: status, headers, and the raw body text.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw body text.
	pub body: String,
}
impl ApiResponse {
	/// Creates a response from its parts.
	pub fn new(status: u16, headers: HeaderMap, body: impl Into<String>) -> Self {
		Self { status, headers, body: body.into() }
	}

	/// Reads a reqwest response to completion.
	pub async fn read(operation: &'static str, response: Response) -> Result<Self> {
		let status = response.status().as_u16();
		let headers = response.headers().to_owned();
		let body =
			response.text().await.map_err(|e| TransportError::network(operation, e))?;

		Ok(Self { status, headers, body })
	}

	/// Returns true for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns the header value when present and valid UTF-8.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name).and_then(|value| value.to_str().ok())
	}

	/// Converts a non-success response into [`Error::Api`], keeping the body verbatim.
	pub fn error_for_status(self, operation: &'static str) -> Result<Self> {
		if self.is_success() {
			Ok(self)
		} else {
			Err(Error::Api { operation, status: self.status, body: self.body })
		}
	}

	/// Decodes the body, treating an empty body as `{}`.
	pub fn json<T>(&self, operation: &'static str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let raw = if self.body.trim().is_empty() { "{}" } else { self.body.as_str() };
		let mut de = serde_json::Deserializer::from_str(raw);

		serde_path_to_error::deserialize(&mut de).map_err(|source| Error::Decode { operation, source })
	}
}
