//! `oauth2`-backed token client.
//!
//! [`AuthClient`] wraps a configured `oauth2` client and a [`TokenHttpClient`] transport. Client
//! secrets travel in the request body, as the authorization server expects `client_id` and
//! `client_secret` next to `grant_type` and `scope`. The code exchange additionally stamps the
//! payment context headers onto the token request so the issued token is bound to the payment
//! being authorised.

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AuthType, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, RedirectUrl, RequestTokenError, Scope, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicErrorResponseType, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	api::ApiFuture,
	auth::{AuthError, BearerToken, GrantType, PaymentContextHeaders, TokenProvider, TokenSecret},
	config::Settings,
	error::{ConfigError, TransportError},
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeTokenResponse = oauth2::basic::BasicTokenResponse;

/// Token client for the configured authorization server.
pub struct AuthClient<C = ReqwestHttpClient>
where
	C: ?Sized + TokenHttpClient,
{
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
	redirect_uri: RedirectUrl,
	client_id: String,
}
impl AuthClient<ReqwestHttpClient> {
	/// Builds a client from settings, reusing the provided reqwest transport.
	pub fn from_settings(settings: &Settings, http_client: ReqwestHttpClient) -> Result<Self> {
		let endpoints = settings.endpoints()?;

		Self::with_http_client(
			&endpoints.token,
			&settings.client_id,
			settings.client_secret()?,
			&settings.redirect_uri,
			http_client,
		)
	}
}
impl<C> AuthClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Creates a client over a caller-provided transport.
	pub fn with_http_client(
		token_url: &Url,
		client_id: &str,
		client_secret: &TokenSecret,
		redirect_uri: &Url,
		http_client: impl Into<Arc<C>>,
	) -> Result<Self> {
		let token_url = TokenUrl::new(token_url.to_string())
			.map_err(|source| ConfigError::InvalidUrl { field: "token_url", source })?;
		let redirect_uri = RedirectUrl::new(redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidUrl { field: "redirect_uri", source })?;
		let oauth_client = BasicClient::new(ClientId::new(client_id.to_owned()))
			.set_client_secret(ClientSecret::new(client_secret.expose().to_owned()))
			.set_token_uri(token_url)
			.set_auth_type(AuthType::RequestBody);

		Ok(Self {
			oauth_client,
			http_client: http_client.into(),
			redirect_uri,
			client_id: client_id.to_owned(),
		})
	}

	/// OAuth client identifier.
	pub fn client_id(&self) -> &str {
		&self.client_id
	}

	/// Performs the `client_credentials` grant.
	pub async fn request_client_credentials(&self, scope: &str) -> Result<BearerToken> {
		const KIND: FlowKind = FlowKind::ClientCredentials;

		let span = FlowSpan::new(KIND, "request_client_credentials");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let meta = ResponseMetadataSlot::default();
				let instrumented = self.http_client.with_metadata(meta.clone(), HeaderMap::new());
				let mut request = self.oauth_client.exchange_client_credentials();

				for value in scope.split_whitespace() {
					request = request.add_scope(Scope::new(value.to_owned()));
				}

				let response = request.request_async(&instrumented).await.map_err(|err| {
					map_request_error(GrantType::ClientCredentials, meta.take(), err)
				})?;

				Ok(map_token_response(&response))
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}

	/// Exchanges an authorization code for a token bound to the payment context.
	pub async fn request_code_exchange(
		&self,
		scope: &str,
		code: &str,
		context: &PaymentContextHeaders,
	) -> Result<BearerToken> {
		const KIND: FlowKind = FlowKind::AuthorizationCode;

		let span = FlowSpan::new(KIND, "request_code_exchange");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let meta = ResponseMetadataSlot::default();
				let instrumented =
					self.http_client.with_metadata(meta.clone(), context.to_header_map()?);
				let mut request = self
					.oauth_client
					.exchange_code(AuthorizationCode::new(code.to_owned()))
					.set_redirect_uri(Cow::Borrowed(&self.redirect_uri));

				if !scope.trim().is_empty() {
					request = request.add_extra_param("scope", scope.to_owned());
				}

				let response = request.request_async(&instrumented).await.map_err(|err| {
					map_request_error(GrantType::AuthorizationCode, meta.take(), err)
				})?;

				Ok(map_token_response(&response))
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}
}
impl<C> TokenProvider for AuthClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn client_credentials<'a>(&'a self, scope: &'a str) -> ApiFuture<'a, BearerToken> {
		Box::pin(self.request_client_credentials(scope))
	}

	fn exchange_code<'a>(
		&'a self,
		scope: &'a str,
		code: &'a str,
		context: &'a PaymentContextHeaders,
	) -> ApiFuture<'a, BearerToken> {
		Box::pin(self.request_code_exchange(scope, code, context))
	}
}
impl<C> Debug for AuthClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthClient")
			.field("client_id", &self.client_id)
			.field("redirect_uri", &self.redirect_uri.as_str())
			.finish()
	}
}

fn map_token_response(response: &FacadeTokenResponse) -> BearerToken {
	BearerToken::new(
		response.access_token().secret().to_owned(),
		response.token_type().as_ref(),
		OffsetDateTime::now_utc(),
		response.expires_in().map(|expires_in| expires_in.as_secs()),
	)
}

fn map_request_error<E>(
	grant: GrantType,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	let status = meta.and_then(|meta| meta.status);

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(grant, response, status),
		RequestTokenError::Request(error) => map_transport_error(error, status),
		RequestTokenError::Parse(source, _body) =>
			AuthError::TokenResponseParse { source, status }.into(),
		RequestTokenError::Other(message) => AuthError::TokenEndpoint { message, status }.into(),
	}
}

fn map_server_response_error(
	grant: GrantType,
	response: BasicErrorResponse,
	status: Option<u16>,
) -> Error {
	let reason = response
		.error_description()
		.cloned()
		.unwrap_or_else(|| response.error().as_ref().to_owned());

	match response.error() {
		BasicErrorResponseType::InvalidGrant => AuthError::InvalidGrant { grant, reason }.into(),
		BasicErrorResponseType::InvalidClient => AuthError::InvalidClient { reason }.into(),
		other => AuthError::Rejected {
			grant,
			code: other.as_ref().to_owned(),
			description: response.error_description().cloned(),
			status,
		}
		.into(),
	}
}

fn map_transport_error<E>(err: HttpClientError<E>, status: Option<u16>) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Reqwest(inner) => TransportError::network("token endpoint", *inner).into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => AuthError::TokenEndpoint { message, status }.into(),
		other => AuthError::TokenEndpoint {
			message: format!("Unhandled HTTP client error: {other}"),
			status,
		}
		.into(),
	}
}
