//! Payment initiation API contract: request context, call results, and the [`PaymentApi`] seam.

pub mod client;
pub mod model;

pub use client::*;
pub use model::*;

// crates.io
use uuid::Uuid;
// self
use crate::{
	_prelude::*,
	auth::{BearerToken, header_value},
	http::ApiResponse,
	payment::{Payment, TransactionStatus},
	sca::ScaStatus,
};

/// Boxed future returned by the collaborator traits.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Header carrying the bank identifier.
pub const BICFI_HEADER: &str = "X-BicFi";
/// Header carrying the PSU's IP address.
pub const PSU_IP_ADDRESS_HEADER: &str = "PSU-IP-Address";
/// Header carrying a fresh id per request.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";
/// Header carrying the corporate id for corporate PSUs.
pub const PSU_CORPORATE_ID_HEADER: &str = "PSU-Corporate-Id";
/// Header carrying the PSU's user agent.
pub const PSU_USER_AGENT_HEADER: &str = "PSU-User-Agent";

/// Per-run request context: the current token plus the PSU headers every call carries.
#[derive(Clone, Debug)]
pub struct RequestContext {
	/// Bearer token attached to every call; replaced after an OAuth code exchange.
	pub token: BearerToken,
	/// Bank identifier code.
	pub bicfi: String,
	/// PSU IP address.
	pub psu_ip_address: String,
	/// PSU user agent, when known.
	pub psu_user_agent: Option<String>,
	/// PSU corporate id, for corporate payments.
	pub psu_corporate_id: Option<String>,
}
impl RequestContext {
	/// Creates a context without the optional PSU headers.
	pub fn new(
		token: BearerToken,
		bicfi: impl Into<String>,
		psu_ip_address: impl Into<String>,
	) -> Self {
		Self {
			token,
			bicfi: bicfi.into(),
			psu_ip_address: psu_ip_address.into(),
			psu_user_agent: None,
			psu_corporate_id: None,
		}
	}

	/// Sets the PSU user agent.
	pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.psu_user_agent = Some(user_agent.into());

		self
	}

	/// Sets the PSU corporate id.
	pub fn with_corporate_id(mut self, corporate_id: Option<impl Into<String>>) -> Self {
		self.psu_corporate_id = corporate_id.map(Into::into);

		self
	}

	/// Swaps in a new bearer token.
	pub fn replace_token(&mut self, token: BearerToken) {
		self.token = token;
	}

	/// Headers for one request, including a fresh `X-Request-ID`.
	pub fn headers(&self) -> Result<HeaderMap> {
		let mut headers = HeaderMap::new();

		headers.insert(
			reqwest::header::AUTHORIZATION,
			header_value("Authorization", &self.token.authorization())?,
		);
		headers.insert(HeaderName::from_static("x-bicfi"), header_value(BICFI_HEADER, &self.bicfi)?);
		headers.insert(
			HeaderName::from_static("psu-ip-address"),
			header_value(PSU_IP_ADDRESS_HEADER, &self.psu_ip_address)?,
		);
		headers.insert(
			HeaderName::from_static("x-request-id"),
			header_value(REQUEST_ID_HEADER, &Uuid::new_v4().to_string())?,
		);

		if let Some(corporate_id) = &self.psu_corporate_id {
			headers.insert(
				HeaderName::from_static("psu-corporate-id"),
				header_value(PSU_CORPORATE_ID_HEADER, corporate_id)?,
			);
		}
		if let Some(user_agent) = &self.psu_user_agent {
			headers.insert(
				HeaderName::from_static("psu-user-agent"),
				header_value(PSU_USER_AGENT_HEADER, user_agent)?,
			);
		}

		Ok(headers)
	}
}

/// Result of a successful payment creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentCreated {
	/// Identifier assigned by the API.
	pub payment_id: String,
	/// Initial transaction status, if reported.
	pub transaction_status: Option<TransactionStatus>,
}

/// Result of a successful authorisation creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorisationCreated {
	/// Identifier assigned by the API.
	pub authorisation_id: String,
	/// Initial SCA status, if reported.
	pub sca_status: Option<ScaStatus>,
}

/// Body of the update-PSU-data call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PsuDataUpdate {
	/// SCA method the PSU picks; omitted when the bank decides.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub authentication_method_id: Option<String>,
}

/// Payment initiation API used by the orchestrator and the SCA flow.
///
/// Every method except [`PaymentApi::update_psu_data`] fails with [`Error::Api`] on a non-success
/// status. The PSU-data update hands back the raw response because SCA classification needs its
/// headers and decides itself how to treat a failure.
pub trait PaymentApi
where
	Self: Send + Sync,
{
	/// Creates the payment.
	fn create_payment<'a>(
		&'a self,
		ctx: &'a RequestContext,
		payment: &'a Payment,
	) -> ApiFuture<'a, PaymentCreated>;

	/// Starts an authorisation for the created payment.
	fn start_authorisation<'a>(
		&'a self,
		ctx: &'a RequestContext,
		payment: &'a Payment,
	) -> ApiFuture<'a, AuthorisationCreated>;

	/// Updates PSU data for the running authorisation.
	fn update_psu_data<'a>(
		&'a self,
		ctx: &'a RequestContext,
		payment: &'a Payment,
		update: &'a PsuDataUpdate,
	) -> ApiFuture<'a, ApiResponse>;

	/// Reads the SCA status of the running authorisation.
	fn sca_status<'a>(
		&'a self,
		ctx: &'a RequestContext,
		payment: &'a Payment,
	) -> ApiFuture<'a, ScaStatus>;

	/// Reads the transaction status of the payment.
	fn payment_status<'a>(
		&'a self,
		ctx: &'a RequestContext,
		payment: &'a Payment,
	) -> ApiFuture<'a, TransactionStatus>;
}
