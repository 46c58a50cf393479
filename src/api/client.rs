//! reqwest-backed [`PaymentApi`] implementation.

// crates.io
use reqwest::Method;
// self
use crate::{
	_prelude::*,
	api::{
		ApiFuture, AuthorisationCreated, PaymentApi, PaymentCreated, PaymentInitiationResponse,
		PaymentStatusResponse, PsuDataUpdate, RequestContext, ScaStatusResponse,
		StartAuthorisationResponse,
	},
	config::Settings,
	error::{ConfigError, TransportError},
	http::{ApiResponse, ReqwestHttpClient},
	obs::{self, FlowKind, FlowSpan},
	payment::{Payment, TransactionStatus},
	sca::ScaStatus,
};

/// Path of the payment initiation API below the API host.
pub const PAYMENT_INITIATION_PATH: &str = "psd2/paymentinitiation/v1/";

/// Client for the payment initiation endpoints.
#[derive(Clone, Debug)]
pub struct PaymentApiClient {
	http_client: ReqwestHttpClient,
	base: Url,
}
impl PaymentApiClient {
	/// Creates a client rooted at `api_url`.
	pub fn new(api_url: &Url, http_client: ReqwestHttpClient) -> Result<Self> {
		let base = api_url
			.join(PAYMENT_INITIATION_PATH)
			.map_err(|source| ConfigError::InvalidUrl { field: "api_url", source })?;

		Ok(Self { http_client, base })
	}

	/// Creates a client for the configured environment.
	pub fn from_settings(settings: &Settings, http_client: ReqwestHttpClient) -> Result<Self> {
		Self::new(&settings.endpoints()?.api, http_client)
	}

	/// Root of the payment initiation API.
	pub fn base_url(&self) -> &Url {
		&self.base
	}

	fn url(&self, segments: &[&str]) -> Result<Url> {
		let mut url = self.base.clone();

		url.path_segments_mut()
			.map_err(|_| ConfigError::InvalidUrl {
				field: "api_url",
				source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
			})?
			.pop_if_empty()
			.extend(segments);

		Ok(url)
	}

	async fn send<B>(
		&self,
		operation: &'static str,
		method: Method,
		url: Url,
		ctx: &RequestContext,
		body: Option<&B>,
	) -> Result<ApiResponse>
	where
		B: ?Sized + Serialize,
	{
		tracing::debug!(operation, %method, %url, "Calling payment API.");

		let mut request = self.http_client.request(method, url).headers(ctx.headers()?);

		if let Some(body) = body {
			request = request.json(body);
		}

		let response =
			request.send().await.map_err(|e| TransportError::network(operation, e))?;
		let response = ApiResponse::read(operation, response).await?;

		tracing::debug!(operation, status = response.status, "Payment API responded.");

		Ok(response)
	}

	/// Creates the payment.
	pub async fn create(&self, ctx: &RequestContext, payment: &Payment) -> Result<PaymentCreated> {
		const OPERATION: &str = "create payment";

		let span = FlowSpan::new(FlowKind::CreatePayment, "create");
		let result = span
			.instrument(async move {
				let url = self.url(&[payment.service.as_str(), payment.product.as_str()])?;
				let body: PaymentInitiationResponse = self
					.send(OPERATION, Method::POST, url, ctx, Some(&payment.body))
					.await?
					.error_for_status(OPERATION)?
					.json(OPERATION)?;

				Ok(PaymentCreated {
					payment_id: body.payment_id,
					transaction_status: body.transaction_status.map(TransactionStatus::new),
				})
			})
			.await;

		obs::record_result(FlowKind::CreatePayment, &result);

		result
	}

	/// Starts an authorisation for the payment.
	pub async fn start(
		&self,
		ctx: &RequestContext,
		payment: &Payment,
	) -> Result<AuthorisationCreated> {
		const OPERATION: &str = "start authorisation";

		let span = FlowSpan::new(FlowKind::StartAuthorisation, "start");
		let result = span
			.instrument(async move {
				let payment_id = payment.require_payment_id()?;
				let url = self.url(&[
					payment.service.as_str(),
					payment.product.as_str(),
					payment_id,
					"authorisations",
				])?;
				let body: StartAuthorisationResponse = self
					.send(OPERATION, Method::POST, url, ctx, Some(&serde_json::json!({})))
					.await?
					.error_for_status(OPERATION)?
					.json(OPERATION)?;

				Ok(AuthorisationCreated {
					authorisation_id: body.authorisation_id,
					sca_status: body.sca_status.map(ScaStatus::new),
				})
			})
			.await;

		obs::record_result(FlowKind::StartAuthorisation, &result);

		result
	}

	/// Updates PSU data and returns the raw response for SCA classification.
	pub async fn update(
		&self,
		ctx: &RequestContext,
		payment: &Payment,
		update: &PsuDataUpdate,
	) -> Result<ApiResponse> {
		const OPERATION: &str = "update PSU data";

		let payment_id = payment.require_payment_id()?;
		let authorisation_id = payment.require_authorisation_id()?;
		let url = self.url(&[
			payment.service.as_str(),
			payment.product.as_str(),
			payment_id,
			"authorisations",
			authorisation_id,
		])?;

		self.send(OPERATION, Method::PUT, url, ctx, Some(update)).await
	}

	/// Reads the SCA status of the running authorisation.
	pub async fn read_sca_status(
		&self,
		ctx: &RequestContext,
		payment: &Payment,
	) -> Result<ScaStatus> {
		const OPERATION: &str = "get SCA status";

		let payment_id = payment.require_payment_id()?;
		let authorisation_id = payment.require_authorisation_id()?;
		let url = self.url(&[
			payment.service.as_str(),
			payment.product.as_str(),
			payment_id,
			"authorisations",
			authorisation_id,
		])?;
		let body: ScaStatusResponse = self
			.send::<()>(OPERATION, Method::GET, url, ctx, None)
			.await?
			.error_for_status(OPERATION)?
			.json(OPERATION)?;

		Ok(ScaStatus::new(body.sca_status))
	}

	/// Reads the transaction status of the payment.
	pub async fn read_payment_status(
		&self,
		ctx: &RequestContext,
		payment: &Payment,
	) -> Result<TransactionStatus> {
		const OPERATION: &str = "get payment status";

		let payment_id = payment.require_payment_id()?;
		let url = self.url(&[
			payment.service.as_str(),
			payment.product.as_str(),
			payment_id,
			"status",
		])?;
		let body: PaymentStatusResponse = self
			.send::<()>(OPERATION, Method::GET, url, ctx, None)
			.await?
			.error_for_status(OPERATION)?
			.json(OPERATION)?;

		Ok(TransactionStatus::new(body.transaction_status))
	}
}
impl PaymentApi for PaymentApiClient {
	fn create_payment<'a>(
		&'a self,
		ctx: &'a RequestContext,
		payment: &'a Payment,
	) -> ApiFuture<'a, PaymentCreated> {
		Box::pin(self.create(ctx, payment))
	}

	fn start_authorisation<'a>(
		&'a self,
		ctx: &'a RequestContext,
		payment: &'a Payment,
	) -> ApiFuture<'a, AuthorisationCreated> {
		Box::pin(self.start(ctx, payment))
	}

	fn update_psu_data<'a>(
		&'a self,
		ctx: &'a RequestContext,
		payment: &'a Payment,
		update: &'a PsuDataUpdate,
	) -> ApiFuture<'a, ApiResponse> {
		Box::pin(self.update(ctx, payment, update))
	}

	fn sca_status<'a>(
		&'a self,
		ctx: &'a RequestContext,
		payment: &'a Payment,
	) -> ApiFuture<'a, ScaStatus> {
		Box::pin(self.read_sca_status(ctx, payment))
	}

	fn payment_status<'a>(
		&'a self,
		ctx: &'a RequestContext,
		payment: &'a Payment,
	) -> ApiFuture<'a, TransactionStatus> {
		Box::pin(self.read_payment_status(ctx, payment))
	}
}
