//! End-to-end payment run.

// self
use crate::{
	_prelude::*,
	api::{PaymentApi, PsuDataUpdate, RequestContext},
	auth::TokenProvider,
	config::{CatalogEntry, PaymentCatalog, Settings},
	obs::{self, FlowKind, FlowSpan},
	payment::{Payment, TransactionStatus},
	poll::{self, Cancellation, PollPolicy, PollStep},
	render::{AuthorizationCodeSource, FlowEvent, ScaPresenter},
	sca::{self, ScaFlowController, ScaFlowSettings, ScaMethod, ScaReport},
};

const PAYMENT_STATUS_OPERATION: &str = "payment status";

/// Run-wide inputs taken from configuration.
#[derive(Clone, Debug)]
pub struct RunSettings {
	/// PSU IP address forwarded on every call.
	pub psu_ip_address: String,
	/// PSU user agent forwarded on every call.
	pub psu_user_agent: Option<String>,
	/// Payment status polling.
	pub payment_poll: PollPolicy,
	/// SCA sub-flow inputs.
	pub sca: ScaFlowSettings,
}
impl RunSettings {
	/// Creates settings without a PSU user agent, polling payment status like SCA status.
	pub fn new(psu_ip_address: impl Into<String>, sca: ScaFlowSettings) -> Self {
		Self {
			psu_ip_address: psu_ip_address.into(),
			psu_user_agent: None,
			payment_poll: sca.poll_policy.clone(),
			sca,
		}
	}

	/// Extracts the run inputs from full settings.
	pub fn from_settings(settings: &Settings) -> Self {
		Self {
			psu_ip_address: settings.psu_ip_address.clone(),
			psu_user_agent: Some(settings.user_agent.clone()),
			payment_poll: settings.poll_policy(),
			sca: ScaFlowSettings::from_settings(settings),
		}
	}
}

/// Summary of a finished run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentReport {
	/// Payment id assigned by the API.
	pub payment_id: String,
	/// Authorisation id assigned by the API.
	pub authorisation_id: String,
	/// SCA method the run went through.
	pub sca_method: ScaMethod,
	/// SCA outcome and poll count.
	pub sca: ScaReport,
	/// Terminal transaction status; `None` when SCA failed and the status was never polled.
	pub transaction_status: Option<TransactionStatus>,
	/// Payment status reads performed.
	pub status_reads: u32,
}
impl PaymentReport {
	/// SCA finalised and the payment left the received state.
	pub fn is_success(&self) -> bool {
		self.sca.is_success() && self.transaction_status.is_some()
	}
}

/// Sequences token, creation, authorisation, SCA, and status polling for one payment.
#[derive(Clone)]
pub struct PaymentOrchestrator {
	tokens: Arc<dyn TokenProvider>,
	api: Arc<dyn PaymentApi>,
	presenter: Arc<dyn ScaPresenter>,
	sca: ScaFlowController,
	settings: RunSettings,
}
impl PaymentOrchestrator {
	/// Wires the orchestrator to its collaborators.
	pub fn new(
		tokens: Arc<dyn TokenProvider>,
		api: Arc<dyn PaymentApi>,
		presenter: Arc<dyn ScaPresenter>,
		codes: Arc<dyn AuthorizationCodeSource>,
		settings: RunSettings,
	) -> Self {
		let sca = ScaFlowController::new(
			tokens.clone(),
			api.clone(),
			presenter.clone(),
			codes,
			settings.sca.clone(),
		);

		Self { tokens, api, presenter, sca, settings }
	}

	/// Looks the payment up by name and runs it; an unknown name fails before any network call.
	pub async fn run_named(
		&self,
		catalog: &PaymentCatalog,
		name: &str,
		cancel: &Cancellation,
	) -> Result<PaymentReport> {
		let entry = catalog.get(name)?;

		tracing::info!(payment = name, bicfi = entry.bicfi.as_str(), "Starting payment run.");

		self.run(entry, cancel).await
	}

	/// Runs one payment to a terminal state.
	///
	/// Every step is awaited in order and any API failure aborts the run. A failed SCA is not an
	/// error: the report carries it and payment status is never polled.
	pub async fn run(&self, entry: &CatalogEntry, cancel: &Cancellation) -> Result<PaymentReport> {
		let span = FlowSpan::new(FlowKind::Payment, "run");
		let result = span.instrument(self.execute(entry, cancel)).await;

		obs::record_result(FlowKind::Payment, &result);

		result
	}

	async fn execute(&self, entry: &CatalogEntry, cancel: &Cancellation) -> Result<PaymentReport> {
		let scope = entry.scope();
		let token = self.tokens.client_credentials(&scope).await?;
		let mut ctx =
			RequestContext::new(token, &entry.bicfi, &self.settings.psu_ip_address)
				.with_corporate_id(entry.corporate_id());

		if let Some(user_agent) = &self.settings.psu_user_agent {
			ctx = ctx.with_user_agent(user_agent);
		}

		let mut payment = Payment::from_entry(entry);
		let created = self.api.create_payment(&ctx, &payment).await?;

		payment.set_payment_id(&created.payment_id)?;
		self.presenter.report(&FlowEvent::PaymentCreated { payment_id: created.payment_id });

		let authorisation = self.api.start_authorisation(&ctx, &payment).await?;

		payment.set_authorisation_id(&authorisation.authorisation_id)?;
		self.presenter.report(&FlowEvent::AuthorisationStarted {
			authorisation_id: authorisation.authorisation_id,
		});

		let update = PsuDataUpdate { authentication_method_id: entry.authentication_method_id.clone() };
		let resolution = FlowSpan::new(FlowKind::UpdatePsuData, "update")
			.instrument(async {
				let response = self.api.update_psu_data(&ctx, &payment, &update).await?;

				sca::resolve(&response)
			})
			.await;

		obs::record_result(FlowKind::UpdatePsuData, &resolution);
		payment.record_sca(resolution?)?;
		self.presenter.report(&FlowEvent::ScaResolved { method: payment.sca_method() });

		let sca = self.sca.complete(&mut payment, &scope, &mut ctx, cancel).await?;
		let (payment_id, authorisation_id) = (
			payment.require_payment_id()?.to_owned(),
			payment.require_authorisation_id()?.to_owned(),
		);

		if !sca.is_success() {
			tracing::warn!(payment_id = payment_id.as_str(), "SCA failed; payment was not authorised.");

			return Ok(PaymentReport {
				payment_id,
				authorisation_id,
				sca_method: payment.sca_method(),
				sca,
				transaction_status: None,
				status_reads: 0,
			});
		}

		let polled = self.poll_payment_status(&payment, &ctx, cancel).await?;

		tracing::info!(
			payment_id = payment_id.as_str(),
			status = polled.value.as_str(),
			"Payment reached a terminal status."
		);

		Ok(PaymentReport {
			payment_id,
			authorisation_id,
			sca_method: payment.sca_method(),
			sca,
			transaction_status: Some(polled.value),
			status_reads: polled.attempts,
		})
	}

	async fn poll_payment_status(
		&self,
		payment: &Payment,
		ctx: &RequestContext,
		cancel: &Cancellation,
	) -> Result<poll::Polled<TransactionStatus>> {
		let api = self.api.as_ref();
		let presenter = self.presenter.as_ref();
		let span = FlowSpan::new(FlowKind::PaymentStatus, "poll");
		let result = span
			.instrument(poll::poll_until(
				&self.settings.payment_poll,
				cancel,
				PAYMENT_STATUS_OPERATION,
				|attempt| async move {
					let status = api.payment_status(ctx, payment).await?;

					tracing::info!(attempt, status = status.as_str(), "Observed payment status.");
					presenter.report(&FlowEvent::TransactionStatus { status: status.clone(), attempt });

					Ok(if status.is_pending() { PollStep::Pending } else { PollStep::Done(status) })
				},
			))
			.await;

		obs::record_result(FlowKind::PaymentStatus, &result);

		result
	}
}
impl Debug for PaymentOrchestrator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PaymentOrchestrator")
			.field("sca", &self.sca)
			.field("settings", &self.settings)
			.finish()
	}
}
