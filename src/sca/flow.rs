//! SCA completion state machine.
//!
//! `Resolved(method) -> InProgress -> Finalised | Failed`. An OAuth redirect may fail before
//! `InProgress` when no code comes back or the code exchange does not yield a token; every
//! other path ends by polling the SCA status until it is terminal.

// self
use crate::{
	_prelude::*,
	api::{PaymentApi, RequestContext},
	auth::{PaymentContextHeaders, TokenProvider},
	config::Settings,
	obs::{self, FlowKind, FlowSpan},
	payment::Payment,
	poll::{self, Cancellation, PollPolicy, PollStep},
	render::{AuthorizationCodeSource, FlowEvent, ScaPresenter},
	sca::{self, ScaError, ScaMethod, ScaOutcome},
};

const OPERATION: &str = "SCA status";

/// States of the SCA sub-flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaFlowState {
	/// Method resolved; the sub-flow has not produced anything yet.
	Resolved(ScaMethod),
	/// Waiting for a terminal SCA status.
	InProgress,
	/// SCA succeeded.
	Finalised,
	/// SCA failed.
	Failed,
}
impl ScaFlowState {
	/// Whether the sub-flow is over.
	pub const fn is_terminal(self) -> bool {
		matches!(self, ScaFlowState::Finalised | ScaFlowState::Failed)
	}
}
impl From<ScaOutcome> for ScaFlowState {
	fn from(value: ScaOutcome) -> Self {
		match value {
			ScaOutcome::Finalised => ScaFlowState::Finalised,
			ScaOutcome::Failed => ScaFlowState::Failed,
		}
	}
}

/// Terminal outcome plus the number of SCA status polls it took.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScaReport {
	/// Terminal outcome.
	pub outcome: ScaOutcome,
	/// SCA status polls performed; zero when the flow failed before polling.
	pub polls: u32,
}
impl ScaReport {
	/// True when SCA finalised.
	pub const fn is_success(&self) -> bool {
		self.outcome.is_success()
	}
}

/// Inputs of the SCA sub-flow that come from configuration.
#[derive(Clone, Debug)]
pub struct ScaFlowSettings {
	/// OAuth client id substituted into redirect templates.
	pub client_id: String,
	/// Redirect URI substituted into redirect templates and sent on code exchange.
	pub redirect_uri: Url,
	/// Fixed OAuth state; a random one is drawn per flow when `None`.
	pub state: Option<String>,
	/// Decoupled deep-link template.
	pub decoupled_link_template: String,
	/// SCA status polling.
	pub poll_policy: PollPolicy,
}
impl ScaFlowSettings {
	/// Creates settings with the default deep-link template and polling policy.
	pub fn new(client_id: impl Into<String>, redirect_uri: Url) -> Self {
		Self {
			client_id: client_id.into(),
			redirect_uri,
			state: None,
			decoupled_link_template: crate::config::DEFAULT_DECOUPLED_LINK_TEMPLATE.into(),
			poll_policy: PollPolicy::default(),
		}
	}

	/// Extracts the SCA inputs from full settings.
	pub fn from_settings(settings: &Settings) -> Self {
		Self {
			client_id: settings.client_id.clone(),
			redirect_uri: settings.redirect_uri.clone(),
			state: settings.state.clone(),
			decoupled_link_template: settings.decoupled_link_template.clone(),
			poll_policy: settings.poll_policy(),
		}
	}

	/// Pins the OAuth state token.
	pub fn with_state(mut self, state: impl Into<String>) -> Self {
		self.state = Some(state.into());

		self
	}

	/// Overrides SCA status polling.
	pub fn with_poll_policy(mut self, poll_policy: PollPolicy) -> Self {
		self.poll_policy = poll_policy;

		self
	}
}

/// Drives a resolved SCA method to a terminal outcome.
#[derive(Clone)]
pub struct ScaFlowController {
	tokens: Arc<dyn TokenProvider>,
	api: Arc<dyn PaymentApi>,
	presenter: Arc<dyn ScaPresenter>,
	codes: Arc<dyn AuthorizationCodeSource>,
	settings: ScaFlowSettings,
}
impl ScaFlowController {
	/// Wires the controller to its collaborators.
	pub fn new(
		tokens: Arc<dyn TokenProvider>,
		api: Arc<dyn PaymentApi>,
		presenter: Arc<dyn ScaPresenter>,
		codes: Arc<dyn AuthorizationCodeSource>,
		settings: ScaFlowSettings,
	) -> Self {
		Self { tokens, api, presenter, codes, settings }
	}

	/// Settings in use.
	pub fn settings(&self) -> &ScaFlowSettings {
		&self.settings
	}

	/// Runs the sub-flow for the payment's resolved method and records its outcome on `payment`.
	///
	/// `scope` is requested again on the OAuth code exchange; a successful exchange replaces the
	/// token in `ctx`. [`ScaMethod::Undefined`] fails with [`ScaError::UndefinedMethod`] and a
	/// payment with a recorded outcome fails with [`ScaError::AlreadyCompleted`], both before
	/// anything is rendered or polled.
	pub async fn complete(
		&self,
		payment: &mut Payment,
		scope: &str,
		ctx: &mut RequestContext,
		cancel: &Cancellation,
	) -> Result<ScaReport> {
		let span = FlowSpan::new(FlowKind::Sca, "complete");
		let result = span.instrument(self.run(payment, scope, ctx, cancel)).await;

		obs::record_result(FlowKind::Sca, &result);

		result
	}

	async fn run(
		&self,
		payment: &mut Payment,
		scope: &str,
		ctx: &mut RequestContext,
		cancel: &Cancellation,
	) -> Result<ScaReport> {
		if let Some(outcome) = payment.sca_outcome() {
			tracing::error!(?outcome, "SCA already completed for this payment.");

			return Err(ScaError::AlreadyCompleted { outcome }.into());
		}

		let method = payment.sca_method();

		if !method.is_defined() {
			tracing::error!("No SCA method could be resolved; aborting.");

			return Err(ScaError::UndefinedMethod.into());
		}

		self.enter(ScaFlowState::Resolved(method));

		let proceed = match method {
			ScaMethod::OAuthRedirect => self.oauth_redirect(payment, scope, ctx).await?,
			ScaMethod::Redirect => {
				self.presenter.open_url(&self.redirect_url(payment, &self.state())?)?;

				true
			},
			ScaMethod::Decoupled => {
				let link = sca::decoupled_link(
					&self.settings.decoupled_link_template,
					payment.sca_data(),
				)?;

				self.presenter.show_qr(link.as_str())?;

				true
			},
			ScaMethod::Undefined => return Err(ScaError::UndefinedMethod.into()),
		};

		let report = if proceed {
			self.enter(ScaFlowState::InProgress);
			self.poll_status(payment, ctx, cancel).await?
		} else {
			ScaReport { outcome: ScaOutcome::Failed, polls: 0 }
		};

		payment.record_sca_outcome(report.outcome)?;
		self.enter(report.outcome.into());

		Ok(report)
	}

	async fn oauth_redirect(
		&self,
		payment: &Payment,
		scope: &str,
		ctx: &mut RequestContext,
	) -> Result<bool> {
		let state = self.state();
		let url = self.redirect_url(payment, &state)?;

		self.presenter.open_url(&url)?;

		let code = match self.codes.authorization_code(&url, &state).await {
			Ok(code) => code.unwrap_or_default(),
			Err(e) => {
				tracing::warn!(error = %e, "No usable authorization code; SCA failed.");

				return Ok(false);
			},
		};
		let code = code.trim();

		if code.is_empty() {
			tracing::warn!("No authorization code supplied; SCA failed.");

			return Ok(false);
		}

		let context = PaymentContextHeaders::new(
			payment.require_payment_id()?,
			payment.require_authorisation_id()?,
		);

		match self.tokens.exchange_code(scope, code, &context).await {
			Ok(token) if !token.is_empty() => {
				ctx.replace_token(token);

				Ok(true)
			},
			Ok(_) => {
				tracing::warn!("Code exchange returned an empty access token; SCA failed.");

				Ok(false)
			},
			Err(e) => {
				tracing::warn!(error = %e, "Code exchange failed; SCA failed.");

				Ok(false)
			},
		}
	}

	async fn poll_status(
		&self,
		payment: &Payment,
		ctx: &RequestContext,
		cancel: &Cancellation,
	) -> Result<ScaReport> {
		let api = self.api.as_ref();
		let presenter = self.presenter.as_ref();
		let polled =
			poll::poll_until(&self.settings.poll_policy, cancel, OPERATION, |attempt| async move {
				let status = api.sca_status(ctx, payment).await?;

				tracing::info!(attempt, status = status.as_str(), "Observed SCA status.");

				let step = match status.outcome() {
					Some(outcome) => PollStep::Done(outcome),
					None => PollStep::Pending,
				};

				presenter.report(&FlowEvent::ScaStatus { status, attempt });

				Ok(step)
			})
			.await?;

		Ok(ScaReport { outcome: polled.value, polls: polled.attempts })
	}

	fn redirect_url(&self, payment: &Payment, state: &str) -> Result<Url> {
		sca::redirect_link(
			payment.sca_data(),
			&self.settings.client_id,
			&self.settings.redirect_uri,
			state,
		)
	}

	fn state(&self) -> String {
		self.settings.state.clone().unwrap_or_else(sca::random_state)
	}

	fn enter(&self, state: ScaFlowState) {
		if state.is_terminal() {
			tracing::info!(?state, "SCA flow finished.");
		} else {
			tracing::debug!(?state, "SCA flow state changed.");
		}

		self.presenter.report(&FlowEvent::ScaState(state));
	}
}
impl Debug for ScaFlowController {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ScaFlowController").field("settings", &self.settings).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::*, api::ApiFuture, render, sca::ScaResolution};

	struct PastedRedirect(&'static str);
	impl AuthorizationCodeSource for PastedRedirect {
		fn authorization_code<'a>(
			&'a self,
			_url: &'a Url,
			state: &'a str,
		) -> ApiFuture<'a, Option<String>> {
			Box::pin(async move { render::parse_operator_input(self.0, state) })
		}
	}

	struct Harness {
		tokens: Arc<ScriptedTokenProvider>,
		api: Arc<ScriptedPaymentApi>,
		presenter: Arc<RecordingPresenter>,
		codes: Arc<FixedCode>,
		controller: ScaFlowController,
	}

	fn harness(api: ScriptedPaymentApi, code: Option<&str>, exchanged: Option<&str>) -> Harness {
		let tokens = Arc::new(ScriptedTokenProvider::new("client-token", exchanged));
		let api = Arc::new(api);
		let presenter = Arc::new(RecordingPresenter::default());
		let codes = Arc::new(FixedCode::new(code));
		let settings = ScaFlowSettings::new(
			"client-1",
			Url::parse("https://tpp.example.com/cb").expect("Redirect URI fixture."),
		)
		.with_state("state-1")
		.with_poll_policy(PollPolicy::unbounded(Duration::from_millis(1)));
		let controller = ScaFlowController::new(
			tokens.clone(),
			api.clone(),
			presenter.clone(),
			codes.clone(),
			settings,
		);

		Harness { tokens, api, presenter, codes, controller }
	}

	fn payment(method: ScaMethod, data: &str) -> Payment {
		let mut payment = Payment::new("ESSESESS", "payments", "domestic", serde_json::json!({}));

		payment.set_payment_id("p1").expect("Payment id fixture.");
		payment.set_authorisation_id("a1").expect("Authorisation id fixture.");
		payment.record_sca(ScaResolution::new(method, data)).expect("SCA fixture.");

		payment
	}

	#[tokio::test]
	async fn redirect_polls_until_finalised() {
		let h = harness(
			ScriptedPaymentApi::new("p1", "a1").with_sca_statuses(["received", "received", "finalised"]),
			None,
			None,
		);
		let mut ctx = request_context("ESSESESS");
		let report = h
			.controller
			.complete(
				&mut payment(ScaMethod::Redirect, "https://bank/r?state=[TPP_STATE]"),
				"paymentinitiation private",
				&mut ctx,
				&Cancellation::never(),
			)
			.await
			.expect("Redirect SCA should complete.");

		assert_eq!(report, ScaReport { outcome: ScaOutcome::Finalised, polls: 3 });
		assert!(report.is_success());
		assert_eq!(h.api.count("sca_status"), 3);
		assert_eq!(h.tokens.exchange_count(), 0);
		assert_eq!(
			h.presenter.opened.lock().first().map(Url::as_str),
			Some("https://bank/r?state=state-1")
		);
		assert_eq!(
			h.presenter
				.events
				.lock()
				.iter()
				.filter_map(|event| match event {
					FlowEvent::ScaState(state) => Some(*state),
					_ => None,
				})
				.collect::<Vec<_>>(),
			vec![
				ScaFlowState::Resolved(ScaMethod::Redirect),
				ScaFlowState::InProgress,
				ScaFlowState::Finalised,
			]
		);
	}

	#[tokio::test]
	async fn failed_status_stops_polling() {
		let h = harness(
			ScriptedPaymentApi::new("p1", "a1").with_sca_statuses(["received", "failed"]),
			None,
			None,
		);
		let report = h
			.controller
			.complete(
				&mut payment(ScaMethod::Redirect, "https://bank/r"),
				"paymentinitiation private",
				&mut request_context("ESSESESS"),
				&Cancellation::never(),
			)
			.await
			.expect("Failed SCA is still a completed flow.");

		assert_eq!(report, ScaReport { outcome: ScaOutcome::Failed, polls: 2 });
		assert!(!report.is_success());
		assert_eq!(h.api.count("sca_status"), 2);
	}

	#[tokio::test]
	async fn oauth_redirect_exchanges_the_code_and_swaps_the_token() {
		let h = harness(
			ScriptedPaymentApi::new("p1", "a1").with_sca_statuses(["finalised"]),
			Some("c1"),
			Some("sca-token"),
		);
		let mut ctx = request_context("ESSESESS");
		let report = h
			.controller
			.complete(
				&mut payment(
					ScaMethod::OAuthRedirect,
					"https://auth.example.com/authorize?client_id=[CLIENT_ID]&redirect_uri=[TPP_REDIRECT_URI]&state=[TPP_STATE]",
				),
				"paymentinitiation private",
				&mut ctx,
				&Cancellation::never(),
			)
			.await
			.expect("OAuth redirect SCA should complete.");

		assert_eq!(report, ScaReport { outcome: ScaOutcome::Finalised, polls: 1 });
		assert_eq!(ctx.token.access_token.expose(), "sca-token");
		assert_eq!(h.api.sca_tokens.lock().as_slice(), ["sca-token".to_owned()]);
		assert_eq!(h.codes.states.lock().as_slice(), ["state-1".to_owned()]);

		let exchanges = h.tokens.exchanges.lock();

		assert_eq!(exchanges.len(), 1);
		assert_eq!(exchanges[0].0, "c1");
		assert_eq!(exchanges[0].1, PaymentContextHeaders::new("p1", "a1"));

		let opened = h.presenter.opened.lock();
		let pairs = opened[0].query_pairs().into_owned().collect::<HashMap<_, _>>();

		assert_eq!(pairs.get("client_id").map(String::as_str), Some("client-1"));
		assert_eq!(pairs.get("redirect_uri").map(String::as_str), Some("https://tpp.example.com/cb"));
		assert_eq!(pairs.get("state").map(String::as_str), Some("state-1"));
	}

	#[tokio::test]
	async fn empty_code_fails_without_exchange() {
		for code in [None, Some(""), Some("   ")] {
			let h = harness(
				ScriptedPaymentApi::new("p1", "a1").with_sca_statuses(["finalised"]),
				code,
				Some("sca-token"),
			);
			let report = h
				.controller
				.complete(
					&mut payment(ScaMethod::OAuthRedirect, "https://auth/x"),
					"paymentinitiation private",
					&mut request_context("ESSESESS"),
					&Cancellation::never(),
				)
				.await
				.expect("Missing code is an SCA failure, not an error.");

			assert_eq!(report, ScaReport { outcome: ScaOutcome::Failed, polls: 0 });
			assert_eq!(h.tokens.exchange_count(), 0);
			assert_eq!(h.api.count("sca_status"), 0);
		}
	}

	#[tokio::test]
	async fn rejected_exchange_fails_without_polling() {
		let h = harness(
			ScriptedPaymentApi::new("p1", "a1").with_sca_statuses(["finalised"]),
			Some("c1"),
			None,
		);
		let mut ctx = request_context("ESSESESS");
		let report = h
			.controller
			.complete(
				&mut payment(ScaMethod::OAuthRedirect, "https://auth/x"),
				"paymentinitiation private",
				&mut ctx,
				&Cancellation::never(),
			)
			.await
			.expect("Rejected exchange is an SCA failure, not an error.");

		assert_eq!(report.outcome, ScaOutcome::Failed);
		assert_eq!(h.tokens.exchange_count(), 1);
		assert_eq!(h.api.count("sca_status"), 0);
		assert_eq!(ctx.token.access_token.expose(), "client-token");
	}

	#[tokio::test]
	async fn empty_exchanged_token_fails() {
		let h = harness(
			ScriptedPaymentApi::new("p1", "a1").with_sca_statuses(["finalised"]),
			Some("c1"),
			Some(""),
		);
		let report = h
			.controller
			.complete(
				&mut payment(ScaMethod::OAuthRedirect, "https://auth/x"),
				"paymentinitiation private",
				&mut request_context("ESSESESS"),
				&Cancellation::never(),
			)
			.await
			.expect("Empty token is an SCA failure, not an error.");

		assert_eq!(report.outcome, ScaOutcome::Failed);
		assert_eq!(h.api.count("sca_status"), 0);
	}

	#[tokio::test]
	async fn decoupled_shows_the_deep_link() {
		let h = harness(
			ScriptedPaymentApi::new("p1", "a1").with_sca_statuses(["started", "finalised"]),
			None,
			None,
		);
		let report = h
			.controller
			.complete(
				&mut payment(ScaMethod::Decoupled, "XYZ123"),
				"paymentinitiation private",
				&mut request_context("ESSESESS"),
				&Cancellation::never(),
			)
			.await
			.expect("Decoupled SCA should complete.");

		assert_eq!(report.polls, 2);
		assert_eq!(
			h.presenter.qr_codes.lock().as_slice(),
			["bankid:///?autostarttoken=XYZ123&redirect=null".to_owned()]
		);
		assert!(h.presenter.opened.lock().is_empty());
	}

	#[tokio::test]
	async fn undefined_method_is_fatal() {
		let h = harness(ScriptedPaymentApi::new("p1", "a1"), Some("c1"), Some("sca-token"));
		let err = h
			.controller
			.complete(
				&mut payment(ScaMethod::Undefined, ""),
				"paymentinitiation private",
				&mut request_context("ESSESESS"),
				&Cancellation::never(),
			)
			.await
			.expect_err("Undefined method should fail.");

		assert!(matches!(err, Error::Sca(ScaError::UndefinedMethod)));
		assert_eq!(h.api.count("sca_status"), 0);
		assert!(h.presenter.events.lock().is_empty());
	}

	#[tokio::test]
	async fn unknown_statuses_hit_the_attempt_limit() {
		let h = harness(
			ScriptedPaymentApi::new("p1", "a1").with_sca_statuses(["psuAuthenticated"]),
			None,
			None,
		);
		let controller = ScaFlowController {
			settings: h.controller.settings().clone().with_poll_policy(
				PollPolicy::unbounded(Duration::from_millis(1)).with_max_attempts(5),
			),
			..h.controller.clone()
		};
		let err = controller
			.complete(
				&mut payment(ScaMethod::Redirect, "https://bank/r"),
				"paymentinitiation private",
				&mut request_context("ESSESESS"),
				&Cancellation::never(),
			)
			.await
			.expect_err("Non-terminal statuses should time out.");

		assert!(matches!(err, Error::Timeout { operation: OPERATION, attempts: 5 }));
		assert_eq!(h.api.count("sca_status"), 5);
	}

	#[tokio::test]
	async fn cancellation_stops_polling() {
		let h = harness(
			ScriptedPaymentApi::new("p1", "a1").with_sca_statuses(["received"]),
			None,
			None,
		);
		let (handle, cancel) = poll::cancellation();

		handle.cancel();

		let err = h
			.controller
			.complete(
				&mut payment(ScaMethod::Redirect, "https://bank/r"),
				"paymentinitiation private",
				&mut request_context("ESSESESS"),
				&cancel,
			)
			.await
			.expect_err("Cancelled polling should fail.");

		assert!(matches!(err, Error::Cancelled { operation: OPERATION }));
		assert_eq!(h.api.count("sca_status"), 0);
	}

	#[tokio::test]
	async fn state_mismatch_fails_without_exchange() {
		let h = harness(
			ScriptedPaymentApi::new("p1", "a1").with_sca_statuses(["finalised"]),
			None,
			Some("sca-token"),
		);
		let controller = ScaFlowController {
			codes: Arc::new(PastedRedirect("https://tpp.example.com/cb?code=c1&state=WRONG")),
			..h.controller.clone()
		};
		let mut ctx = request_context("ESSESESS");
		let report = controller
			.complete(
				&mut payment(ScaMethod::OAuthRedirect, "https://auth/x?state=[TPP_STATE]"),
				"paymentinitiation private",
				&mut ctx,
				&Cancellation::never(),
			)
			.await
			.expect("State mismatch is an SCA failure, not an error.");

		assert_eq!(report, ScaReport { outcome: ScaOutcome::Failed, polls: 0 });
		assert_eq!(h.tokens.exchange_count(), 0);
		assert_eq!(h.api.count("sca_status"), 0);
		assert_eq!(ctx.token.access_token.expose(), "client-token");
	}

	#[tokio::test]
	async fn completed_flow_is_not_reentered() {
		let h = harness(
			ScriptedPaymentApi::new("p1", "a1").with_sca_statuses(["finalised"]),
			None,
			None,
		);
		let mut payment = payment(ScaMethod::Redirect, "https://bank/r");
		let mut ctx = request_context("ESSESESS");
		let report = h
			.controller
			.complete(&mut payment, "paymentinitiation private", &mut ctx, &Cancellation::never())
			.await
			.expect("First run should complete.");

		assert_eq!(report.outcome, ScaOutcome::Finalised);
		assert_eq!(payment.sca_outcome(), Some(ScaOutcome::Finalised));

		let err = h
			.controller
			.complete(&mut payment, "paymentinitiation private", &mut ctx, &Cancellation::never())
			.await
			.expect_err("Second run should be refused.");

		assert!(matches!(
			err,
			Error::Sca(ScaError::AlreadyCompleted { outcome: ScaOutcome::Finalised })
		));
		assert_eq!(h.presenter.opened.lock().len(), 1);
		assert_eq!(h.api.count("sca_status"), 1);
	}
}
