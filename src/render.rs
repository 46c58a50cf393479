//! Rendering collaborators: where SCA links go and where authorization codes come from.
//!
//! The flow only produces URLs and payloads. Opening browsers or encoding QR images belongs to
//! whoever implements [`ScaPresenter`]; the console implementations here just print.

// crates.io
use tokio::io::{AsyncBufReadExt, BufReader};
// self
use crate::{
	_prelude::*,
	api::ApiFuture,
	auth::{AuthError, GrantType},
	error::TransportError,
	payment::TransactionStatus,
	sca::{ScaFlowState, ScaMethod, ScaStatus},
};

/// Progress of a payment run, reported to the presenter as it happens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowEvent {
	/// The API accepted the payment.
	PaymentCreated {
		/// Assigned payment id.
		payment_id: String,
	},
	/// An authorisation was started.
	AuthorisationStarted {
		/// Assigned authorisation id.
		authorisation_id: String,
	},
	/// The SCA method was classified.
	ScaResolved {
		/// Resolved method.
		method: ScaMethod,
	},
	/// The SCA state machine moved.
	ScaState(ScaFlowState),
	/// An SCA status poll returned.
	ScaStatus {
		/// Observed status.
		status: ScaStatus,
		/// 1-based poll number.
		attempt: u32,
	},
	/// A payment status poll returned.
	TransactionStatus {
		/// Observed status.
		status: TransactionStatus,
		/// 1-based poll number.
		attempt: u32,
	},
}
impl Display for FlowEvent {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			FlowEvent::PaymentCreated { payment_id } => write!(f, "Payment {payment_id} created."),
			FlowEvent::AuthorisationStarted { authorisation_id } =>
				write!(f, "Authorisation {authorisation_id} started."),
			FlowEvent::ScaResolved { method } => write!(f, "SCA method: {method}."),
			FlowEvent::ScaState(state) => write!(f, "SCA {state:?}."),
			FlowEvent::ScaStatus { status, attempt } =>
				write!(f, "SCA status #{attempt}: {status}."),
			FlowEvent::TransactionStatus { status, attempt } =>
				write!(f, "Payment status #{attempt}: {status}."),
		}
	}
}

/// Renders SCA links for the PSU.
pub trait ScaPresenter
where
	Self: Send + Sync,
{
	/// Hands a redirect URL to the PSU (typically a browser).
	fn open_url(&self, url: &Url) -> Result<()>;

	/// Hands a decoupled deep link to the PSU (typically as a QR code).
	fn show_qr(&self, payload: &str) -> Result<()>;

	/// Observes run progress.
	fn report(&self, event: &FlowEvent) {
		let _ = event;
	}
}

/// Supplies the authorization code after an OAuth-redirect SCA.
pub trait AuthorizationCodeSource
where
	Self: Send + Sync,
{
	/// Waits for the code belonging to `url`; `None` or an empty string means the PSU gave up.
	fn authorization_code<'a>(
		&'a self,
		url: &'a Url,
		state: &'a str,
	) -> ApiFuture<'a, Option<String>>;
}

/// Presenter printing to stdout.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsolePresenter;
impl ScaPresenter for ConsolePresenter {
	fn open_url(&self, url: &Url) -> Result<()> {
		println!("Open this URL to authenticate:\n{url}");

		Ok(())
	}

	fn show_qr(&self, payload: &str) -> Result<()> {
		println!("Scan or open this link with the authentication app:\n{payload}");

		Ok(())
	}

	fn report(&self, event: &FlowEvent) {
		println!("{event}");
	}
}

/// Code source reading one line from stdin.
///
/// Accepts either the bare code or the full redirect URL the browser landed on.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleCodeSource;
impl AuthorizationCodeSource for ConsoleCodeSource {
	fn authorization_code<'a>(
		&'a self,
		_url: &'a Url,
		state: &'a str,
	) -> ApiFuture<'a, Option<String>> {
		Box::pin(async move {
			println!("Paste the authorization code or the redirect URL, then press enter:");

			let mut line = String::new();

			BufReader::new(tokio::io::stdin())
				.read_line(&mut line)
				.await
				.map_err(TransportError::Io)?;

			parse_operator_input(&line, state)
		})
	}
}

/// Extracts the authorization code from operator input.
///
/// An `http(s)` URL is read as the redirect target: its `state` must match, an `error`
/// parameter or a missing `code` yields `None`. Anything else is taken as the code itself.
pub fn parse_operator_input(input: &str, expected_state: &str) -> Result<Option<String>> {
	let input = input.trim();

	if input.is_empty() {
		return Ok(None);
	}

	let url = match Url::parse(input) {
		Ok(url) if matches!(url.scheme(), "http" | "https") => url,
		_ => return Ok(Some(input.to_owned())),
	};
	let params = url.query_pairs().into_owned().collect::<HashMap<_, _>>();

	if params.get("state").is_some_and(|state| state != expected_state) {
		return Err(AuthError::InvalidGrant {
			grant: GrantType::AuthorizationCode,
			reason: "Authorization state mismatch.".into(),
		}
		.into());
	}
	if let Some(error) = params.get("error") {
		tracing::warn!(error = error.as_str(), "Authorization was declined.");

		return Ok(None);
	}

	Ok(params.get("code").filter(|code| !code.is_empty()).cloned())
}
