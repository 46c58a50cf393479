#![allow(dead_code)]

// crates.io
use httpmock::MockServer;
use parking_lot::Mutex;
use url::Url;
// self
use psd2_sca::{
	api::{ApiFuture, PaymentApiClient},
	auth::AuthClient,
	config::Settings,
	http::ReqwestHttpClient,
	poll::PollPolicy,
	render::{AuthorizationCodeSource, FlowEvent, ScaPresenter},
	reqwest::Client,
};

pub const CLIENT_ID: &str = "tpp-client";
pub const CLIENT_SECRET: &str = "tpp-secret";
pub const REDIRECT_URI: &str = "https://tpp.example.com/callback";
pub const PSU_IP_ADDRESS: &str = "192.0.2.10";

pub fn settings(server: &MockServer) -> Settings {
	Settings::new(
		CLIENT_ID,
		CLIENT_SECRET,
		Url::parse(REDIRECT_URI).expect("Redirect URI fixture should parse."),
		PSU_IP_ADDRESS,
	)
	.with_endpoints(
		Url::parse(&server.url("/connect/token")).expect("Mock token URL should parse."),
		Url::parse(&server.base_url()).expect("Mock API URL should parse."),
	)
	.with_polling(&PollPolicy::unbounded(std::time::Duration::from_millis(5)).with_max_attempts(20))
}

/// Client accepting the self-signed certificate `httpmock` serves.
pub fn mock_http_client() -> ReqwestHttpClient {
	let client = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestHttpClient::with_client(client)
}

pub fn auth_client(settings: &Settings) -> AuthClient {
	AuthClient::from_settings(settings, mock_http_client()).expect("Auth client should build.")
}

pub fn api_client(settings: &Settings) -> PaymentApiClient {
	PaymentApiClient::from_settings(settings, mock_http_client())
		.expect("API client should build.")
}

/// Presenter keeping what it was asked to show.
#[derive(Debug, Default)]
pub struct Recorder {
	pub opened: Mutex<Vec<Url>>,
	pub qr_codes: Mutex<Vec<String>>,
	pub events: Mutex<Vec<FlowEvent>>,
}
impl ScaPresenter for Recorder {
	fn open_url(&self, url: &Url) -> psd2_sca::error::Result<()> {
		self.opened.lock().push(url.clone());

		Ok(())
	}

	fn show_qr(&self, payload: &str) -> psd2_sca::error::Result<()> {
		self.qr_codes.lock().push(payload.to_owned());

		Ok(())
	}

	fn report(&self, event: &FlowEvent) {
		self.events.lock().push(event.clone());
	}
}

/// Operator who always types the same code.
#[derive(Debug)]
pub struct Operator(pub Option<&'static str>);
impl AuthorizationCodeSource for Operator {
	fn authorization_code<'a>(
		&'a self,
		_url: &'a Url,
		_state: &'a str,
	) -> ApiFuture<'a, Option<String>> {
		let code = self.0.map(str::to_owned);

		Box::pin(async move { Ok(code) })
	}
}
