//! Runs an OAuth-redirect payment against a local mock of the platform: the operator "pastes"
//! a fixed code, the SCA status comes back finalised, and the payment is accepted.

// std
use std::{sync::Arc, time::Duration};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
use url::Url;
// self
use psd2_sca::{
	api::{ApiFuture, PaymentApiClient},
	auth::AuthClient,
	config::{CatalogEntry, PsuContext, Settings},
	http::ReqwestHttpClient,
	payment::{PaymentOrchestrator, RunSettings},
	poll::{self, PollPolicy},
	render::{AuthorizationCodeSource, ConsolePresenter},
	reqwest::Client,
};

const BASE: &str = "/psd2/paymentinitiation/v1/payments/domestic";

struct PastedCode;
impl AuthorizationCodeSource for PastedCode {
	fn authorization_code<'a>(
		&'a self,
		url: &'a Url,
		_state: &'a str,
	) -> ApiFuture<'a, Option<String>> {
		println!("(operator visits {url} and pastes `c1`)");

		Box::pin(async { Ok(Some("c1".to_owned())) })
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/connect/token").body_includes("grant_type=client_credentials");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"client-token\",\"token_type\":\"Bearer\",\"expires_in\":3600}");
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/connect/token").body_includes("grant_type=authorization_code");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"sca-token\",\"token_type\":\"Bearer\",\"expires_in\":3600}");
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path(BASE);
			then.status(201).json_body(json!({ "paymentId": "p1", "transactionStatus": "RCVD" }));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path(format!("{BASE}/p1/authorisations"));
			then.status(201).json_body(json!({ "authorisationId": "a1", "scaStatus": "received" }));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(PUT).path(format!("{BASE}/p1/authorisations/a1"));
			then.status(200).header("aspsp-sca-approach", "REDIRECT").json_body(json!({
				"_links": {
					"scaOAuth": {
						"href": "https://auth.example.com/authorize?client_id=[CLIENT_ID]&redirect_uri=[TPP_REDIRECT_URI]&state=[TPP_STATE]&response_type=code"
					}
				}
			}));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path(format!("{BASE}/p1/authorisations/a1"));
			then.status(200).json_body(json!({ "scaStatus": "finalised" }));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path(format!("{BASE}/p1/status"));
			then.status(200).json_body(json!({ "transactionStatus": "ACCP" }));
		})
		.await;

	let settings = Settings::new(
		"demo-client",
		"demo-secret",
		Url::parse("https://tpp.example.com/callback")?,
		"192.0.2.10",
	)
	.with_endpoints(Url::parse(&server.url("/connect/token"))?, Url::parse(&server.base_url())?)
	.with_polling(&PollPolicy::unbounded(Duration::from_millis(200)).with_max_attempts(10));
	let orchestrator = PaymentOrchestrator::new(
		Arc::new(AuthClient::from_settings(&settings, mock_http_client()?)?),
		Arc::new(PaymentApiClient::from_settings(&settings, mock_http_client()?)?),
		Arc::new(ConsolePresenter),
		Arc::new(PastedCode),
		RunSettings::from_settings(&settings),
	);
	let entry = CatalogEntry {
		bicfi: "ESSESESS".into(),
		service: "payments".into(),
		product: "domestic".into(),
		psu_context: PsuContext::Private,
		psu_corporate_id: None,
		authentication_method_id: None,
		body: json!({ "instructedAmount": { "amount": "10.00", "currency": "SEK" } }),
	};
	let (_handle, cancel) = poll::cancellation();
	let report = orchestrator.run(&entry, &cancel).await?;

	println!("{report:#?}");

	Ok(())
}

fn mock_http_client() -> Result<ReqwestHttpClient> {
	let client = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()?;

	Ok(ReqwestHttpClient::with_client(client))
}
