//! Runs a decoupled payment against a local mock: the bank returns an autostart token, the
//! deep link is printed for QR rendering, and the corporate payment settles once SCA finalises.

// std
use std::{sync::Arc, time::Duration};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
use url::Url;
// self
use psd2_sca::{
	api::PaymentApiClient,
	auth::AuthClient,
	config::{PaymentCatalog, Settings},
	http::ReqwestHttpClient,
	payment::{PaymentOrchestrator, RunSettings},
	poll::{Cancellation, PollPolicy},
	render::{ConsoleCodeSource, ConsolePresenter},
	reqwest::Client,
};

const BASE: &str = "/psd2/paymentinitiation/v1/payments/domestic";
const CATALOG: &str = r#"{
	"corporate-sek": {
		"bicfi": "HANDSESS",
		"product": "domestic",
		"psu_context": "corporate",
		"psu_corporate_id": "5560000000",
		"authentication_method_id": "mbid",
		"body": { "instructedAmount": { "amount": "250.00", "currency": "SEK" } }
	}
}"#;

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/connect/token")
				.body_includes("scope=paymentinitiation+corporate");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"client-token\",\"token_type\":\"Bearer\"}");
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path(BASE).header("psu-corporate-id", "5560000000");
			then.status(201).json_body(json!({ "paymentId": "p9", "transactionStatus": "RCVD" }));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path(format!("{BASE}/p9/authorisations"));
			then.status(201).json_body(json!({ "authorisationId": "a9" }));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(PUT)
				.path(format!("{BASE}/p9/authorisations/a9"))
				.json_body(json!({ "authenticationMethodId": "mbid" }));
			then.status(200)
				.header("aspsp-sca-approach", "DECOUPLED")
				.json_body(json!({ "challengeData": { "data": ["4b0c0e5e-demo-token"] } }));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path(format!("{BASE}/p9/authorisations/a9"));
			then.status(200).json_body(json!({ "scaStatus": "finalised" }));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path(format!("{BASE}/p9/status"));
			then.status(200).json_body(json!({ "transactionStatus": "ACSC" }));
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
		Arc::new(ConsoleCodeSource),
		RunSettings::from_settings(&settings),
	);
	let catalog = PaymentCatalog::from_json(CATALOG)?;
	let report = orchestrator.run_named(&catalog, "corporate-sek", &Cancellation::never()).await?;

	println!("Finished: {:?} after {} status read(s).", report.transaction_status, report.status_reads);

	Ok(())
}

fn mock_http_client() -> Result<ReqwestHttpClient> {
	let client = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()?;

	Ok(ReqwestHttpClient::with_client(client))
}
