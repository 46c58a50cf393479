mod common;

// crates.io
use httpmock::prelude::*;
// self
use psd2_sca::{
	auth::{AuthError, GrantType, PaymentContextHeaders},
	error::Error,
};

#[tokio::test]
async fn client_credentials_posts_the_form_and_maps_the_token() {
	let server = MockServer::start_async().await;
	let client = common::auth_client(&common::settings(&server));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/connect/token")
				.body_includes("grant_type=client_credentials")
				.body_includes("client_id=tpp-client")
				.body_includes("client_secret=tpp-secret")
				.body_includes("scope=paymentinitiation+private");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"client-token\",\"token_type\":\"Bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let token = client
		.request_client_credentials("paymentinitiation private")
		.await
		.expect("Client credentials grant should succeed.");

	mock.assert_calls_async(1).await;

	assert_eq!(token.access_token.expose(), "client-token");
	assert_eq!(token.authorization(), "Bearer client-token");
	assert!(token.expires_at.is_some());
}

#[tokio::test]
async fn client_credentials_maps_invalid_client() {
	let server = MockServer::start_async().await;
	let client = common::auth_client(&common::settings(&server));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/connect/token");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_client\",\"error_description\":\"unknown client\"}");
		})
		.await;
	let err = client
		.request_client_credentials("paymentinitiation private")
		.await
		.expect_err("Rejected client should fail.");

	mock.assert_async().await;

	assert!(matches!(
		err,
		Error::Auth(AuthError::InvalidClient { ref reason }) if reason == "unknown client"
	));
}

#[tokio::test]
async fn code_exchange_binds_the_payment_context() {
	let server = MockServer::start_async().await;
	let client = common::auth_client(&common::settings(&server));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/connect/token")
				.header("x-paymentid", "p1")
				.header("x-paymentauthorisationid", "a1")
				.body_includes("grant_type=authorization_code")
				.body_includes("code=c1")
				.body_includes("redirect_uri=https%3A%2F%2Ftpp.example.com%2Fcallback")
				.body_includes("scope=paymentinitiation+private");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"sca-token\",\"token_type\":\"bearer\"}");
		})
		.await;
	let token = client
		.request_code_exchange(
			"paymentinitiation private",
			"c1",
			&PaymentContextHeaders::new("p1", "a1"),
		)
		.await
		.expect("Code exchange should succeed.");

	mock.assert_calls_async(1).await;

	assert_eq!(token.access_token.expose(), "sca-token");
	assert!(token.expires_at.is_none());
}

#[tokio::test]
async fn code_exchange_maps_invalid_grant() {
	let server = MockServer::start_async().await;
	let client = common::auth_client(&common::settings(&server));
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/connect/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"code expired\"}");
		})
		.await;
	let err = client
		.request_code_exchange(
			"paymentinitiation private",
			"stale",
			&PaymentContextHeaders::new("p1", "a1"),
		)
		.await
		.expect_err("Expired code should fail.");

	assert!(matches!(
		err,
		Error::Auth(AuthError::InvalidGrant { grant: GrantType::AuthorizationCode, ref reason })
			if reason == "code expired"
	));
}

#[tokio::test]
async fn token_type_defaults_to_bearer_when_omitted() {
	let server = MockServer::start_async().await;
	let client = common::auth_client(&common::settings(&server));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/connect/token").body_includes("grant_type=client_credentials");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"bare-token\"}");
		})
		.await;
	let token = client
		.request_client_credentials("paymentinitiation private")
		.await
		.expect("Token response without token_type should succeed.");

	mock.assert_calls_async(1).await;

	assert_eq!(token.access_token.expose(), "bare-token");
	assert_eq!(token.authorization(), "Bearer bare-token");
}
