//! PSD2 payment initiation driver: create a payment, start its authorisation, resolve the SCA
//! method the bank advertises, and walk redirect, OAuth-redirect, or decoupled SCA to a terminal
//! payment status.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod obs;
pub mod payment;
pub mod poll;
pub mod render;
pub mod sca;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and scripted collaborators for tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::collections::VecDeque;
	// self
	use crate::{
		api::{
			ApiFuture, AuthorisationCreated, PaymentApi, PaymentCreated, PsuDataUpdate,
			RequestContext,
		},
		auth::{AuthError, BearerToken, GrantType, PaymentContextHeaders, TokenProvider},
		http::ApiResponse,
		payment::{Payment, TransactionStatus},
		render::{AuthorizationCodeSource, FlowEvent, ScaPresenter},
		sca::ScaStatus,
	};

	/// Builds a bearer token fixture that expires in one hour.
	pub fn bearer(value: &str) -> BearerToken {
		BearerToken::new(value, "Bearer", OffsetDateTime::now_utc(), Some(3_600))
	}

	/// Builds a request context fixture for the provided BicFi.
	pub fn request_context(bicfi: &str) -> RequestContext {
		RequestContext::new(bearer("client-token"), bicfi, "127.0.0.1")
	}

	/// Token provider that hands out scripted tokens and records every exchange.
	#[derive(Debug, Default)]
	pub struct ScriptedTokenProvider {
		/// Token returned by the client-credentials grant.
		pub client_token: String,
		/// Token returned by the code exchange; `None` simulates a rejected grant.
		pub exchanged_token: Option<String>,
		/// Codes passed to [`TokenProvider::exchange_code`], with their payment context.
		pub exchanges: Mutex<Vec<(String, PaymentContextHeaders)>>,
		/// Scopes requested through the client-credentials grant.
		pub client_scopes: Mutex<Vec<String>>,
	}
	impl ScriptedTokenProvider {
		/// Creates a provider whose code exchange yields `exchanged`.
		pub fn new(client_token: &str, exchanged: Option<&str>) -> Self {
			Self {
				client_token: client_token.into(),
				exchanged_token: exchanged.map(Into::into),
				..Default::default()
			}
		}

		/// Number of code exchanges attempted so far.
		pub fn exchange_count(&self) -> usize {
			self.exchanges.lock().len()
		}
	}
	impl TokenProvider for ScriptedTokenProvider {
		fn client_credentials<'a>(&'a self, scope: &'a str) -> ApiFuture<'a, BearerToken> {
			self.client_scopes.lock().push(scope.into());

			let token = bearer(&self.client_token);

			Box::pin(async move { Ok(token) })
		}

		fn exchange_code<'a>(
			&'a self,
			_scope: &'a str,
			code: &'a str,
			context: &'a PaymentContextHeaders,
		) -> ApiFuture<'a, BearerToken> {
			self.exchanges.lock().push((code.into(), context.clone()));

			let result = match &self.exchanged_token {
				Some(token) => Ok(bearer(token)),
				None => Err(AuthError::InvalidGrant {
					grant: GrantType::AuthorizationCode,
					reason: "Scripted provider rejects every code.".into(),
				}
				.into()),
			};

			Box::pin(async move { result })
		}
	}

	/// Payment API whose responses are scripted per endpoint and whose calls are counted.
	#[derive(Debug, Default)]
	pub struct ScriptedPaymentApi {
		/// Payment id handed out by [`PaymentApi::create_payment`].
		pub payment_id: String,
		/// Authorisation id handed out by [`PaymentApi::start_authorisation`].
		pub authorisation_id: String,
		/// Raw response returned by [`PaymentApi::update_psu_data`].
		pub psu_data_response: Mutex<Option<ApiResponse>>,
		/// SCA statuses returned by successive polls; the last value repeats.
		pub sca_statuses: Mutex<VecDeque<String>>,
		/// Transaction statuses returned by successive polls; the last value repeats.
		pub payment_statuses: Mutex<VecDeque<String>>,
		/// Endpoint names in call order.
		pub calls: Mutex<Vec<&'static str>>,
		/// Bearer tokens observed on SCA status polls.
		pub sca_tokens: Mutex<Vec<String>>,
	}
	impl ScriptedPaymentApi {
		/// Creates an API that assigns the provided identifiers.
		pub fn new(payment_id: &str, authorisation_id: &str) -> Self {
			Self {
				payment_id: payment_id.into(),
				authorisation_id: authorisation_id.into(),
				..Default::default()
			}
		}

		/// Scripts the update-PSU-data response.
		pub fn with_psu_data_response(self, response: ApiResponse) -> Self {
			*self.psu_data_response.lock() = Some(response);

			self
		}

		/// Scripts the SCA statuses returned by successive polls.
		pub fn with_sca_statuses<I>(self, statuses: I) -> Self
		where
			I: IntoIterator<Item = &'static str>,
		{
			*self.sca_statuses.lock() = statuses.into_iter().map(Into::into).collect();

			self
		}

		/// Scripts the transaction statuses returned by successive polls.
		pub fn with_payment_statuses<I>(self, statuses: I) -> Self
		where
			I: IntoIterator<Item = &'static str>,
		{
			*self.payment_statuses.lock() = statuses.into_iter().map(Into::into).collect();

			self
		}

		/// Number of calls made to the named endpoint.
		pub fn count(&self, endpoint: &str) -> usize {
			self.calls.lock().iter().filter(|name| **name == endpoint).count()
		}

		fn next(queue: &Mutex<VecDeque<String>>) -> String {
			let mut queue = queue.lock();

			if queue.len() > 1 {
				queue.pop_front().unwrap_or_default()
			} else {
				queue.front().cloned().unwrap_or_default()
			}
		}
	}
	impl PaymentApi for ScriptedPaymentApi {
		fn create_payment<'a>(
			&'a self,
			_ctx: &'a RequestContext,
			_payment: &'a Payment,
		) -> ApiFuture<'a, PaymentCreated> {
			self.calls.lock().push("create_payment");

			let created = PaymentCreated {
				payment_id: self.payment_id.clone(),
				transaction_status: Some(TransactionStatus::new("RCVD")),
			};

			Box::pin(async move { Ok(created) })
		}

		fn start_authorisation<'a>(
			&'a self,
			_ctx: &'a RequestContext,
			_payment: &'a Payment,
		) -> ApiFuture<'a, AuthorisationCreated> {
			self.calls.lock().push("start_authorisation");

			let created = AuthorisationCreated {
				authorisation_id: self.authorisation_id.clone(),
				sca_status: Some(ScaStatus::new("received")),
			};

			Box::pin(async move { Ok(created) })
		}

		fn update_psu_data<'a>(
			&'a self,
			_ctx: &'a RequestContext,
			_payment: &'a Payment,
			_update: &'a PsuDataUpdate,
		) -> ApiFuture<'a, ApiResponse> {
			self.calls.lock().push("update_psu_data");

			let response = self
				.psu_data_response
				.lock()
				.clone()
				.unwrap_or_else(|| ApiResponse::new(200, HeaderMap::new(), "{}"));

			Box::pin(async move { Ok(response) })
		}

		fn sca_status<'a>(
			&'a self,
			ctx: &'a RequestContext,
			_payment: &'a Payment,
		) -> ApiFuture<'a, ScaStatus> {
			self.calls.lock().push("sca_status");
			self.sca_tokens.lock().push(ctx.token.access_token.expose().into());

			let status = ScaStatus::new(Self::next(&self.sca_statuses));

			Box::pin(async move { Ok(status) })
		}

		fn payment_status<'a>(
			&'a self,
			_ctx: &'a RequestContext,
			_payment: &'a Payment,
		) -> ApiFuture<'a, TransactionStatus> {
			self.calls.lock().push("payment_status");

			let status = TransactionStatus::new(Self::next(&self.payment_statuses));

			Box::pin(async move { Ok(status) })
		}
	}

	/// Presenter that records everything it is asked to render.
	#[derive(Debug, Default)]
	pub struct RecordingPresenter {
		/// URLs passed to [`ScaPresenter::open_url`].
		pub opened: Mutex<Vec<Url>>,
		/// Payloads passed to [`ScaPresenter::show_qr`].
		pub qr_codes: Mutex<Vec<String>>,
		/// Events passed to [`ScaPresenter::report`].
		pub events: Mutex<Vec<FlowEvent>>,
	}
	impl ScaPresenter for RecordingPresenter {
		fn open_url(&self, url: &Url) -> Result<()> {
			self.opened.lock().push(url.clone());

			Ok(())
		}

		fn show_qr(&self, payload: &str) -> Result<()> {
			self.qr_codes.lock().push(payload.into());

			Ok(())
		}

		fn report(&self, event: &FlowEvent) {
			self.events.lock().push(event.clone());
		}
	}

	/// Code source that always answers with the same value.
	#[derive(Debug, Default)]
	pub struct FixedCode {
		/// Code handed back; `None` simulates an operator who entered nothing.
		pub code: Option<String>,
		/// State tokens the flow asked about.
		pub states: Mutex<Vec<String>>,
	}
	impl FixedCode {
		/// Creates a source answering with `code`.
		pub fn new(code: Option<&str>) -> Self {
			Self { code: code.map(Into::into), states: Mutex::default() }
		}
	}
	impl AuthorizationCodeSource for FixedCode {
		fn authorization_code<'a>(
			&'a self,
			_url: &'a Url,
			state: &'a str,
		) -> ApiFuture<'a, Option<String>> {
			self.states.lock().push(state.into());

			let code = self.code.clone();

			Box::pin(async move { Ok(code) })
		}
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration,
	};

	pub use parking_lot::Mutex;
	pub use reqwest::{
		Client as ReqwestClient, Error as ReqwestError,
		header::{HeaderMap, HeaderName, HeaderValue},
	};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
#[cfg(feature = "cli")] use {clap as _, color_eyre as _, tracing_subscriber as _};
