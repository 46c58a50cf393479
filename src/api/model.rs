//! Wire shapes of payment API responses.
//!
//! Optional parts of a response are `Option` fields so an absent link or challenge is a typed
//! "not present" instead of a lookup failure.

// self
use crate::_prelude::*;

/// Link object (`{"href": "..."}`).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Href {
	/// Target URL or template.
	pub href: String,
}

/// SCA links the API attaches to the update-PSU-data response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Links {
	/// OAuth authorize URL template.
	#[serde(rename = "scaOAuth", default)]
	pub sca_oauth: Option<Href>,
	/// Plain redirect URL template.
	#[serde(rename = "scaRedirect", default)]
	pub sca_redirect: Option<Href>,
}

/// Challenge payload sent for decoupled SCA.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeData {
	/// Raw challenge values, e.g. an autostart token.
	#[serde(default)]
	pub data: Vec<String>,
}

/// Body of a successful payment creation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInitiationResponse {
	/// Identifier assigned to the payment.
	pub payment_id: String,
	/// Initial transaction status.
	#[serde(default)]
	pub transaction_status: Option<String>,
}

/// Body of a successful authorisation creation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAuthorisationResponse {
	/// Identifier assigned to the authorisation.
	pub authorisation_id: String,
	/// Initial SCA status.
	#[serde(default)]
	pub sca_status: Option<String>,
}

/// Body of the update-PSU-data call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePsuDataResponse {
	/// SCA status after the update.
	#[serde(default)]
	pub sca_status: Option<String>,
	/// Links to the SCA redirect targets.
	#[serde(rename = "_links", default)]
	pub links: Links,
	/// Decoupled challenge.
	#[serde(default)]
	pub challenge_data: Option<ChallengeData>,
}
impl UpdatePsuDataResponse {
	/// First decoupled challenge value, if any.
	pub fn challenge(&self) -> Option<&str> {
		self.challenge_data.as_ref().and_then(|data| data.data.first()).map(String::as_str)
	}
}

/// Body of the SCA status call.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaStatusResponse {
	/// Current SCA status.
	pub sca_status: String,
}

/// Body of the payment status call.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResponse {
	/// Current transaction status.
	pub transaction_status: String,
}
