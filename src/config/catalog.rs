//! Named payment templates loaded from a JSON catalog.

// std
use std::path::Path;
// self
use crate::{_prelude::*, config, error::ConfigError};

/// Scope prefix shared by every payment-initiation token.
pub const PAYMENT_SCOPE_PREFIX: &str = "paymentinitiation";

/// Whose account the payment is drawn from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PsuContext {
	#[default]
	/// Personal account.
	Private,
	/// Business account; may carry a `PSU-Corporate-Id`.
	Corporate,
}
impl PsuContext {
	/// Returns the scope suffix.
	pub const fn as_str(self) -> &'static str {
		match self {
			PsuContext::Private => "private",
			PsuContext::Corporate => "corporate",
		}
	}

	/// Token scope for this context, e.g. `paymentinitiation private`.
	pub fn scope(self) -> String {
		format!("{PAYMENT_SCOPE_PREFIX} {}", self.as_str())
	}
}

/// One payment template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
	/// Bank identifier code of the ASPSP.
	pub bicfi: String,
	/// Payment service path segment.
	#[serde(default = "default_service")]
	pub service: String,
	/// Payment product path segment.
	pub product: String,
	/// PSU context used for the scope and the corporate header.
	#[serde(default)]
	pub psu_context: PsuContext,
	/// Corporate identifier; only sent for [`PsuContext::Corporate`].
	#[serde(default)]
	pub psu_corporate_id: Option<String>,
	/// SCA method the PSU picks when updating PSU data.
	#[serde(default)]
	pub authentication_method_id: Option<String>,
	/// Payment initiation request body, forwarded as-is.
	pub body: serde_json::Value,
}
impl CatalogEntry {
	/// Token scope for this payment.
	pub fn scope(&self) -> String {
		self.psu_context.scope()
	}

	/// Corporate id to forward, if the context calls for one.
	pub fn corporate_id(&self) -> Option<&str> {
		match self.psu_context {
			PsuContext::Corporate => self.psu_corporate_id.as_deref(),
			PsuContext::Private => None,
		}
	}
}

/// Payment templates keyed by name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentCatalog(BTreeMap<String, CatalogEntry>);
impl PaymentCatalog {
	/// Loads a catalog from a JSON file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		config::read_json(path.as_ref())
	}

	/// Parses a catalog from JSON text.
	pub fn from_json(raw: &str) -> Result<Self> {
		config::parse_json("payment catalog", raw)
	}

	/// Adds or replaces an entry.
	pub fn insert(&mut self, name: impl Into<String>, entry: CatalogEntry) {
		self.0.insert(name.into(), entry);
	}

	/// Looks up a payment by name.
	pub fn get(&self, name: &str) -> Result<&CatalogEntry> {
		self.0.get(name).ok_or_else(|| ConfigError::PaymentNotFound { name: name.into() }.into())
	}

	/// Iterates over the payment names in order.
	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.0.keys().map(String::as_str)
	}
}

fn default_service() -> String {
	"payments".into()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const CATALOG: &str = r#"{
		"domestic-private": {
			"bicfi": "ESSESESS",
			"product": "domestic",
			"body": { "instructedAmount": { "currency": "SEK", "amount": "10.00" } }
		},
		"domestic-corporate": {
			"bicfi": "HANDSESS",
			"service": "bulk-payments",
			"product": "domestic",
			"psu_context": "corporate",
			"psu_corporate_id": "5560000000",
			"authentication_method_id": "mbid",
			"body": {}
		}
	}"#;

	#[test]
	fn lookup_derives_scope_and_corporate_header() {
		let catalog = PaymentCatalog::from_json(CATALOG).expect("Catalog should parse.");
		let private = catalog.get("domestic-private").expect("Private entry should exist.");

		assert_eq!(private.service, "payments");
		assert_eq!(private.scope(), "paymentinitiation private");
		assert_eq!(private.corporate_id(), None);

		let corporate = catalog.get("domestic-corporate").expect("Corporate entry should exist.");

		assert_eq!(corporate.scope(), "paymentinitiation corporate");
		assert_eq!(corporate.corporate_id(), Some("5560000000"));
		assert_eq!(corporate.authentication_method_id.as_deref(), Some("mbid"));
		assert_eq!(catalog.names().collect::<Vec<_>>(), ["domestic-corporate", "domestic-private"]);
	}

	#[test]
	fn unknown_payment_is_a_config_error() {
		let catalog = PaymentCatalog::from_json(CATALOG).expect("Catalog should parse.");
		let err = catalog.get("missing").expect_err("Unknown names must fail.");

		assert!(matches!(
			err,
			Error::Config(ConfigError::PaymentNotFound { ref name }) if name == "missing"
		));
	}

	#[test]
	fn private_context_never_forwards_a_corporate_id() {
		let entry = CatalogEntry {
			bicfi: "ESSESESS".into(),
			service: "payments".into(),
			product: "domestic".into(),
			psu_context: PsuContext::Private,
			psu_corporate_id: Some("ignored".into()),
			authentication_method_id: None,
			body: serde_json::json!({}),
		};

		assert_eq!(entry.corporate_id(), None);
	}
}
