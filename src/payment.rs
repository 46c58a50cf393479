//! The payment record driven through one run, and the orchestrator that drives it.

pub mod orchestrator;

pub use orchestrator::*;

// self
use crate::{
	_prelude::*,
	config::CatalogEntry,
	sca::{ScaError, ScaMethod, ScaOutcome, ScaResolution},
};

/// One payment-initiation attempt.
///
/// Identity fields are fixed at construction. Identifiers, the SCA resolution, and the SCA
/// outcome are assigned once each as the run progresses; a second assignment is refused.
#[derive(Clone, Debug, PartialEq)]
pub struct Payment {
	/// Bank identifier code.
	pub bicfi: String,
	/// Payment service path segment, e.g. `payments`.
	pub service: String,
	/// Payment product path segment, e.g. `domestic`.
	pub product: String,
	/// Request body submitted on creation.
	pub body: serde_json::Value,
	payment_id: Option<String>,
	authorisation_id: Option<String>,
	sca_method: ScaMethod,
	sca_data: String,
	sca_outcome: Option<ScaOutcome>,
}
impl Payment {
	/// Creates a payment that has not been submitted yet.
	pub fn new(
		bicfi: impl Into<String>,
		service: impl Into<String>,
		product: impl Into<String>,
		body: serde_json::Value,
	) -> Self {
		Self {
			bicfi: bicfi.into(),
			service: service.into(),
			product: product.into(),
			body,
			payment_id: None,
			authorisation_id: None,
			sca_method: ScaMethod::Undefined,
			sca_data: String::new(),
			sca_outcome: None,
		}
	}

	/// Creates a payment from a catalog entry.
	pub fn from_entry(entry: &CatalogEntry) -> Self {
		Self::new(&entry.bicfi, &entry.service, &entry.product, entry.body.clone())
	}

	/// Identifier assigned on creation.
	pub fn payment_id(&self) -> Option<&str> {
		self.payment_id.as_deref()
	}

	/// Identifier of the running authorisation.
	pub fn authorisation_id(&self) -> Option<&str> {
		self.authorisation_id.as_deref()
	}

	/// Resolved SCA method.
	pub fn sca_method(&self) -> ScaMethod {
		self.sca_method
	}

	/// URL template or decoupled challenge for the resolved method.
	pub fn sca_data(&self) -> &str {
		&self.sca_data
	}

	/// Terminal SCA outcome, once the sub-flow has reported one.
	pub fn sca_outcome(&self) -> Option<ScaOutcome> {
		self.sca_outcome
	}

	/// Records the identifier assigned on creation.
	pub fn set_payment_id(&mut self, payment_id: impl Into<String>) -> Result<()> {
		assign_once(&mut self.payment_id, "payment id", payment_id.into())
	}

	/// Records the identifier of the running authorisation.
	pub fn set_authorisation_id(&mut self, authorisation_id: impl Into<String>) -> Result<()> {
		assign_once(&mut self.authorisation_id, "authorisation id", authorisation_id.into())
	}

	/// Records the SCA resolution; a resolved method never changes afterwards.
	pub fn record_sca(&mut self, resolution: ScaResolution) -> Result<()> {
		if self.sca_method.is_defined() {
			return Err(ScaError::AlreadyResolved { method: self.sca_method }.into());
		}

		self.sca_method = resolution.method;
		self.sca_data = resolution.data;

		Ok(())
	}

	/// Records the terminal SCA outcome; the sub-flow must not run again afterwards.
	pub fn record_sca_outcome(&mut self, outcome: ScaOutcome) -> Result<()> {
		if let Some(outcome) = self.sca_outcome {
			return Err(ScaError::AlreadyCompleted { outcome }.into());
		}

		self.sca_outcome = Some(outcome);

		Ok(())
	}

	/// Payment id or [`Error::MissingIdentifier`].
	pub fn require_payment_id(&self) -> Result<&str> {
		self.payment_id().ok_or(Error::MissingIdentifier { field: "payment id" })
	}

	/// Authorisation id or [`Error::MissingIdentifier`].
	pub fn require_authorisation_id(&self) -> Result<&str> {
		self.authorisation_id().ok_or(Error::MissingIdentifier { field: "authorisation id" })
	}
}

fn assign_once(slot: &mut Option<String>, field: &'static str, value: String) -> Result<()> {
	if slot.is_some() {
		return Err(Error::IdentifierReassigned { field });
	}

	*slot = Some(value);

	Ok(())
}

/// Transaction status string reported by the API.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionStatus(String);
impl TransactionStatus {
	/// Received but not processed yet; the only non-terminal value.
	pub const RECEIVED: &'static str = "RCVD";

	/// Wraps a status value.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Raw status value.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Whether the payment still waits for processing.
	pub fn is_pending(&self) -> bool {
		self.0 == Self::RECEIVED
	}
}
impl Display for TransactionStatus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
