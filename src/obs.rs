//! Observability helpers for payment flows.
//!
//! Every stage runs inside a `psd2_sca.flow` span carrying `flow` (what is being done) and
//! `stage` (call site) fields. Enable the `metrics` feature to also increment
//! `psd2_sca_flow_total`, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use self::metrics::*;
pub use self::tracing::*;

// self
use crate::_prelude::*;

/// Flow stages observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Client Credentials grant.
	ClientCredentials,
	/// Authorization Code exchange after OAuth-redirect SCA.
	AuthorizationCode,
	/// Payment creation.
	CreatePayment,
	/// Authorisation creation.
	StartAuthorisation,
	/// PSU data update and SCA classification.
	UpdatePsuData,
	/// SCA sub-flow, including status polling.
	Sca,
	/// Payment status polling.
	PaymentStatus,
	/// Whole payment run.
	Payment,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::ClientCredentials => "client_credentials",
			FlowKind::AuthorizationCode => "authorization_code",
			FlowKind::CreatePayment => "create_payment",
			FlowKind::StartAuthorisation => "start_authorisation",
			FlowKind::UpdatePsuData => "update_psu_data",
			FlowKind::Sca => "sca",
			FlowKind::PaymentStatus => "payment_status",
			FlowKind::Payment => "payment",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a stage.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Records success or failure for a finished stage.
pub fn record_result<T>(kind: FlowKind, result: &Result<T>) {
	match result {
		Ok(_) => record_flow_outcome(kind, FlowOutcome::Success),
		Err(_) => record_flow_outcome(kind, FlowOutcome::Failure),
	}
}
