//! Runs one catalog payment against the configured PSD2 environment from a terminal.

// std
use std::{path::PathBuf, sync::Arc};
// crates.io
use clap::Parser;
use color_eyre::{Result, eyre::WrapErr};
use tracing_subscriber::EnvFilter;
// self
use psd2_sca::{
	api::PaymentApiClient,
	auth::AuthClient,
	config::{PaymentCatalog, Settings},
	http::ReqwestHttpClient,
	payment::{PaymentOrchestrator, RunSettings},
	poll,
	render::{ConsoleCodeSource, ConsolePresenter},
};

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
	/// Settings file (JSON).
	#[arg(long, short, env = "PSD2_SETTINGS", default_value = "settings.json")]
	settings: PathBuf,
	/// Payment catalog file (JSON).
	#[arg(long, short, env = "PSD2_CATALOG", default_value = "payments.json")]
	catalog: PathBuf,
	/// Catalog entry to run.
	payment: String,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("psd2_sca=info")),
		)
		.with_writer(std::io::stderr)
		.init();

	let cli = Cli::parse();
	let settings = Settings::load(&cli.settings)
		.wrap_err_with(|| format!("loading {}", cli.settings.display()))?;
	let catalog = PaymentCatalog::load(&cli.catalog)
		.wrap_err_with(|| format!("loading {}", cli.catalog.display()))?;
	let auth_http = ReqwestHttpClient::from_settings(&settings)?;
	let api_http = ReqwestHttpClient::from_settings(&settings)?;
	let orchestrator = PaymentOrchestrator::new(
		Arc::new(AuthClient::from_settings(&settings, auth_http)?),
		Arc::new(PaymentApiClient::from_settings(&settings, api_http)?),
		Arc::new(ConsolePresenter),
		Arc::new(ConsoleCodeSource),
		RunSettings::from_settings(&settings),
	);
	let (handle, cancel) = poll::cancellation();

	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			tracing::warn!("Interrupted; cancelling status polling.");
			handle.cancel();
		}
	});

	let report = orchestrator.run_named(&catalog, &cli.payment, &cancel).await?;

	match &report.transaction_status {
		Some(status) if report.is_success() =>
			println!("Payment {} finished with status {status}.", report.payment_id),
		_ => color_eyre::eyre::bail!(
			"SCA failed for payment {} ({} SCA).",
			report.payment_id,
			report.sca_method
		),
	}

	Ok(())
}
