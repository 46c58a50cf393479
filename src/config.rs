//! Settings, environments, and the payment catalog.
//!
//! Both files are JSON. Decoding goes through `serde_path_to_error` so a typo in a nested field
//! reports where it happened instead of a bare serde message.

pub mod catalog;

pub use catalog::*;

// std
use std::path::{Path, PathBuf};
// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError, poll::PollPolicy};

/// Environment variable consulted when the settings file carries no client secret.
pub const CLIENT_SECRET_ENV: &str = "PSD2_CLIENT_SECRET";
/// Deep-link template used for decoupled SCA when none is configured.
pub const DEFAULT_DECOUPLED_LINK_TEMPLATE: &str =
	"bankid:///?autostarttoken=[AUTOSTART_TOKEN]&redirect=null";

const DEFAULT_USER_AGENT: &str = concat!("psd2-sca/", env!("CARGO_PKG_VERSION"));

/// Target platform environment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
	#[default]
	/// Sandbox with test banks; no client certificate needed.
	Sandbox,
	/// Production; requires a client certificate.
	Production,
}
impl Environment {
	/// Returns a stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Environment::Sandbox => "sandbox",
			Environment::Production => "production",
		}
	}

	/// Whether mutual TLS is mandatory.
	pub const fn requires_certificate(self) -> bool {
		matches!(self, Environment::Production)
	}

	/// Default token endpoint.
	pub const fn token_url(self) -> &'static str {
		match self {
			Environment::Sandbox => "https://auth.sandbox.openbankingplatform.com/connect/token",
			Environment::Production => "https://auth.openbankingplatform.com/connect/token",
		}
	}

	/// Default payment API host.
	pub const fn api_url(self) -> &'static str {
		match self {
			Environment::Sandbox => "https://api.sandbox.openbankingplatform.com",
			Environment::Production => "https://api.openbankingplatform.com",
		}
	}
}
impl Display for Environment {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Resolved endpoint pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
	/// OAuth token endpoint.
	pub token: Url,
	/// Payment API host.
	pub api: Url,
}

/// Polling knobs as they appear in the settings file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
	/// Delay between two polls, in milliseconds.
	pub interval_ms: u64,
	/// Upper bound on polls; `null` for no bound.
	pub max_attempts: Option<u32>,
	/// Upper bound on total wait, in seconds; `null` for no bound.
	pub max_wait_secs: Option<u64>,
}
impl Default for PollingSettings {
	fn default() -> Self {
		let policy = PollPolicy::default();

		Self {
			interval_ms: policy.interval.as_millis() as u64,
			max_attempts: policy.max_attempts,
			max_wait_secs: policy.max_wait.map(|wait| wait.as_secs()),
		}
	}
}
impl From<&PollingSettings> for PollPolicy {
	fn from(value: &PollingSettings) -> Self {
		PollPolicy {
			interval: Duration::from_millis(value.interval_ms),
			max_attempts: value.max_attempts,
			max_wait: value.max_wait_secs.map(Duration::from_secs),
		}
	}
}

/// Client settings consumed by the token client, the API client, and the SCA flow.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret; falls back to [`CLIENT_SECRET_ENV`].
	#[serde(default)]
	pub client_secret: Option<TokenSecret>,
	/// Redirect URI registered for the client.
	pub redirect_uri: Url,
	/// Target environment.
	#[serde(default)]
	pub environment: Environment,
	/// Overrides the environment's token endpoint.
	#[serde(default)]
	pub token_url: Option<Url>,
	/// Overrides the environment's API host.
	#[serde(default)]
	pub api_url: Option<Url>,
	/// IP address of the PSU, forwarded as `PSU-IP-Address`.
	pub psu_ip_address: String,
	/// User agent for outgoing requests, also forwarded as `PSU-User-Agent`.
	#[serde(default = "default_user_agent")]
	pub user_agent: String,
	/// PEM bundle (certificate + private key) for mutual TLS.
	#[serde(default)]
	pub client_certificate: Option<PathBuf>,
	/// Polling behavior for SCA and payment status.
	#[serde(default)]
	pub polling: PollingSettings,
	/// Deep-link template for decoupled SCA; `[AUTOSTART_TOKEN]` is replaced by the challenge.
	#[serde(default = "default_decoupled_link_template")]
	pub decoupled_link_template: String,
	/// Fixed OAuth state token; a random one is generated per run when absent.
	#[serde(default)]
	pub state: Option<String>,
}
impl Settings {
	/// Creates sandbox settings with defaults for everything optional.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		redirect_uri: Url,
		psu_ip_address: impl Into<String>,
	) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: Some(TokenSecret::new(client_secret)),
			redirect_uri,
			environment: Environment::default(),
			token_url: None,
			api_url: None,
			psu_ip_address: psu_ip_address.into(),
			user_agent: default_user_agent(),
			client_certificate: None,
			polling: PollingSettings::default(),
			decoupled_link_template: default_decoupled_link_template(),
			state: None,
		}
	}

	/// Loads settings from a JSON file and applies the environment secret fallback.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let mut settings: Self = read_json(path.as_ref())?;

		if settings.client_secret.is_none() {
			settings.client_secret = std::env::var(CLIENT_SECRET_ENV).ok().map(TokenSecret::new);
		}

		Ok(settings)
	}

	/// Points both endpoints at custom hosts (mock servers, proxies).
	pub fn with_endpoints(mut self, token_url: Url, api_url: Url) -> Self {
		self.token_url = Some(token_url);
		self.api_url = Some(api_url);

		self
	}

	/// Overrides the polling behavior.
	pub fn with_polling(mut self, policy: &PollPolicy) -> Self {
		self.polling = PollingSettings {
			interval_ms: policy.interval.as_millis() as u64,
			max_attempts: policy.max_attempts,
			max_wait_secs: policy.max_wait.map(|wait| wait.as_secs()),
		};

		self
	}

	/// Returns the configured client secret.
	pub fn client_secret(&self) -> Result<&TokenSecret> {
		self.client_secret.as_ref().ok_or_else(|| ConfigError::MissingClientSecret.into())
	}

	/// Resolves endpoints, preferring explicit overrides over the environment defaults.
	pub fn endpoints(&self) -> Result<Endpoints> {
		let token = match &self.token_url {
			Some(url) => url.clone(),
			None => Url::parse(self.environment.token_url())
				.map_err(|source| ConfigError::InvalidUrl { field: "token_url", source })?,
		};
		let api = match &self.api_url {
			Some(url) => url.clone(),
			None => Url::parse(self.environment.api_url())
				.map_err(|source| ConfigError::InvalidUrl { field: "api_url", source })?,
		};

		Ok(Endpoints { token, api })
	}

	/// Polling policy derived from [`Settings::polling`].
	pub fn poll_policy(&self) -> PollPolicy {
		PollPolicy::from(&self.polling)
	}
}

fn default_user_agent() -> String {
	DEFAULT_USER_AGENT.into()
}

fn default_decoupled_link_template() -> String {
	DEFAULT_DECOUPLED_LINK_TEMPLATE.into()
}

pub(crate) fn read_json<T>(path: &Path) -> Result<T>
where
	T: DeserializeOwned,
{
	let display = path.display().to_string();
	let raw = std::fs::read_to_string(path)
		.map_err(|source| ConfigError::Read { path: display.clone(), source })?;

	parse_json(&display, &raw)
}

pub(crate) fn parse_json<T>(label: &str, raw: &str) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut de = serde_json::Deserializer::from_str(raw);

	serde_path_to_error::deserialize(&mut de)
		.map_err(|source| ConfigError::Parse { path: label.into(), source }.into())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn defaults_fill_optional_fields() {
		let settings: Settings = parse_json(
			"settings",
			r#"{
				"client_id": "client",
				"client_secret": "secret",
				"redirect_uri": "https://tpp.example.com/callback",
				"psu_ip_address": "10.0.0.1"
			}"#,
		)
		.expect("Minimal settings should parse.");

		assert_eq!(settings.environment, Environment::Sandbox);
		assert_eq!(settings.decoupled_link_template, DEFAULT_DECOUPLED_LINK_TEMPLATE);
		assert_eq!(settings.poll_policy(), PollPolicy::default());
		assert!(settings.user_agent.starts_with("psd2-sca/"));
		assert_eq!(
			settings.client_secret().expect("Secret should be present.").expose(),
			"secret"
		);

		let endpoints = settings.endpoints().expect("Default endpoints should parse.");

		assert_eq!(endpoints.api.as_str(), "https://api.sandbox.openbankingplatform.com/");
	}

	#[test]
	fn overrides_take_precedence_over_environment() {
		let settings: Settings = parse_json(
			"settings",
			r#"{
				"client_id": "client",
				"redirect_uri": "https://tpp.example.com/callback",
				"psu_ip_address": "10.0.0.1",
				"environment": "production",
				"api_url": "https://proxy.example.com",
				"polling": { "interval_ms": 500, "max_attempts": 3, "max_wait_secs": null }
			}"#,
		)
		.expect("Settings with overrides should parse.");
		let endpoints = settings.endpoints().expect("Endpoints should resolve.");

		assert_eq!(endpoints.api.as_str(), "https://proxy.example.com/");
		assert_eq!(endpoints.token.as_str(), Environment::Production.token_url());
		assert!(settings.environment.requires_certificate());

		let policy = settings.poll_policy();

		assert_eq!(policy.interval, Duration::from_millis(500));
		assert_eq!(policy.max_attempts, Some(3));
		assert_eq!(policy.max_wait, None);
	}

	#[test]
	fn parse_errors_report_the_field_path() {
		let err = parse_json::<Settings>(
			"settings.json",
			r#"{
				"client_id": "client",
				"redirect_uri": "not a url",
				"psu_ip_address": "10.0.0.1"
			}"#,
		)
		.expect_err("Invalid redirect URI should fail.");

		match err {
			Error::Config(ConfigError::Parse { path, source }) => {
				assert_eq!(path, "settings.json");
				assert_eq!(source.path().to_string(), "redirect_uri");
			},
			other => panic!("Unexpected error: {other:?}"),
		}
	}
}
