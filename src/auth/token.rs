//! Bearer tokens issued by the authorization server.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Access token plus the bookkeeping needed to log and attach it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerToken {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Token type reported by the server (normally `Bearer`).
	pub token_type: String,
	/// Instant the token was received.
	pub issued_at: OffsetDateTime,
	/// Expiry derived from `expires_in`, when the server sent one.
	pub expires_at: Option<OffsetDateTime>,
}
impl BearerToken {
	/// Creates a token issued at `issued_at` that lives for `expires_in` seconds.
	pub fn new(
		access_token: impl Into<String>,
		token_type: impl Into<String>,
		issued_at: OffsetDateTime,
		expires_in: Option<u64>,
	) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			token_type: token_type.into(),
			issued_at,
			expires_at: expires_in.map(|secs| issued_at + Duration::from_secs(secs)),
		}
	}

	/// True when the server handed back an empty token.
	pub fn is_empty(&self) -> bool {
		self.access_token.is_blank()
	}

	/// Value for the `Authorization` header.
	pub fn authorization(&self) -> String {
		format!("Bearer {}", self.access_token.expose())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn expiry_is_relative_to_issue_time() {
		let issued = OffsetDateTime::now_utc();
		let token = BearerToken::new("abc", "Bearer", issued, Some(60));

		assert_eq!(token.expires_at, Some(issued + Duration::from_secs(60)));
		assert_eq!(token.authorization(), "Bearer abc");
		assert!(!format!("{token:?}").contains("abc"));
	}

	#[test]
	fn blank_tokens_are_empty() {
		let token = BearerToken::new("", "Bearer", OffsetDateTime::now_utc(), None);

		assert!(token.is_empty());
		assert!(token.expires_at.is_none());
	}
}
