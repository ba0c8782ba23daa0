//! Refresh-token records, creation drafts, operator patches, and the state transitions the
//! refresh flow applies to them.

pub mod secret;

pub use secret::TokenSecret;

// self
use crate::{
	_prelude::*,
	client::{AccountInfo, TokenGrant, UserInfo},
};

/// One tracked credential and its derived metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
	/// System-assigned primary identifier.
	pub id: i64,
	/// Unique, human-facing identifier.
	pub biz_id: String,
	/// Current secret used for the exchange.
	pub refresh_token: TokenSecret,
	/// Secret superseded by the last successful exchange.
	pub previous_refresh_token: Option<TokenSecret>,
	/// Most recent access token.
	pub access_token: Option<TokenSecret>,
	/// Raw text of the last exchange attempt, success or failure.
	pub last_refresh_result: String,
	/// Raw user-info payload.
	pub user_info: String,
	/// Raw account-check payload.
	pub account_info: String,
	/// Normalized plan classification.
	pub account_type: String,
	/// Email reported by the user-info endpoint.
	pub email: String,
	/// Display name reported by the user-info endpoint.
	pub user_name: String,
	/// Egress proxy URI, empty for a direct connection.
	pub proxy: String,
	/// OAuth client identifier presented during the exchange.
	pub client_id: String,
	/// Whether scheduled refresh picks this record up.
	pub enabled: bool,
	/// Instant of the last successful exchange.
	pub last_refresh_at: Option<OffsetDateTime>,
	/// Free-form operator tag.
	pub tag: String,
	/// Free-form operator memo.
	pub memo: String,
	/// Creation instant.
	pub created_at: OffsetDateTime,
	/// Last persisted mutation instant.
	pub updated_at: OffsetDateTime,
}
impl TokenRecord {
	/// Access token value, or an empty string when the record was never exchanged.
	pub fn access_token_str(&self) -> &str {
		self.access_token.as_ref().map(TokenSecret::expose).unwrap_or_default()
	}

	/// Rotates the credential pair after a successful exchange.
	///
	/// The prior refresh token moves into `previous_refresh_token` and both new secrets are
	/// adopted in the same call.
	pub(crate) fn adopt_grant(&mut self, grant: TokenGrant, now: OffsetDateTime) {
		let superseded = std::mem::replace(&mut self.refresh_token, grant.refresh_token);

		self.previous_refresh_token = Some(superseded);
		self.access_token = Some(grant.access_token);
		self.last_refresh_result = grant.raw;
		self.last_refresh_at = Some(now);
	}

	/// Records a failed exchange; secrets are left untouched.
	pub(crate) fn record_failure(&mut self, raw: String) {
		self.last_refresh_result = raw;
	}

	pub(crate) fn apply_user_info(&mut self, info: UserInfo) {
		self.user_info = info.raw;

		if let Some(email) = info.email.filter(|v| !v.is_empty()) {
			self.email = email;
		}
		if let Some(name) = info.name.filter(|v| !v.is_empty()) {
			self.user_name = name;
		}
	}

	pub(crate) fn apply_account_info(&mut self, info: AccountInfo) {
		self.account_info = info.raw;

		if let Some(plan) = info.plan_type {
			self.account_type = plan;
		}
	}

	/// Applies the recognized fields of an operator patch.
	pub(crate) fn apply_patch(&mut self, patch: RecordPatch) {
		if let Some(biz_id) = patch.biz_id.filter(|v| !v.trim().is_empty()) {
			self.biz_id = biz_id;
		}
		if let Some(proxy) = patch.proxy {
			self.proxy = proxy;
		}
		if let Some(tag) = patch.tag {
			self.tag = tag;
		}
		if let Some(enabled) = patch.enabled {
			self.enabled = enabled;
		}
		if let Some(memo) = patch.memo {
			self.memo = memo;
		}
	}
}

/// Draft used to create a record; the store assigns the id and timestamps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
	/// Requested business identifier; generated when blank.
	pub biz_id: Option<String>,
	/// Refresh token to track.
	pub refresh_token: TokenSecret,
	/// Egress proxy URI.
	pub proxy: String,
	/// OAuth client identifier.
	pub client_id: String,
	/// Free-form operator tag.
	pub tag: String,
	/// Free-form operator memo.
	pub memo: String,
	/// Whether scheduled refresh picks the record up.
	pub enabled: bool,
}
impl NewRecord {
	/// Creates an enabled draft for the provided refresh token.
	pub fn new(refresh_token: impl Into<String>) -> Self {
		Self {
			biz_id: None,
			refresh_token: TokenSecret::new(refresh_token),
			proxy: String::new(),
			client_id: String::new(),
			tag: String::new(),
			memo: String::new(),
			enabled: true,
		}
	}

	/// Sets the business identifier.
	pub fn biz_id(mut self, biz_id: impl Into<String>) -> Self {
		self.biz_id = Some(biz_id.into());

		self
	}

	/// Sets the egress proxy.
	pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
		self.proxy = proxy.into();

		self
	}

	/// Sets the OAuth client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = client_id.into();

		self
	}

	/// Sets the operator tag.
	pub fn tag(mut self, tag: impl Into<String>) -> Self {
		self.tag = tag.into();

		self
	}

	/// Sets the operator memo.
	pub fn memo(mut self, memo: impl Into<String>) -> Self {
		self.memo = memo.into();

		self
	}

	/// Overrides the enabled flag.
	pub fn enabled(mut self, enabled: bool) -> Self {
		self.enabled = enabled;

		self
	}

	/// Materializes the draft into a full record.
	pub(crate) fn into_record(self, id: i64, now: OffsetDateTime) -> TokenRecord {
		TokenRecord {
			id,
			biz_id: self.biz_id.unwrap_or_else(generate_biz_id),
			refresh_token: self.refresh_token,
			previous_refresh_token: None,
			access_token: None,
			last_refresh_result: String::new(),
			user_info: String::new(),
			account_info: String::new(),
			account_type: String::new(),
			email: String::new(),
			user_name: String::new(),
			proxy: self.proxy,
			client_id: self.client_id,
			enabled: self.enabled,
			last_refresh_at: None,
			tag: self.tag,
			memo: self.memo,
			created_at: now,
			updated_at: now,
		}
	}
}

/// Operator edit restricted to the mutable fields; `None` leaves a field untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPatch {
	/// New business identifier; blank values are ignored.
	pub biz_id: Option<String>,
	/// New proxy URI (empty clears it).
	pub proxy: Option<String>,
	/// New tag.
	pub tag: Option<String>,
	/// New enabled flag.
	pub enabled: Option<bool>,
	/// New memo.
	pub memo: Option<String>,
}

/// Generates a 32-character lowercase hex business identifier.
pub fn generate_biz_id() -> String {
	uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn record() -> TokenRecord {
		NewRecord::new("rt-old")
			.biz_id("alpha")
			.into_record(7, macros::datetime!(2025-01-01 00:00 UTC))
	}

	#[test]
	fn generated_biz_ids_are_hex_and_unique() {
		let a = generate_biz_id();
		let b = generate_biz_id();

		assert_eq!(a.len(), 32);
		assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
		assert_ne!(a, b);
	}

	#[test]
	fn adopt_grant_rotates_both_secrets_together() {
		let mut record = record();
		let now = macros::datetime!(2025-02-01 00:00 UTC);

		record.adopt_grant(
			TokenGrant {
				access_token: TokenSecret::new("at-new"),
				refresh_token: TokenSecret::new("rt-new"),
				expires_in: Some(3600),
				raw: "{\"ok\":true}".into(),
			},
			now,
		);

		assert_eq!(record.refresh_token.expose(), "rt-new");
		assert_eq!(record.previous_refresh_token.as_ref().map(TokenSecret::expose), Some("rt-old"));
		assert_eq!(record.access_token_str(), "at-new");
		assert_eq!(record.last_refresh_result, "{\"ok\":true}");
		assert_eq!(record.last_refresh_at, Some(now));
	}

	#[test]
	fn failure_only_touches_the_result_field() {
		let mut record = record();
		let before = record.clone();

		record.record_failure("HTTP 500".into());

		assert_eq!(record.refresh_token, before.refresh_token);
		assert_eq!(record.previous_refresh_token, before.previous_refresh_token);
		assert_eq!(record.last_refresh_result, "HTTP 500");
	}

	#[test]
	fn patch_ignores_blank_biz_id_and_applies_the_rest() {
		let mut record = record();

		record.apply_patch(RecordPatch {
			biz_id: Some("  ".into()),
			proxy: Some(String::new()),
			tag: Some("vip".into()),
			enabled: Some(false),
			memo: None,
		});

		assert_eq!(record.biz_id, "alpha");
		assert_eq!(record.proxy, "");
		assert_eq!(record.tag, "vip");
		assert!(!record.enabled);
	}

	#[test]
	fn enrichment_keeps_existing_identity_on_empty_fields() {
		let mut record = record();

		record.email = "kept@example.com".into();
		record.apply_user_info(UserInfo {
			email: Some(String::new()),
			name: Some("Ada".into()),
			raw: "{}".into(),
		});
		record.apply_account_info(AccountInfo { plan_type: None, raw: "{\"accounts\":{}}".into() });

		assert_eq!(record.email, "kept@example.com");
		assert_eq!(record.user_name, "Ada");
		assert_eq!(record.account_type, "");
		assert_eq!(record.account_info, "{\"accounts\":{}}");
	}
}
