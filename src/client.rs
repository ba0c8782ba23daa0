//! Protocol client for the identity provider: the refresh-token exchange plus the two
//! enrichment reads.

// std
use std::time::Duration as StdDuration;
// crates.io
use reqwest::{StatusCode, header::CONTENT_TYPE};
// self
use crate::{
	_prelude::*,
	config::EngineConfig,
	error::{ConfigError, EnrichmentError, TransportError},
	http::{ClientCache, browser_headers},
	provider::{BrowserProfile, ProviderEndpoints},
	record::{TokenRecord, TokenSecret},
};

const USER_INFO: &str = "user-info";
const ACCOUNT_CHECK: &str = "account-check";
const FREE_PLAN: &str = "free";

/// Credentials returned by a successful exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenGrant {
	/// Fresh access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token.
	pub refresh_token: TokenSecret,
	/// Access-token lifetime in seconds, when reported.
	pub expires_in: Option<u64>,
	/// Raw response body.
	pub raw: String,
}

/// Why an exchange did not produce a [`TokenGrant`].
#[derive(Debug)]
pub enum ExchangeFailure {
	/// Request never produced a readable response.
	Transport(TransportError),
	/// Provider answered with a non-200 status.
	Rejected {
		/// HTTP status code.
		status: u16,
		/// Raw response body.
		raw: String,
		/// `code: message` when the body has the provider error shape, otherwise
		/// `HTTP {status}: {body}`.
		reason: String,
	},
	/// Provider answered 200 without a usable token pair.
	Malformed {
		/// Raw response body.
		raw: String,
		/// Parser diagnostic.
		reason: String,
	},
}
impl ExchangeFailure {
	/// Text persisted into `last_refresh_result`.
	pub fn raw(&self) -> String {
		match self {
			Self::Transport(TransportError::Network { message, .. }) => message.clone(),
			Self::Rejected { raw, .. } | Self::Malformed { raw, .. } => raw.clone(),
		}
	}

	/// Converts the failure into the error surfaced to the caller.
	pub fn into_error(self) -> Error {
		match self {
			Self::Transport(e) => Error::Transport(e),
			Self::Rejected { status, reason, .. } => Error::Rejected { status, reason },
			Self::Malformed { reason, .. } => Error::MalformedResponse { reason },
		}
	}
}

/// Result of one exchange attempt that reached the network.
#[derive(Debug)]
pub enum ExchangeOutcome {
	/// Provider issued a new token pair.
	Exchanged(TokenGrant),
	/// Attempt failed; the record should keep its secrets.
	Failed(ExchangeFailure),
}

/// Identity derived from the user-info endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserInfo {
	/// Reported email address.
	pub email: Option<String>,
	/// Reported display name.
	pub name: Option<String>,
	/// Raw response body.
	pub raw: String,
}

/// Plan classification derived from the account-check endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountInfo {
	/// Selected plan; `None` when no account reported one.
	pub plan_type: Option<String>,
	/// Raw response body.
	pub raw: String,
}

#[derive(Deserialize)]
struct TokenResponseBody {
	#[serde(default)]
	access_token: Option<String>,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct ProviderErrorBody {
	error: ProviderErrorDetail,
}
#[derive(Deserialize)]
struct ProviderErrorDetail {
	#[serde(default)]
	code: Option<String>,
	#[serde(default)]
	message: Option<String>,
}

#[derive(Deserialize)]
struct UserInfoBody {
	#[serde(default)]
	email: Option<String>,
	#[serde(default)]
	name: Option<String>,
}

/// Wire shape of the account-check response.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AccountCheckBody {
	/// Accounts keyed by account id.
	#[serde(default)]
	pub accounts: BTreeMap<String, AccountEntry>,
	/// Preferred visiting order of account ids.
	#[serde(default)]
	pub account_ordering: Vec<String>,
}

/// One entry of [`AccountCheckBody::accounts`].
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AccountEntry {
	/// Account detail, absent on partial responses.
	#[serde(default)]
	pub account: Option<AccountDetail>,
}

/// Account detail carrying the plan.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AccountDetail {
	/// Plan identifier such as `free` or `plus`.
	#[serde(default)]
	pub plan_type: Option<String>,
}

/// Picks the plan to record for an account-check response.
///
/// Accounts are visited in `account_ordering` order, then the remaining ids in lexicographic
/// order. The first plan that is neither empty nor `free` wins; otherwise `free` if any
/// account reported it.
pub fn derive_account_type(body: &AccountCheckBody) -> Option<String> {
	let ordered = body.account_ordering.iter().filter(|id| body.accounts.contains_key(*id));
	let rest = body.accounts.keys().filter(|id| !body.account_ordering.contains(*id));
	let mut saw_free = false;

	for id in ordered.chain(rest) {
		let plan = body
			.accounts
			.get(id)
			.and_then(|entry| entry.account.as_ref())
			.and_then(|detail| detail.plan_type.as_deref())
			.unwrap_or_default();

		match plan {
			"" => {},
			FREE_PLAN => saw_free = true,
			paid => return Some(paid.to_owned()),
		}
	}

	saw_free.then(|| FREE_PLAN.to_owned())
}

/// HTTP client for every provider call the engine makes.
#[derive(Debug)]
pub struct ProtocolClient {
	endpoints: ProviderEndpoints,
	default_client_id: String,
	clients: ClientCache,
}
impl ProtocolClient {
	/// Creates a client for the provided endpoints.
	pub fn new(
		endpoints: ProviderEndpoints,
		default_client_id: impl Into<String>,
		clients: ClientCache,
	) -> Self {
		Self { endpoints, default_client_id: default_client_id.into(), clients }
	}

	/// Creates a client from engine configuration.
	pub fn from_config(config: &EngineConfig) -> Self {
		let clients = ClientCache::new(
			StdDuration::from_secs(config.exchange_timeout_secs),
			StdDuration::from_secs(config.enrichment_timeout_secs),
			BrowserProfile::default(),
		);

		Self::new(config.endpoints.clone(), config.effective_client_id(), clients)
	}

	/// Endpoint set this client targets.
	pub fn endpoints(&self) -> &ProviderEndpoints {
		&self.endpoints
	}

	/// Client identifier presented for `record`.
	pub fn client_id_for<'a>(&'a self, record: &'a TokenRecord) -> &'a str {
		if record.client_id.trim().is_empty() { &self.default_client_id } else { &record.client_id }
	}

	/// Exchanges the record's refresh token for a new credential pair.
	///
	/// Only local configuration problems (an unusable proxy) are returned as `Err`; anything
	/// that happened on the wire is reported through [`ExchangeOutcome`].
	pub async fn exchange_token(
		&self,
		record: &TokenRecord,
	) -> Result<ExchangeOutcome, ConfigError> {
		let client = self.clients.exchange(&record.proxy)?;
		let payload = serde_json::json!({
			"client_id": self.client_id_for(record),
			"grant_type": "refresh_token",
			"redirect_uri": self.endpoints.redirect_uri,
			"refresh_token": record.refresh_token.expose(),
		})
		.to_string();
		let response = match client
			.post(self.endpoints.token.clone())
			.header(CONTENT_TYPE, "application/json")
			.body(payload)
			.send()
			.await
		{
			Ok(response) => response,
			Err(e) => return Ok(ExchangeOutcome::Failed(ExchangeFailure::Transport(e.into()))),
		};
		let status = response.status();
		let raw = match response.text().await {
			Ok(raw) => raw,
			Err(e) => return Ok(ExchangeOutcome::Failed(ExchangeFailure::Transport(e.into()))),
		};

		if status != StatusCode::OK {
			let reason = rejection_reason(status.as_u16(), &raw);

			return Ok(ExchangeOutcome::Failed(ExchangeFailure::Rejected {
				status: status.as_u16(),
				raw,
				reason,
			}));
		}

		Ok(parse_grant(raw))
	}

	/// Reads `{email, name}` for the record's access token.
	pub async fn fetch_user_info(&self, record: &TokenRecord) -> Result<UserInfo> {
		let raw = self.enrichment_get(record, &self.endpoints.user_info, USER_INFO).await?;
		let parsed: UserInfoBody = parse_enrichment(USER_INFO, &raw)?;

		Ok(UserInfo { email: parsed.email, name: parsed.name, raw })
	}

	/// Reads the account list for the record's access token and derives its plan.
	pub async fn fetch_account_info(&self, record: &TokenRecord) -> Result<AccountInfo> {
		let raw = self.enrichment_get(record, &self.endpoints.account_check, ACCOUNT_CHECK).await?;
		let parsed: AccountCheckBody = parse_enrichment(ACCOUNT_CHECK, &raw)?;

		Ok(AccountInfo { plan_type: derive_account_type(&parsed), raw })
	}

	async fn enrichment_get(
		&self,
		record: &TokenRecord,
		url: &Url,
		resource: &'static str,
	) -> Result<String> {
		let client = self.clients.enrichment(&record.proxy)?;
		let headers = browser_headers(self.clients.profile(), record.access_token_str());
		let response = client
			.get(url.as_str())
			.headers(headers)
			.send()
			.await
			.map_err(|source| EnrichmentError::Request { resource, source })?;
		let status = response.status();
		let body =
			response.text().await.map_err(|source| EnrichmentError::Request { resource, source })?;

		if status != wreq::StatusCode::OK {
			return Err(EnrichmentError::Status { resource, status: status.as_u16(), body }.into());
		}

		Ok(body)
	}
}

fn parse_grant(raw: String) -> ExchangeOutcome {
	let mut de = serde_json::Deserializer::from_str(&raw);
	let parsed: TokenResponseBody = match serde_path_to_error::deserialize(&mut de) {
		Ok(parsed) => parsed,
		Err(e) =>
			return ExchangeOutcome::Failed(ExchangeFailure::Malformed {
				reason: e.to_string(),
				raw,
			}),
	};
	let access = parsed.access_token.filter(|v| !v.is_empty());
	let refresh = parsed.refresh_token.filter(|v| !v.is_empty());

	match (access, refresh) {
		(Some(access), Some(refresh)) => ExchangeOutcome::Exchanged(TokenGrant {
			access_token: TokenSecret::new(access),
			refresh_token: TokenSecret::new(refresh),
			expires_in: parsed.expires_in,
			raw,
		}),
		(access, _) => ExchangeOutcome::Failed(ExchangeFailure::Malformed {
			reason: if access.is_none() {
				"missing access_token".into()
			} else {
				"missing refresh_token".into()
			},
			raw,
		}),
	}
}

fn rejection_reason(status: u16, raw: &str) -> String {
	match serde_json::from_str::<ProviderErrorBody>(raw) {
		Ok(ProviderErrorBody { error }) if error.code.is_some() || error.message.is_some() =>
			format!("{}: {}", error.code.unwrap_or_default(), error.message.unwrap_or_default()),
		_ => format!("HTTP {status}: {raw}"),
	}
}

fn parse_enrichment<T>(resource: &'static str, raw: &str) -> Result<T, EnrichmentError>
where
	T: serde::de::DeserializeOwned,
{
	let mut de = serde_json::Deserializer::from_str(raw);

	serde_path_to_error::deserialize(&mut de)
		.map_err(|source| EnrichmentError::Parse { resource, source })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn accounts(json: &str) -> AccountCheckBody {
		serde_json::from_str(json).expect("Account fixture should deserialize.")
	}

	#[test]
	fn paid_plan_beats_free() {
		let body = accounts(
			r#"{"accounts":{"a":{"account":{"plan_type":"free"}},"b":{"account":{"plan_type":"plus"}}}}"#,
		);

		assert_eq!(derive_account_type(&body).as_deref(), Some("plus"));
	}

	#[test]
	fn account_ordering_decides_between_paid_plans() {
		let body = accounts(
			r#"{"accounts":{"a":{"account":{"plan_type":"plus"}},"b":{"account":{"plan_type":"team"}}},"account_ordering":["b","a"]}"#,
		);

		assert_eq!(derive_account_type(&body).as_deref(), Some("team"));
	}

	#[test]
	fn free_only_and_empty_responses() {
		let free = accounts(r#"{"accounts":{"a":{"account":{"plan_type":"free"}},"b":{}}}"#);
		let empty = accounts(r#"{"accounts":{}}"#);

		assert_eq!(derive_account_type(&free).as_deref(), Some("free"));
		assert_eq!(derive_account_type(&empty), None);
	}

	#[test]
	fn rejection_reason_prefers_provider_error_shape() {
		assert_eq!(
			rejection_reason(
				401,
				r#"{"error":{"code":"invalid_grant","message":"Refresh token expired"}}"#
			),
			"invalid_grant: Refresh token expired"
		);
		assert_eq!(
			rejection_reason(502, "<html>bad gateway</html>"),
			"HTTP 502: <html>bad gateway</html>"
		);
	}

	#[test]
	fn success_body_without_refresh_token_is_malformed() {
		let outcome = parse_grant(r#"{"access_token":"at-1"}"#.into());

		assert!(matches!(
			outcome,
			ExchangeOutcome::Failed(ExchangeFailure::Malformed { ref raw, .. }) if raw.contains("at-1")
		));
	}
}
