//! Identity-provider descriptor: endpoints, redirect URI, and the browser profile presented on
//! enrichment calls.

// crates.io
use wreq_util::Emulation;
// self
use crate::_prelude::*;

/// Token endpoint used for refresh-token exchanges.
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://auth.openai.com/oauth/token";
/// Redirect URI registered for the mobile client.
pub const DEFAULT_REDIRECT_URI: &str =
	"com.openai.chat://auth0.openai.com/ios/com.openai.chat/callback";
/// Endpoint returning `{email, name}` for the bearer.
pub const DEFAULT_USER_INFO_ENDPOINT: &str = "https://chatgpt.com/backend-api/me";
/// Endpoint listing the bearer's accounts and plans.
pub const DEFAULT_ACCOUNT_CHECK_ENDPOINT: &str =
	"https://chatgpt.com/backend-api/accounts/check/v4-2023-04-27?timezone_offset_min=-480";
/// Client identifier used when neither the record nor the pool supplies one.
pub const FALLBACK_CLIENT_ID: &str = "app_WXrF1LSkiTtfYqiL6XtjygvX";

/// Endpoint set the protocol client talks to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderEndpoints {
	/// Token endpoint accepting the JSON refresh grant.
	pub token: Url,
	/// User-info endpoint.
	pub user_info: Url,
	/// Account-check endpoint.
	pub account_check: Url,
	/// Redirect URI sent with every exchange.
	pub redirect_uri: String,
}
impl Default for ProviderEndpoints {
	fn default() -> Self {
		Self {
			token: Url::parse(DEFAULT_TOKEN_ENDPOINT).expect("Default token endpoint is valid."),
			user_info: Url::parse(DEFAULT_USER_INFO_ENDPOINT)
				.expect("Default user-info endpoint is valid."),
			account_check: Url::parse(DEFAULT_ACCOUNT_CHECK_ENDPOINT)
				.expect("Default account-check endpoint is valid."),
			redirect_uri: DEFAULT_REDIRECT_URI.into(),
		}
	}
}

/// TLS and header fingerprint presented by the enrichment client.
///
/// The TLS handshake follows [`Self::emulation`]. Headers are emitted in the listed order on
/// every request; `authorization` is inserted after `accept-language`, matching what the
/// emulated browser sends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BrowserProfile {
	/// Browser whose TLS handshake is reproduced.
	pub emulation: Emulation,
	/// User agent string.
	pub user_agent: &'static str,
	/// Headers sent before the bearer credential.
	pub leading_headers: &'static [(&'static str, &'static str)],
	/// Headers sent after the bearer credential.
	pub trailing_headers: &'static [(&'static str, &'static str)],
}
impl BrowserProfile {
	/// Firefox 133 on macOS.
	pub const FIREFOX_133: Self = Self {
		emulation: Emulation::Firefox133,
		user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
		leading_headers: &[("accept", "*/*"), ("accept-language", "zh-CN,zh;q=0.9,en;q=0.8")],
		trailing_headers: &[
			("dnt", "1"),
			("oai-language", "zh-CN"),
			("priority", "u=1"),
			("referer", "https://chatgpt.com/"),
			("sec-fetch-dest", "empty"),
			("sec-fetch-mode", "cors"),
			("sec-fetch-site", "same-origin"),
		],
	};
}
impl Default for BrowserProfile {
	fn default() -> Self {
		Self::FIREFOX_133
	}
}
