//! Transport construction for provider calls.
//!
//! Every record carries its own egress proxy, so clients are built per proxy and cached in a
//! [`ClientCache`]. Exchange clients are plain reqwest clients that never follow redirects,
//! matching OAuth 2.0 guidance that token endpoints answer directly. Enrichment clients run on
//! wreq so the TLS handshake matches the [`BrowserProfile`] browser; they pin HTTP/1.1, send
//! only the profile headers, and leave compression off.

// std
use std::time::Duration as StdDuration;
// crates.io
use reqwest::{ClientBuilder, Proxy, redirect::Policy};
use wreq::{
	Client as BrowserClient, ClientBuilder as BrowserClientBuilder, Proxy as BrowserProxy,
	header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
	redirect::Policy as BrowserRedirect,
};
use wreq_util::EmulationOption;
// self
use crate::{_prelude::*, error::ConfigError, provider::BrowserProfile};

/// Egress route parsed from a record's `proxy` field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProxyRoute {
	/// Connect directly; environment proxies are ignored.
	Direct,
	/// Tunnel through the given proxy URI.
	Via(Url),
}
impl ProxyRoute {
	/// Parses a proxy URI; blank input means a direct connection.
	///
	/// Accepted schemes are `http`, `https`, and `socks5` (credentials in the userinfo part are
	/// forwarded to the proxy).
	pub fn parse(raw: &str) -> Result<Self, ConfigError> {
		let raw = raw.trim();

		if raw.is_empty() {
			return Ok(Self::Direct);
		}

		let url = Url::parse(raw)
			.map_err(|source| ConfigError::InvalidProxy { proxy: raw.into(), source })?;

		match url.scheme() {
			"http" | "https" | "socks5" => Ok(Self::Via(url)),
			scheme => Err(ConfigError::UnsupportedProxyScheme { scheme: scheme.into() }),
		}
	}

	fn apply(&self, builder: ClientBuilder) -> Result<ClientBuilder, ConfigError> {
		match self {
			Self::Direct => Ok(builder.no_proxy()),
			Self::Via(url) => Ok(builder.proxy(Proxy::all(url.as_str())?)),
		}
	}

	fn apply_browser(
		&self,
		builder: BrowserClientBuilder,
	) -> Result<BrowserClientBuilder, ConfigError> {
		match self {
			Self::Direct => Ok(builder.no_proxy()),
			Self::Via(url) => Ok(builder.proxy(BrowserProxy::all(url.as_str())?)),
		}
	}
}

/// Per-proxy cache of exchange ([`ReqwestClient`]) and enrichment ([`BrowserClient`]) handles.
#[derive(Debug)]
pub struct ClientCache {
	exchange_timeout: StdDuration,
	enrichment_timeout: StdDuration,
	profile: BrowserProfile,
	exchange: Mutex<HashMap<String, ReqwestClient>>,
	enrichment: Mutex<HashMap<String, BrowserClient>>,
}
impl ClientCache {
	/// Creates an empty cache with the provided timeouts.
	pub fn new(
		exchange_timeout: StdDuration,
		enrichment_timeout: StdDuration,
		profile: BrowserProfile,
	) -> Self {
		Self {
			exchange_timeout,
			enrichment_timeout,
			profile,
			exchange: Default::default(),
			enrichment: Default::default(),
		}
	}

	/// Browser profile presented by enrichment clients.
	pub fn profile(&self) -> &BrowserProfile {
		&self.profile
	}

	/// Returns the exchange client for `proxy`, building it on first use.
	pub fn exchange(&self, proxy: &str) -> Result<ReqwestClient, ConfigError> {
		get_or_build(&self.exchange, proxy, |route| {
			build_exchange_client(route, self.exchange_timeout)
		})
	}

	/// Returns the enrichment client for `proxy`, building it on first use.
	pub fn enrichment(&self, proxy: &str) -> Result<BrowserClient, ConfigError> {
		get_or_build(&self.enrichment, proxy, |route| {
			build_enrichment_client(route, self.enrichment_timeout, &self.profile)
		})
	}
}

fn get_or_build<C>(
	clients: &Mutex<HashMap<String, C>>,
	proxy: &str,
	build: impl FnOnce(&ProxyRoute) -> Result<C, ConfigError>,
) -> Result<C, ConfigError>
where
	C: Clone,
{
	let key = proxy.trim().to_owned();

	if let Some(client) = clients.lock().get(&key) {
		return Ok(client.clone());
	}

	let client = build(&ProxyRoute::parse(proxy)?)?;

	clients.lock().insert(key, client.clone());

	Ok(client)
}

/// Builds the client used for the refresh-token exchange.
pub fn build_exchange_client(
	route: &ProxyRoute,
	timeout: StdDuration,
) -> Result<ReqwestClient, ConfigError> {
	let builder = ReqwestClient::builder().timeout(timeout).redirect(Policy::none());

	Ok(route.apply(builder)?.build()?)
}

/// Builds the browser-shaped client used for enrichment calls.
///
/// The emulation supplies the TLS fingerprint only; its default headers are skipped so each
/// request carries exactly [`browser_headers`].
pub fn build_enrichment_client(
	route: &ProxyRoute,
	timeout: StdDuration,
	profile: &BrowserProfile,
) -> Result<BrowserClient, ConfigError> {
	let emulation =
		EmulationOption::builder().emulation(profile.emulation).skip_headers(true).build();
	let builder = BrowserClient::builder()
		.emulation(emulation)
		.timeout(timeout)
		.http1_only()
		.user_agent(profile.user_agent)
		.redirect(BrowserRedirect::limited(5));

	Ok(route.apply_browser(builder)?.build()?)
}

/// Assembles the ordered enrichment header set around a bearer credential.
pub fn browser_headers(profile: &BrowserProfile, access_token: &str) -> HeaderMap {
	let mut headers = HeaderMap::with_capacity(
		profile.leading_headers.len() + profile.trailing_headers.len() + 1,
	);

	for &(name, value) in profile.leading_headers {
		headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
	}
	if let Ok(mut bearer) = HeaderValue::from_str(&format!("Bearer {access_token}")) {
		bearer.set_sensitive(true);
		headers.insert(AUTHORIZATION, bearer);
	}
	for &(name, value) in profile.trailing_headers {
		headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
	}

	headers
}
