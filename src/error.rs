//! Engine-level error types shared across the client, flows, pools, and stores.

// self
use crate::_prelude::*;

/// Engine-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical engine error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem; nothing was sent and nothing was persisted.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout) while exchanging a refresh token.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Enrichment request failed.
	#[error(transparent)]
	Enrichment(#[from] EnrichmentError),

	/// Provider answered the exchange with a non-200 status.
	#[error("Provider rejected the refresh token (HTTP {status}): {reason}.")]
	Rejected {
		/// HTTP status code returned by the token endpoint.
		status: u16,
		/// `code: message` from the provider error body, or the raw body.
		reason: String,
	},
	/// Provider answered 200 but the body did not carry both tokens.
	#[error("Token endpoint returned a malformed success response: {reason}.")]
	MalformedResponse {
		/// Parser diagnostic.
		reason: String,
	},
	/// Referenced record does not exist.
	#[error("{what} was not found.")]
	NotFound {
		/// Human-readable description of the missing entity.
		what: String,
	},
	/// Uniqueness constraint would be violated.
	#[error("Conflicting record: {reason}.")]
	Conflict {
		/// Which constraint was hit.
		reason: String,
	},
	/// Record has no access token yet, so enrichment cannot run.
	#[error("Record {id} has no access token; refresh it first.")]
	MissingAccessToken {
		/// Identifier of the record.
		id: i64,
	},
}
impl Error {
	pub(crate) fn record_not_found(id: i64) -> Self {
		Self::NotFound { what: format!("Record {id}") }
	}
}

/// Configuration and validation failures raised by the engine.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Proxy URI could not be parsed.
	#[error("Proxy `{proxy}` is not a valid URI.")]
	InvalidProxy {
		/// Proxy value as configured on the record.
		proxy: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Proxy URI uses a scheme the transport cannot route through.
	#[error("Proxy scheme `{scheme}` is not supported (expected http, https, or socks5).")]
	UnsupportedProxyScheme {
		/// Offending scheme.
		scheme: String,
	},
	/// A pool setting is not a JSON array of strings.
	#[error("Setting `{key}` is not a JSON array of strings.")]
	InvalidPool {
		/// Setting key that failed to parse.
		key: &'static str,
		/// Underlying JSON failure.
		#[source]
		source: serde_json::Error,
	},
	/// Refresh interval must be at least one day.
	#[error("Refresh interval must be at least one day, got {days}.")]
	InvalidInterval {
		/// Rejected value.
		days: u32,
	},
	/// Scheduler transitions must run inside a Tokio runtime.
	#[error("No Tokio runtime is available to host the refresh timer.")]
	NoRuntime,
	/// Engine configuration file could not be read.
	#[error("Engine configuration could not be read from {path}.")]
	SettingsIo {
		/// Path that failed.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Engine configuration could not be parsed.
	#[error("Engine configuration is invalid.")]
	SettingsParse {
		/// Path-aware parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Pacing bounds are inverted.
	#[error("Pacing range is inverted: {min_secs}s > {max_secs}s.")]
	InvalidPacing {
		/// Lower bound in seconds.
		min_secs: u64,
		/// Upper bound in seconds.
		max_secs: u64,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
impl From<wreq::Error> for ConfigError {
	fn from(e: wreq::Error) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint: {message}.")]
	Network {
		/// Rendered error text, also recorded on the token record.
		message: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { message: src.to_string(), source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Failures raised by the user-info and account-check calls.
#[derive(Debug, ThisError)]
pub enum EnrichmentError {
	/// Request never produced a response.
	#[error("Request to the {resource} endpoint failed.")]
	Request {
		/// Endpoint label.
		resource: &'static str,
		/// Underlying transport error.
		#[source]
		source: wreq::Error,
	},
	/// Endpoint returned a non-200 status.
	#[error("The {resource} endpoint returned HTTP {status}.")]
	Status {
		/// Endpoint label.
		resource: &'static str,
		/// HTTP status code.
		status: u16,
		/// Raw response body.
		body: String,
	},
	/// Endpoint returned a body that could not be parsed.
	#[error("The {resource} endpoint returned an unparsable body.")]
	Parse {
		/// Endpoint label.
		resource: &'static str,
		/// Path-aware parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn rejected_error_renders_status_and_reason() {
		let err = Error::Rejected { status: 401, reason: "invalid_grant: token expired".into() };

		assert_eq!(
			err.to_string(),
			"Provider rejected the refresh token (HTTP 401): invalid_grant: token expired."
		);
	}

	#[test]
	fn config_errors_convert_into_engine_errors() {
		let err: Error = ConfigError::UnsupportedProxyScheme { scheme: "ftp".into() }.into();

		assert!(matches!(err, Error::Config(ConfigError::UnsupportedProxyScheme { .. })));
		assert!(err.to_string().contains("ftp"));
	}
}
