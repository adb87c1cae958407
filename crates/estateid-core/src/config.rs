//! Client configuration.
//!
//! All configuration is driven by environment variables. The backend host is
//! required; everything else has a default.

use std::fmt;
use std::str::FromStr;

use http::uri::{Authority, Scheme};
use typed_builder::TypedBuilder;

use crate::CoreError;

/// Default identity provider region.
const DEFAULT_IDENTITY_REGION: &str = "ap-northeast-1";

/// Default number of files uploaded concurrently within one session.
const DEFAULT_UPLOAD_CONCURRENCY: usize = 4;

/// Scheme and authority of the backend API.
///
/// Parsed from a bare host name (`api.example.com`, HTTPS assumed) or from a
/// URL with an explicit `http://` / `https://` scheme. Paths are not allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoint {
    scheme: Scheme,
    authority: Authority,
}

impl ApiEndpoint {
    /// The URL scheme (`https` unless configured otherwise).
    #[must_use]
    pub fn scheme(&self) -> &str {
        self.scheme.as_str()
    }

    /// The host (with port, if any) used for the `host` header and signing.
    #[must_use]
    pub fn host(&self) -> &str {
        self.authority.as_str()
    }

    /// Build an absolute URL for a backend route.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}://{}{path}", self.scheme, self.authority)
    }
}

impl FromStr for ApiEndpoint {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches('/');
        let (scheme, rest) = if let Some(rest) = trimmed.strip_prefix("https://") {
            (Scheme::HTTPS, rest)
        } else if let Some(rest) = trimmed.strip_prefix("http://") {
            (Scheme::HTTP, rest)
        } else if trimmed.contains("://") {
            return Err(CoreError::Config(format!(
                "unsupported scheme in API endpoint: {trimmed}"
            )));
        } else {
            (Scheme::HTTPS, trimmed)
        };

        if rest.is_empty() || rest.contains('/') {
            return Err(CoreError::Config(format!(
                "API endpoint must be a host name: {s}"
            )));
        }

        let authority = Authority::from_str(rest)
            .map_err(|e| CoreError::Config(format!("invalid API endpoint {s}: {e}")))?;

        Ok(Self { scheme, authority })
    }
}

impl fmt::Display for ApiEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority)
    }
}

/// Managed identity service settings.
///
/// The login flow itself happens outside this client. The shell reports these
/// values at startup so the pools behind the supplied credentials are visible
/// in the logs.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct IdentityPoolConfig {
    /// Region of the identity provider.
    #[builder(default = String::from(DEFAULT_IDENTITY_REGION))]
    pub region: String,
    /// User pool id.
    #[builder(default)]
    pub user_pool_id: String,
    /// App client id of the user pool.
    #[builder(default)]
    pub client_id: String,
    /// Identity pool id exchanging user tokens for credentials.
    #[builder(default)]
    pub identity_pool_id: String,
}

impl Default for IdentityPoolConfig {
    fn default() -> Self {
        Self {
            region: String::from(DEFAULT_IDENTITY_REGION),
            user_pool_id: String::new(),
            client_id: String::new(),
            identity_pool_id: String::new(),
        }
    }
}

impl IdentityPoolConfig {
    /// Whether both the user pool and the identity pool are set.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.user_pool_id.is_empty() && !self.identity_pool_id.is_empty()
    }
}

impl fmt::Display for IdentityPoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn or_unset(value: &str) -> &str {
            if value.is_empty() { "<unset>" } else { value }
        }

        write!(
            f,
            "region={} user_pool={} client={} identity_pool={}",
            self.region,
            or_unset(&self.user_pool_id),
            or_unset(&self.client_id),
            or_unset(&self.identity_pool_id),
        )
    }
}

/// Upload client configuration.
///
/// # Examples
///
/// ```
/// use estateid_core::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .api_endpoint("api.example.com".parse().unwrap())
///     .build();
/// assert_eq!(config.api_endpoint.host(), "api.example.com");
/// assert_eq!(config.upload_concurrency, 4);
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct ClientConfig {
    /// Backend API host.
    pub api_endpoint: ApiEndpoint,

    /// Identity provider settings.
    #[builder(default)]
    pub identity: IdentityPoolConfig,

    /// Maximum number of files in flight per session.
    #[builder(default = DEFAULT_UPLOAD_CONCURRENCY)]
    pub upload_concurrency: usize,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `ESTATEID_API_ENDPOINT` | *(required)* |
    /// | `ESTATEID_COGNITO_REGION` | `ap-northeast-1` |
    /// | `ESTATEID_COGNITO_USER_POOL_ID` | empty |
    /// | `ESTATEID_COGNITO_CLIENT_ID` | empty |
    /// | `ESTATEID_COGNITO_IDENTITY_POOL_ID` | empty |
    /// | `ESTATEID_UPLOAD_CONCURRENCY` | `4` |
    /// | `LOG_LEVEL` | `info` |
    ///
    /// # Errors
    /// Returns [`CoreError::Config`] if the endpoint is missing or invalid, or
    /// if the concurrency is not a positive integer.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup("ESTATEID_API_ENDPOINT")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| CoreError::Config("ESTATEID_API_ENDPOINT is not set".to_owned()))?;

        let mut identity = IdentityPoolConfig::default();
        if let Some(v) = lookup("ESTATEID_COGNITO_REGION") {
            identity.region = v;
        }
        if let Some(v) = lookup("ESTATEID_COGNITO_USER_POOL_ID") {
            identity.user_pool_id = v;
        }
        if let Some(v) = lookup("ESTATEID_COGNITO_CLIENT_ID") {
            identity.client_id = v;
        }
        if let Some(v) = lookup("ESTATEID_COGNITO_IDENTITY_POOL_ID") {
            identity.identity_pool_id = v;
        }

        let upload_concurrency = match lookup("ESTATEID_UPLOAD_CONCURRENCY") {
            Some(v) => parse_concurrency(&v)?,
            None => DEFAULT_UPLOAD_CONCURRENCY,
        };

        Ok(Self {
            api_endpoint: endpoint.parse()?,
            identity,
            upload_concurrency,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_owned()),
        })
    }
}

fn parse_concurrency(value: &str) -> Result<usize, CoreError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(CoreError::Config(format!(
            "ESTATEID_UPLOAD_CONCURRENCY must be a positive integer, got {value:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_should_describe_identity_pools() {
        let identity = IdentityPoolConfig::builder()
            .user_pool_id("ap-northeast-1_abc".to_owned())
            .identity_pool_id("ap-northeast-1:1234".to_owned())
            .build();
        assert!(identity.is_configured());
        assert_eq!(
            identity.to_string(),
            "region=ap-northeast-1 user_pool=ap-northeast-1_abc client=<unset> \
             identity_pool=ap-northeast-1:1234"
        );

        let unset = IdentityPoolConfig::default();
        assert!(!unset.is_configured());
        assert!(unset.to_string().ends_with("identity_pool=<unset>"));
    }

    #[test]
    fn test_should_assume_https_for_bare_host() {
        let endpoint: ApiEndpoint = "abc.lambda-url.ap-northeast-1.on.aws".parse().unwrap();
        assert_eq!(endpoint.scheme(), "https");
        assert_eq!(endpoint.host(), "abc.lambda-url.ap-northeast-1.on.aws");
        assert_eq!(
            endpoint.url("/upload_url"),
            "https://abc.lambda-url.ap-northeast-1.on.aws/upload_url"
        );
    }

    #[test]
    fn test_should_keep_explicit_http_scheme_and_port() {
        let endpoint: ApiEndpoint = "http://127.0.0.1:8080/".parse().unwrap();
        assert_eq!(endpoint.scheme(), "http");
        assert_eq!(endpoint.host(), "127.0.0.1:8080");
        assert_eq!(endpoint.to_string(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_should_reject_endpoint_with_path_or_unknown_scheme() {
        assert!("https://api.example.com/v1".parse::<ApiEndpoint>().is_err());
        assert!("ftp://api.example.com".parse::<ApiEndpoint>().is_err());
        assert!("".parse::<ApiEndpoint>().is_err());
    }

    #[test]
    fn test_should_load_config_with_defaults() {
        let config =
            ClientConfig::from_lookup(lookup_from(&[("ESTATEID_API_ENDPOINT", "api.example.com")]))
                .unwrap();
        assert_eq!(config.api_endpoint.host(), "api.example.com");
        assert_eq!(config.identity.region, "ap-northeast-1");
        assert!(config.identity.user_pool_id.is_empty());
        assert_eq!(config.upload_concurrency, 4);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_should_load_identity_settings_from_lookup() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("ESTATEID_API_ENDPOINT", "api.example.com"),
            ("ESTATEID_COGNITO_REGION", "us-west-2"),
            ("ESTATEID_COGNITO_USER_POOL_ID", "us-west-2_abc"),
            ("ESTATEID_COGNITO_CLIENT_ID", "client"),
            ("ESTATEID_COGNITO_IDENTITY_POOL_ID", "us-west-2:pool"),
            ("ESTATEID_UPLOAD_CONCURRENCY", "2"),
        ]))
        .unwrap();
        assert_eq!(config.identity.region, "us-west-2");
        assert_eq!(config.identity.user_pool_id, "us-west-2_abc");
        assert_eq!(config.identity.client_id, "client");
        assert_eq!(config.identity.identity_pool_id, "us-west-2:pool");
        assert_eq!(config.upload_concurrency, 2);
    }

    #[test]
    fn test_should_require_api_endpoint() {
        let result = ClientConfig::from_lookup(lookup_from(&[]));
        assert!(matches!(result, Err(CoreError::Config(_))));
    }

    #[test]
    fn test_should_reject_zero_concurrency() {
        let result = ClientConfig::from_lookup(lookup_from(&[
            ("ESTATEID_API_ENDPOINT", "api.example.com"),
            ("ESTATEID_UPLOAD_CONCURRENCY", "0"),
        ]));
        assert!(matches!(result, Err(CoreError::Config(_))));
    }
}
