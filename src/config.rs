// Run configuration: credentials, API endpoints and local storage.
//
// Nothing here is global. The binary assembles a `Settings` value once and
// the pipeline hands the relevant pieces to each component.

use crate::error::{PublishError, Result};
use reqwest::blocking::Client;
use std::fmt;
use std::path::PathBuf;

pub const ACCESS_TOKEN_VAR: &str = "VK_ACCESS_TOKEN";
pub const GROUP_ID_VAR: &str = "VK_GROUP_ID";

pub const DEFAULT_API_URL: &str = "https://api.vk.com/method";
pub const DEFAULT_API_VERSION: &str = "5.131";
pub const DEFAULT_FEED_URL: &str = "https://xkcd.com";
pub const DEFAULT_STORAGE_DIR: &str = "Files";

/// A string that must never show up in logs or debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Access token plus the community whose wall we post to.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub access_token: Secret,
    pub group_id: u64,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, group_id: u64) -> Self {
        Credentials {
            access_token: Secret::new(access_token),
            group_id,
        }
    }

    /// Read `VK_ACCESS_TOKEN` and `VK_GROUP_ID` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` but with an injectable lookup, so
    /// callers and tests don't have to mutate the real environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    PublishError::Configuration(format!(
                        "required environment variable {key} is not set"
                    ))
                })
        };

        let access_token = required(ACCESS_TOKEN_VAR)?;
        let raw_group = required(GROUP_ID_VAR)?;
        let group_id = raw_group
            .parse::<u64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| {
                PublishError::Configuration(format!(
                    "{GROUP_ID_VAR} must be a positive integer, got {raw_group:?}"
                ))
            })?;

        Ok(Credentials::new(access_token, group_id))
    }
}

/// Where the social network API lives and which version we speak.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    pub version: String,
}

impl ApiConfig {
    pub fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), method)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: DEFAULT_API_URL.into(),
            version: DEFAULT_API_VERSION.into(),
        }
    }
}

/// Which comic a run publishes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ComicSelection {
    #[default]
    Latest,
    Random,
}

#[derive(Clone, Debug)]
pub struct FeedConfig {
    pub base_url: String,
    pub selection: ComicSelection,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            base_url: DEFAULT_FEED_URL.into(),
            selection: ComicSelection::Latest,
        }
    }
}

/// Everything one run needs.
#[derive(Clone, Debug)]
pub struct Settings {
    pub credentials: Credentials,
    pub api: ApiConfig,
    pub feed: FeedConfig,
    pub storage_dir: PathBuf,
}

impl Settings {
    pub fn new(credentials: Credentials) -> Self {
        Settings {
            credentials,
            api: ApiConfig::default(),
            feed: FeedConfig::default(),
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
        }
    }

    /// Credentials through `lookup`, everything else as given.
    pub fn from_lookup<F>(
        lookup: F,
        api: ApiConfig,
        feed: FeedConfig,
        storage_dir: impl Into<PathBuf>,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Settings {
            credentials: Credentials::from_lookup(lookup)?,
            api,
            feed,
            storage_dir: storage_dir.into(),
        })
    }
}

/// Build the blocking HTTP client shared by every component of a run.
/// Timeouts are left at the transport defaults.
pub fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| PublishError::transport("building HTTP client", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn reads_both_credentials() {
        let creds =
            Credentials::from_lookup(lookup_from(&[("VK_ACCESS_TOKEN", "tok"), ("VK_GROUP_ID", "123")]))
                .unwrap();
        assert_eq!(creds.access_token.expose(), "tok");
        assert_eq!(creds.group_id, 123);
    }

    #[test]
    fn missing_token_is_configuration_error() {
        let err = Credentials::from_lookup(lookup_from(&[("VK_GROUP_ID", "123")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("VK_ACCESS_TOKEN"));
    }

    #[test]
    fn blank_group_counts_as_missing() {
        let err = Credentials::from_lookup(lookup_from(&[
            ("VK_ACCESS_TOKEN", "tok"),
            ("VK_GROUP_ID", "  "),
        ]))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("VK_GROUP_ID"));
    }

    #[test]
    fn non_numeric_group_is_rejected() {
        for bad in ["club42", "-42", "0"] {
            let err = Credentials::from_lookup(lookup_from(&[
                ("VK_ACCESS_TOKEN", "tok"),
                ("VK_GROUP_ID", bad),
            ]))
            .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration, "{bad}");
        }
    }

    #[test]
    fn debug_output_hides_token() {
        let creds = Credentials::new("super-secret", 7);
        let dbg = format!("{creds:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("group_id: 7"));
    }

    #[test]
    fn method_url_joins_without_double_slash() {
        let api = ApiConfig {
            base_url: "http://127.0.0.1:9/method/".into(),
            version: "5.131".into(),
        };
        assert_eq!(api.method_url("wall.post"), "http://127.0.0.1:9/method/wall.post");
    }
}
