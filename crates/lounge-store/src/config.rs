//! Where and how the SurrealDB backend connects.

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Local on-disk store used when nothing else is configured.
pub const DEFAULT_STORE_URL: &str = "surrealkv://.lounge/db";

/// Which SurrealDB user the credentials belong to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthLevel {
    Root,
    #[default]
    Database,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub level: AuthLevel,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("level", &self.level)
            .finish()
    }
}

/// Connection settings for [`crate::SurrealDocumentStore::open`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `mem://`, `surrealkv://<dir>`, `ws://host` or `wss://host`
    pub url: String,
    pub namespace: String,
    pub database: String,
    /// Sign in before selecting the namespace; anonymous when `None`
    pub credentials: Option<Credentials>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_STORE_URL)
    }
}

impl StoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            namespace: "lounge".to_string(),
            database: "main".to_string(),
            credentials: None,
        }
    }

    pub fn in_memory() -> Self {
        Self::new("mem://")
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        level: AuthLevel,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
            level,
        });
        self
    }

    /// Directory to create before opening a local `surrealkv://` store.
    pub fn local_path(&self) -> Option<&str> {
        self.url
            .strip_prefix("surrealkv://")
            .filter(|path| !path.is_empty())
    }

    /// Read settings from the environment.
    ///
    /// - LOUNGE_STORE_URL, else SURREALDB_URL (default: `surrealkv://.lounge/db`)
    /// - LOUNGE_STORE_NAMESPACE (default: "lounge")
    /// - LOUNGE_STORE_DATABASE (default: "main")
    /// - LOUNGE_STORE_USERNAME and LOUNGE_STORE_PASSWORD, both or neither
    /// - LOUNGE_STORE_AUTH: "root" or "database" (default: "database")
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StoreResult<Self> {
        let url = lookup("LOUNGE_STORE_URL")
            .or_else(|| lookup("SURREALDB_URL"))
            .unwrap_or_else(|| DEFAULT_STORE_URL.to_string());
        let mut config = Self::new(url);

        if let Some(namespace) = lookup("LOUNGE_STORE_NAMESPACE") {
            config.namespace = namespace;
        }
        if let Some(database) = lookup("LOUNGE_STORE_DATABASE") {
            config.database = database;
        }

        let level = match lookup("LOUNGE_STORE_AUTH").as_deref() {
            None => AuthLevel::default(),
            Some(level) if level.eq_ignore_ascii_case("root") => AuthLevel::Root,
            Some(level) if level.eq_ignore_ascii_case("database") => AuthLevel::Database,
            Some(other) => {
                return Err(StoreError::Config(format!(
                    "LOUNGE_STORE_AUTH must be root or database, got {other:?}"
                )))
            }
        };

        match (lookup("LOUNGE_STORE_USERNAME"), lookup("LOUNGE_STORE_PASSWORD")) {
            (Some(username), Some(password)) => {
                config = config.with_credentials(username, password, level);
            }
            (None, None) => {}
            (Some(_), None) => {
                return Err(StoreError::Config(
                    "LOUNGE_STORE_USERNAME is set without LOUNGE_STORE_PASSWORD".to_string(),
                ))
            }
            (None, Some(_)) => {
                return Err(StoreError::Config(
                    "LOUNGE_STORE_PASSWORD is set without LOUNGE_STORE_USERNAME".to_string(),
                ))
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_to_local_store() {
        let config = StoreConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.local_path(), Some(".lounge/db"));
        assert!(config.credentials.is_none());
    }

    #[test]
    fn lounge_url_wins_over_surreal_url() {
        let config = StoreConfig::from_lookup(lookup(&[
            ("SURREALDB_URL", "ws://fallback:8000"),
            ("LOUNGE_STORE_URL", "mem://"),
        ]))
        .unwrap();
        assert_eq!(config.url, "mem://");
        assert_eq!(config.local_path(), None);

        let config =
            StoreConfig::from_lookup(lookup(&[("SURREALDB_URL", "ws://fallback:8000")])).unwrap();
        assert_eq!(config.url, "ws://fallback:8000");
    }

    #[test]
    fn credentials_need_both_halves() {
        let err = StoreConfig::from_lookup(lookup(&[("LOUNGE_STORE_USERNAME", "app")]))
            .unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));

        let config = StoreConfig::from_lookup(lookup(&[
            ("LOUNGE_STORE_URL", "wss://db.example"),
            ("LOUNGE_STORE_USERNAME", "root"),
            ("LOUNGE_STORE_PASSWORD", "secret"),
            ("LOUNGE_STORE_AUTH", "ROOT"),
            ("LOUNGE_STORE_NAMESPACE", "tenant"),
        ]))
        .unwrap();
        let credentials = config.credentials.clone().unwrap();
        assert_eq!(credentials.level, AuthLevel::Root);
        assert_eq!(config.namespace, "tenant");
        assert_eq!(config.database, "main");
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn unknown_auth_level_is_rejected() {
        let err = StoreConfig::from_lookup(lookup(&[("LOUNGE_STORE_AUTH", "guest")])).unwrap_err();
        assert!(err.to_string().contains("guest"));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: StoreConfig = serde_json::from_value(serde_json::json!({
            "url": "ws://localhost:8000",
            "credentials": {"username": "app", "password": "pw"}
        }))
        .unwrap();

        assert_eq!(config.namespace, "lounge");
        assert_eq!(config.credentials.unwrap().level, AuthLevel::Database);
    }
}
