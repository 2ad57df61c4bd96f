//! Process settings read from the environment. Call `dotenvy::dotenv()` beforehand to honour a
//! local `.env` file.

use std::path::PathBuf;

pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Settings {
    /// Model declarations (JSON). From `REST_CONFIG_PATH`.
    pub config_path: PathBuf,
    /// PostgreSQL connection string. Without it an in-memory store is used.
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub body_limit: usize,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            config_path: get("REST_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("demos/config/school.json")),
            database_url: get("DATABASE_URL").filter(|s| !s.is_empty()),
            bind_addr: get("REST_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into()),
            body_limit: get("REST_BODY_LIMIT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_BODY_LIMIT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_apply_when_unset() {
        let s = Settings::from_lookup(|_| None);
        assert_eq!(s.bind_addr, "0.0.0.0:3000");
        assert_eq!(s.body_limit, DEFAULT_BODY_LIMIT);
        assert!(s.database_url.is_none());
    }

    #[test]
    fn invalid_body_limit_falls_back() {
        let env: HashMap<&str, &str> = [("REST_BODY_LIMIT", "lots"), ("DATABASE_URL", "")].into_iter().collect();
        let s = Settings::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(s.body_limit, DEFAULT_BODY_LIMIT);
        assert!(s.database_url.is_none());
    }
}
