use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

/// Public URL prefix stored media is served under.
pub const MEDIA_ROUTE: &str = "/media";

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub media_dir: PathBuf,
    pub addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("THREADDIT_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("THREADDIT_JWT_SECRET is unset or still a placeholder; it must match the auth service's secret");
        }

        let host = lookup("THREADDIT_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("THREADDIT_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("THREADDIT_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        Ok(Self {
            jwt_secret,
            db_path: lookup("THREADDIT_DB_PATH")
                .unwrap_or_else(|| "threaddit.db".into())
                .into(),
            media_dir: lookup("THREADDIT_MEDIA_DIR")
                .unwrap_or_else(|| "./media".into())
                .into(),
            addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_the_secret_is_set() {
        let cfg = config(&[("THREADDIT_JWT_SECRET", "a-real-secret")]).unwrap();
        assert_eq!(cfg.addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(cfg.db_path, PathBuf::from("threaddit.db"));
        assert_eq!(cfg.media_dir, PathBuf::from("./media"));
    }

    #[test]
    fn placeholder_secrets_are_refused() {
        assert!(config(&[]).is_err());
        assert!(config(&[("THREADDIT_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn bad_ports_are_reported() {
        let err = config(&[("THREADDIT_JWT_SECRET", "s"), ("THREADDIT_PORT", "http")]).unwrap_err();
        assert!(err.to_string().contains("THREADDIT_PORT"));
    }
}
