use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// JWT secrets that must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "your-secret-key",
];

#[derive(Debug, Clone, PartialEq)]
pub struct HostedConfig {
    pub url: String,
    pub service_role_key: String,
    pub bucket: String,
    pub signed_url_expiry_secs: u64,
}

/// Where records and uploaded photos live.
#[derive(Debug, Clone, PartialEq)]
pub enum Backend {
    Local { db_path: PathBuf, upload_dir: PathBuf },
    Hosted(HostedConfig),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub admin_password: String,
    pub backend: Backend,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = get("BANSOS_JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("BANSOS_JWT_SECRET is unset or still a placeholder; set it in .env and restart");
        }

        let port = or("BANSOS_PORT", "3000")
            .parse()
            .context("BANSOS_PORT must be a port number")?;

        let use_hosted = or("BANSOS_USE_SUPABASE", "false");
        let backend = if matches!(use_hosted.to_ascii_lowercase().as_str(), "1" | "true" | "yes") {
            let required = |key: &str| {
                get(key)
                    .filter(|v| !v.trim().is_empty())
                    .with_context(|| format!("{} is required when BANSOS_USE_SUPABASE is on", key))
            };
            Backend::Hosted(HostedConfig {
                url: required("SUPABASE_URL")?,
                service_role_key: required("SUPABASE_SERVICE_ROLE_KEY")?,
                bucket: or("SUPABASE_BUCKET", "bansos-uploads"),
                signed_url_expiry_secs: or("BANSOS_SIGNED_URL_EXPIRY_SECS", "3600")
                    .parse()
                    .context("BANSOS_SIGNED_URL_EXPIRY_SECS must be a number of seconds")?,
            })
        } else {
            Backend::Local {
                db_path: or("BANSOS_DB_PATH", "bansos.db").into(),
                upload_dir: or("BANSOS_UPLOAD_DIR", "./uploads").into(),
            }
        };

        Ok(Self {
            host: or("BANSOS_HOST", "0.0.0.0"),
            port,
            jwt_secret,
            admin_password: or("BANSOS_ADMIN_PASSWORD", "admin123"),
            backend,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_local_backend() {
        let config = Config::from_lookup(lookup(&[("BANSOS_JWT_SECRET", "s3cr3t")])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.admin_password, "admin123");
        assert_eq!(
            config.backend,
            Backend::Local { db_path: "bansos.db".into(), upload_dir: "./uploads".into() }
        );
    }

    #[rstest]
    #[case("")]
    #[case("dev-secret-change-me")]
    #[case("change-me-to-a-random-string")]
    fn placeholder_secrets_are_refused(#[case] secret: &str) {
        assert!(Config::from_lookup(lookup(&[("BANSOS_JWT_SECRET", secret)])).is_err());
    }

    #[test]
    fn hosted_backend_needs_credentials() {
        let err = Config::from_lookup(lookup(&[
            ("BANSOS_JWT_SECRET", "s3cr3t"),
            ("BANSOS_USE_SUPABASE", "true"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("SUPABASE_URL"));

        let config = Config::from_lookup(lookup(&[
            ("BANSOS_JWT_SECRET", "s3cr3t"),
            ("BANSOS_USE_SUPABASE", "true"),
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service"),
        ]))
        .unwrap();
        let Backend::Hosted(hosted) = config.backend else {
            panic!("expected hosted backend");
        };
        assert_eq!(hosted.bucket, "bansos-uploads");
        assert_eq!(hosted.signed_url_expiry_secs, 3600);
    }

    #[test]
    fn bad_port_is_an_error() {
        let result = Config::from_lookup(lookup(&[("BANSOS_JWT_SECRET", "s"), ("BANSOS_PORT", "http")]));
        assert!(result.is_err());
    }
}
