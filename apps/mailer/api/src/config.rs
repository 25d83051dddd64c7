use core_config::{
    ConfigError, FromEnv, database::DatabaseConfig, env_or_default, env_parse,
    server::ServerConfig,
};
use domain_mailer::FailurePolicy;

pub use core_config::Environment;

/// Dispatch run settings
#[derive(Clone, Debug)]
pub struct DispatchConfig {
    /// `DISPATCH_FAILURE_POLICY`: `continue` (default) or `abort`
    pub failure_policy: FailurePolicy,
}

impl FromEnv for DispatchConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            failure_policy: env_parse("DISPATCH_FAILURE_POLICY", "continue")?,
        })
    }
}

/// Application configuration
/// Composes shared config components from `core_config`
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub dispatch: DispatchConfig,
    /// Apply pending migrations before serving (`MIGRATE_ON_START`)
    pub migrate_on_start: bool,
    /// Comma-separated `CORS_ALLOWED_ORIGIN`; empty disables CORS
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let server = ServerConfig::from_env()?; // HOST=0.0.0.0, PORT=8080
        let database = DatabaseConfig::from_env()?; // Required - fails if DATABASE_URL is unset
        let dispatch = DispatchConfig::from_env()?;
        let migrate_on_start = env_parse("MIGRATE_ON_START", "false")?;
        let cors_origins = env_or_default("CORS_ALLOWED_ORIGIN", "")
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect();

        Ok(Self {
            environment,
            server,
            database,
            dispatch,
            migrate_on_start,
            cors_origins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_policy_defaults_to_continue() {
        temp_env::with_var_unset("DISPATCH_FAILURE_POLICY", || {
            let config = DispatchConfig::from_env().unwrap();
            assert_eq!(config.failure_policy, FailurePolicy::Continue);
        });
    }

    #[test]
    fn test_dispatch_policy_abort_case_insensitive() {
        temp_env::with_var("DISPATCH_FAILURE_POLICY", Some("ABORT"), || {
            let config = DispatchConfig::from_env().unwrap();
            assert_eq!(config.failure_policy, FailurePolicy::Abort);
        });
    }

    #[test]
    fn test_dispatch_policy_rejects_unknown_value() {
        temp_env::with_var("DISPATCH_FAILURE_POLICY", Some("retry"), || {
            let err = DispatchConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("DISPATCH_FAILURE_POLICY"));
        });
    }

    #[test]
    fn test_config_from_env() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("postgres://localhost/mailer")),
                ("PORT", Some("9090")),
                ("MIGRATE_ON_START", Some("true")),
                (
                    "CORS_ALLOWED_ORIGIN",
                    Some("http://localhost:3000, https://mail.example.com,"),
                ),
                ("DISPATCH_FAILURE_POLICY", None),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.server.port, 9090);
                assert!(config.migrate_on_start);
                assert_eq!(
                    config.cors_origins,
                    vec!["http://localhost:3000", "https://mail.example.com"]
                );
                assert_eq!(config.dispatch.failure_policy, FailurePolicy::Continue);
            },
        );
    }

    #[test]
    fn test_config_requires_database_url() {
        temp_env::with_var_unset("DATABASE_URL", || {
            let err = Config::from_env().unwrap_err();
            assert!(err.to_string().contains("DATABASE_URL"));
        });
    }
}
