/**
 * Server Configuration
 *
 * Configuration is loaded from environment variables. The database URL is
 * required: the durable store is integral to every dispatch path, so the
 * server refuses to start without it rather than limping along with
 * persistence disabled.
 */

/// Configuration assembled once at startup and carried in application state.
///
/// No hidden statics: everything the server needs from the environment is
/// read here and passed down explicitly.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// PostgreSQL connection string (`DATABASE_URL`, required)
    pub database_url: String,
    /// Secret for signing and verifying bearer tokens (`JWT_SECRET`)
    pub jwt_secret: String,
    /// TCP port to listen on (`SERVER_PORT`, default 3000)
    pub port: u16,
}

impl ServerConfig {
    /// Load configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error when `DATABASE_URL` is unset.
    pub fn from_env() -> Result<Self, std::env::VarError> {
        let database_url = std::env::var("DATABASE_URL")?;

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, using development default");
            "parley-dev-secret-change-in-production".to_string()
        });

        let port = std::env::var("SERVER_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);

        Ok(Self {
            database_url,
            jwt_secret,
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_values() {
        let config = ServerConfig {
            database_url: "postgres://localhost/parley".to_string(),
            jwt_secret: "secret".to_string(),
            port: 4000,
        };
        assert_eq!(config.port, 4000);
        assert!(config.database_url.starts_with("postgres://"));
    }
}
