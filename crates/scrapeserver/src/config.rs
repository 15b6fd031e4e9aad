use scrapenodes::NodesConfig;

/// Server settings read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub database_url: String,
    pub nodes: NodesConfig,
}

impl ServerConfig {
    /// `BIND_ADDRESS` and `DATABASE_URL`, plus the executor settings of
    /// [`NodesConfig::from_env`].
    pub fn from_env() -> Self {
        Self {
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://scrape.db".to_string()),
            nodes: NodesConfig::from_env(),
        }
    }
}
