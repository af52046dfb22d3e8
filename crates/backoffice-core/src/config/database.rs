/// Database configuration for the migration user.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    /// Database name.
    pub name: String,
    pub user: String,
    pub password: String,

    /// Connection pool size.
    pub max_pool_size: u32,

    /// Idle connections are closed after this many seconds.
    pub idle_timeout_secs: u64,

    /// Connections are recycled after this many seconds.
    pub max_lifetime_secs: u64,

    /// Pool checkout / connect timeout in seconds.
    pub connect_timeout_secs: u64,

    pub tls_enabled: bool,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"***")
            .field("max_pool_size", &self.max_pool_size)
            .field("idle_timeout_secs", &self.idle_timeout_secs)
            .field("max_lifetime_secs", &self.max_lifetime_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("tls_enabled", &self.tls_enabled)
            .finish()
    }
}
