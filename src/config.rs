use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    /// Without one the service runs on the in-memory store.
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub run_migrations: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(5);
        let run_migrations = match env::var("RUN_MIGRATIONS") {
            Ok(v) => parse_flag(&v)?,
            Err(_) => true,
        };

        Ok(Self {
            database_url,
            bind_addr,
            db_max_connections,
            run_migrations,
        })
    }
}

fn parse_flag(v: &str) -> anyhow::Result<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("RUN_MIGRATIONS must be a boolean, got {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_flag;

    #[test]
    fn flags_accept_common_spellings() {
        assert!(parse_flag("TRUE").unwrap());
        assert!(!parse_flag(" off ").unwrap());
        assert!(parse_flag("maybe").is_err());
    }
}
