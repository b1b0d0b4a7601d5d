use tracing::Level;

/// Runtime settings, read from the environment (and `.env`) at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub frontend_url: String,
    pub database_path: String,
    pub sessions_db_path: String,
    pub demo_user: DemoUser,
}

/// The single account the demo login accepts.
#[derive(Debug, Clone)]
pub struct DemoUser {
    pub id: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl Default for DemoUser {
    fn default() -> Self {
        DemoUser {
            id: "test-user-1".to_string(),
            email: "test@gmail.com".to_string(),
            password: "12345".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    dotenv::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = DemoUser::default();
        Config {
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:4000"),
            frontend_url: var_or("FRONTEND_URL", "http://localhost:3000"),
            database_path: var_or("DATABASE_PATH", "db.sqlite"),
            sessions_db_path: var_or("SESSIONS_DB_PATH", "sessions.db"),
            demo_user: DemoUser {
                email: var_or("DEMO_USER_EMAIL", &defaults.email),
                password: var_or("DEMO_USER_PASSWORD", &defaults.password),
                ..defaults
            },
        }
    }
}

/// Log level named by the first command line argument; anything unknown means INFO.
pub fn log_level_from_args(args: &[String]) -> Level {
    match args.get(1).map(String::as_str) {
        Some("debug") => Level::DEBUG,
        Some("warn") => Level::WARN,
        Some("error") => Level::ERROR,
        _ => Level::INFO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn log_level_comes_from_first_argument() {
        assert_eq!(log_level_from_args(&args(&["bin"])), Level::INFO);
        assert_eq!(log_level_from_args(&args(&["bin", "debug"])), Level::DEBUG);
        assert_eq!(log_level_from_args(&args(&["bin", "warn", "x"])), Level::WARN);
        assert_eq!(log_level_from_args(&args(&["bin", "error"])), Level::ERROR);
        assert_eq!(log_level_from_args(&args(&["bin", "trace"])), Level::INFO);
    }

    #[test]
    fn demo_user_defaults_match_the_seeded_login() {
        let user = DemoUser::default();
        assert_eq!(user.id, "test-user-1");
        assert_eq!(user.email, "test@gmail.com");
    }
}
