use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub ai: AiConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiry_minutes: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub upload_dir: String,
    pub public_base_url: String,
    pub max_file_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub free_limit: i64,
    pub premium_monthly_limit: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")?;

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()?;
        let max_connections: u32 = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()?;
        let token_expiry_minutes: i64 = env::var("TOKEN_EXPIRY_MINUTES")
            .unwrap_or_else(|_| "30".to_string())
            .parse()?;
        let upload_dir = env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());
        let public_base_url =
            env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
        // 10 MiB per photo unless overridden
        let max_file_size: usize = env::var("MAX_FILE_SIZE")
            .unwrap_or_else(|_| (10 * 1024 * 1024).to_string())
            .parse()?;
        let openai_api_key = env::var("OPENAI_API_KEY").unwrap_or_default();
        let openai_api_base = env::var("OPENAI_API_BASE")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let openai_model = env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let free_limit: i64 = env::var("FREE_TOURNAMENT_LIMIT")
            .unwrap_or_else(|_| "5".to_string())
            .parse()?;
        let premium_monthly_limit: i64 = env::var("PREMIUM_MONTHLY_TOURNAMENT_LIMIT")
            .unwrap_or_else(|_| "50".to_string())
            .parse()?;

        Ok(Config {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            auth: AuthConfig {
                jwt_secret,
                token_expiry_minutes,
            },
            storage: StorageConfig {
                upload_dir,
                public_base_url,
                max_file_size,
            },
            ai: AiConfig {
                api_key: openai_api_key,
                api_base: openai_api_base,
                model: openai_model,
            },
            rate_limit: RateLimitConfig {
                free_limit,
                premium_monthly_limit,
            },
        })
    }
}
