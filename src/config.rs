//! Environment configuration
//!
//! Read once at startup. Provider credentials are optional at boot so the
//! service can come up without them; the first call that needs a missing
//! credential fails with `ProviderConfigMissing`.

#[derive(Clone, Debug)]
pub struct Config {
    pub printful_token: Option<String>,
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub public_base_url: String,
    pub port: u16,
    pub printful_api_base: String,
    pub stripe_api_base: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            printful_token: env_opt("PRINTFUL_TOKEN"),
            stripe_secret_key: env_opt("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: env_opt("STRIPE_WEBHOOK_SECRET"),
            public_base_url: env_or("PUBLIC_BASE_URL", "http://localhost:8083"),
            port: std::env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8083),
            printful_api_base: env_or("PRINTFUL_API_BASE", crate::printful::DEFAULT_API_BASE),
            stripe_api_base: env_or("STRIPE_API_BASE", crate::stripe::DEFAULT_API_BASE),
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}
