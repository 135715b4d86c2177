use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Replicate API token
    pub replicate_api_token: String,

    /// Externally reachable base URL of this API, used to build the
    /// webhook callback address handed to Replicate
    pub webhook_base_url: String,

    /// Optional shared secret required on webhook callbacks (?token=...)
    pub webhook_secret: Option<String>,

    /// Storage bucket name holding uploaded originals
    pub storage_bucket: String,

    /// S3-compatible storage endpoint URL
    pub storage_endpoint: String,

    /// Storage access key ID
    pub storage_access_key: String,

    /// Storage secret access key
    pub storage_secret_key: String,

    /// Public URL prefix under which uploaded originals are served
    pub public_base_url: String,

    /// HS256 secret for bearer token validation
    pub jwt_secret: String,

    /// Expiry of signed image URLs handed to Replicate, in seconds
    #[serde(default = "default_signed_url_expiry_secs")]
    pub signed_url_expiry_secs: u32,

    /// Stand-in restored image returned by test-mode submissions
    #[serde(default = "default_test_restored_image_url")]
    pub test_restored_image_url: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_signed_url_expiry_secs() -> u32 {
    3600
}

fn default_test_restored_image_url() -> String {
    "https://images.unsplash.com/photo-1506905925346-21bda4d32df4?w=800&h=600&fit=crop".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Webhook callback address handed to Replicate, carrying the shared
    /// secret as a query token when one is configured.
    pub fn webhook_url(&self) -> String {
        let base = format!(
            "{}/api/v1/webhooks/replicate",
            self.webhook_base_url.trim_end_matches('/')
        );
        match &self.webhook_secret {
            Some(secret) => format!("{}?token={}", base, secret),
            None => base,
        }
    }
}
