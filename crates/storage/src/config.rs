/// Default bucket for uploaded design files.
pub const DEFAULT_BUCKET: &str = "hdlbridge-uploads";

/// S3 storage settings.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    /// Custom endpoint for S3-compatible services (MinIO, R2). `None` uses AWS.
    pub endpoint: Option<String>,
    /// Base URL that public object URLs are built from.
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            endpoint: None,
            public_base_url: format!("https://{DEFAULT_BUCKET}.s3.amazonaws.com"),
        }
    }
}

impl StorageConfig {
    /// Load storage configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                                  |
    /// |---------------------------|------------------------------------------|
    /// | `STORAGE_BUCKET`          | `hdlbridge-uploads`                      |
    /// | `STORAGE_ENDPOINT`        | unset (AWS)                              |
    /// | `STORAGE_PUBLIC_BASE_URL` | `{endpoint}/{bucket}` or the AWS URL     |
    ///
    /// Credentials and region come from the standard AWS environment.
    pub fn from_env() -> Self {
        let bucket = std::env::var("STORAGE_BUCKET").unwrap_or_else(|_| DEFAULT_BUCKET.into());
        let endpoint = std::env::var("STORAGE_ENDPOINT")
            .ok()
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty());

        let public_base_url = std::env::var("STORAGE_PUBLIC_BASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| default_public_base(&bucket, endpoint.as_deref()));

        Self {
            bucket,
            endpoint,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

fn default_public_base(bucket: &str, endpoint: Option<&str>) -> String {
    match endpoint {
        Some(endpoint) => format!("{endpoint}/{bucket}"),
        None => format!("https://{bucket}.s3.amazonaws.com"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_endpoint_uses_path_style_base() {
        assert_eq!(
            default_public_base("designs", Some("http://localhost:9000")),
            "http://localhost:9000/designs"
        );
    }

    #[test]
    fn aws_uses_virtual_host_base() {
        assert_eq!(
            default_public_base("designs", None),
            "https://designs.s3.amazonaws.com"
        );
    }
}
