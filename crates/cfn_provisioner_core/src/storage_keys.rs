pub const IDP_METADATA_OBJECT_KEY: &str = "IdP-metadata/okta-metadata.xml";
pub const DEFAULT_SAMPLE_DATA_PREFIX: &str = "Data";
pub const DEFAULT_SAMPLE_ARCHIVE_URL: &str = "https://emr-okta-blog.s3.amazonaws.com/data/cars.zip";

/// Maximum number of keys accepted by a single S3 `DeleteObjects` call.
pub const MAX_DELETE_BATCH: usize = 1_000;

pub fn sample_data_object_key(prefix: &str, relative_path: &str) -> String {
    let trimmed_prefix = prefix.trim_matches('/');
    let trimmed_path = relative_path.trim_start_matches('/');
    if trimmed_prefix.is_empty() {
        trimmed_path.to_string()
    } else {
        format!("{trimmed_prefix}/{trimmed_path}")
    }
}

pub fn saml_provider_arn(account_id: &str, provider_name: &str) -> String {
    format!("arn:aws:iam::{account_id}:saml-provider/{provider_name}")
}
