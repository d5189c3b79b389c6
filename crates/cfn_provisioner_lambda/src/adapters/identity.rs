pub trait SamlProviderRegistry {
    /// Registers the provider and returns its ARN.
    fn create_saml_provider(&self, name: &str, metadata_document: &str)
        -> Result<String, String>;

    fn delete_saml_provider(&self, provider_arn: &str) -> Result<(), String>;
}

pub trait CallerIdentity {
    fn account_id(&self) -> Result<String, String>;
}
