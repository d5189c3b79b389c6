use serde_json::json;

use crate::adapters::catalog::CatalogSettingsStore;
use crate::adapters::http::DocumentFetcher;
use crate::adapters::identity::{CallerIdentity, SamlProviderRegistry};
use crate::adapters::object_store::ObjectStore;
use crate::runtime::archive::extract_files;
use crate::runtime::contract::{
    CfnRequest, IdpResourceProperties, ResponseData, SAML_PROVIDER_ARN_KEY,
};
use crate::runtime::storage_keys::{
    sample_data_object_key, saml_provider_arn, DEFAULT_SAMPLE_ARCHIVE_URL,
    DEFAULT_SAMPLE_DATA_PREFIX, IDP_METADATA_OBJECT_KEY, MAX_DELETE_BATCH,
};
use crate::telemetry::log_info;

use super::catalog_permissions::restrict_catalog_defaults;
use super::custom_resource::{CustomResource, ResourceError};

const COMPONENT: &str = "idp_provisioner";

pub const SAMPLE_DATA_ARCHIVE_URL_ENV: &str = "SAMPLE_DATA_ARCHIVE_URL";
pub const SAMPLE_DATA_PREFIX_ENV: &str = "SAMPLE_DATA_PREFIX";
pub const ADJUST_CATALOG_PERMISSIONS_ENV: &str = "ADJUST_CATALOG_PERMISSIONS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpProvisionerConfig {
    pub sample_archive_url: String,
    pub data_prefix: String,
    pub metadata_key: String,
    pub adjust_catalog_permissions: bool,
}

impl Default for IdpProvisionerConfig {
    fn default() -> Self {
        Self {
            sample_archive_url: DEFAULT_SAMPLE_ARCHIVE_URL.to_string(),
            data_prefix: DEFAULT_SAMPLE_DATA_PREFIX.to_string(),
            metadata_key: IDP_METADATA_OBJECT_KEY.to_string(),
            adjust_catalog_permissions: true,
        }
    }
}

impl IdpProvisionerConfig {
    /// Builds the config from environment-style lookups, falling back to the
    /// defaults for unset or blank values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            sample_archive_url: non_blank(SAMPLE_DATA_ARCHIVE_URL_ENV)
                .unwrap_or(defaults.sample_archive_url),
            data_prefix: non_blank(SAMPLE_DATA_PREFIX_ENV).unwrap_or(defaults.data_prefix),
            metadata_key: defaults.metadata_key,
            adjust_catalog_permissions: non_blank(ADJUST_CATALOG_PERMISSIONS_ENV)
                .map(|value| {
                    !matches!(
                        value.trim().to_ascii_lowercase().as_str(),
                        "false" | "0" | "no"
                    )
                })
                .unwrap_or(defaults.adjust_catalog_permissions),
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

/// Creates the Okta SAML provider and seeds the data bucket on Create; empties
/// the bucket and removes the provider on Delete. Update does nothing.
pub struct IdpProvisioner<'a> {
    pub config: IdpProvisionerConfig,
    pub fetcher: &'a dyn DocumentFetcher,
    pub object_store: &'a dyn ObjectStore,
    pub saml_registry: &'a dyn SamlProviderRegistry,
    pub caller_identity: &'a dyn CallerIdentity,
    pub catalog_store: &'a dyn CatalogSettingsStore,
}

impl IdpProvisioner<'_> {
    fn create_saml_idp(&self, properties: &IdpResourceProperties) -> Result<String, ResourceError> {
        log_info(
            COMPONENT,
            "fetching_saml_metadata",
            json!({ "url": properties.okta_app_metadata_url.clone() }),
        );
        let metadata = self
            .fetcher
            .fetch(&properties.okta_app_metadata_url)
            .map_err(|error| ResourceError::new("fetch_saml_metadata", error))?;

        log_info(
            COMPONENT,
            "writing_saml_metadata",
            json!({
                "bucket": properties.data_bucket_name.clone(),
                "key": self.config.metadata_key.clone(),
                "bytes": metadata.len(),
            }),
        );
        self.object_store
            .put_object(&properties.data_bucket_name, &self.config.metadata_key, &metadata)
            .map_err(|error| ResourceError::new("store_saml_metadata", error))?;

        let document = std::str::from_utf8(&metadata).map_err(|error| {
            ResourceError::new(
                "create_saml_provider",
                format!("metadata document is not valid UTF-8: {error}"),
            )
        })?;

        log_info(
            COMPONENT,
            "creating_saml_provider",
            json!({ "name": properties.saml_provider_name.clone() }),
        );
        let provider_arn = self
            .saml_registry
            .create_saml_provider(&properties.saml_provider_name, document)
            .map_err(|error| ResourceError::new("create_saml_provider", error))?;

        log_info(
            COMPONENT,
            "saml_provider_created",
            json!({ "provider_arn": provider_arn.clone() }),
        );
        Ok(provider_arn)
    }

    fn upload_sample_data(&self, bucket: &str) -> Result<usize, ResourceError> {
        let archive = self
            .fetcher
            .fetch(&self.config.sample_archive_url)
            .map_err(|error| ResourceError::new("fetch_sample_data", error))?;

        log_info(
            COMPONENT,
            "unzipping_archive",
            json!({
                "url": self.config.sample_archive_url.clone(),
                "bytes": archive.len(),
            }),
        );
        let entries = extract_files(&archive)
            .map_err(|error| ResourceError::new("unzip_sample_data", error.to_string()))?;

        for entry in &entries {
            let key = sample_data_object_key(&self.config.data_prefix, &entry.path);
            log_info(
                COMPONENT,
                "uploading_file",
                json!({ "key": key.clone(), "bytes": entry.body.len() }),
            );
            self.object_store
                .put_object(bucket, &key, &entry.body)
                .map_err(|error| ResourceError::new("upload_sample_data", error))?;
        }

        log_info(
            COMPONENT,
            "file_upload_complete",
            json!({ "files": entries.len() }),
        );
        Ok(entries.len())
    }

    fn purge_bucket(&self, bucket: &str) -> Result<usize, ResourceError> {
        log_info(COMPONENT, "purging_bucket", json!({ "bucket": bucket }));

        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;
        loop {
            let page = self
                .object_store
                .list_objects(bucket, continuation_token.as_deref())
                .map_err(|error| ResourceError::new("list_bucket_objects", error))?;
            keys.extend(page.keys);
            match page.next_continuation_token {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }

        for batch in keys.chunks(MAX_DELETE_BATCH) {
            self.object_store
                .delete_objects(bucket, batch)
                .map_err(|error| ResourceError::new("delete_bucket_objects", error))?;
        }

        log_info(
            COMPONENT,
            "bucket_purged",
            json!({ "bucket": bucket, "objects_deleted": keys.len() }),
        );
        Ok(keys.len())
    }

    fn account_id(&self) -> Result<String, ResourceError> {
        self.caller_identity
            .account_id()
            .map_err(|error| ResourceError::new("resolve_account_id", error))
    }
}

impl CustomResource for IdpProvisioner<'_> {
    fn name(&self) -> &'static str {
        COMPONENT
    }

    fn create(&self, request: &CfnRequest) -> Result<ResponseData, ResourceError> {
        let properties: IdpResourceProperties = request
            .properties()
            .map_err(|error| ResourceError::new("parse_properties", error.to_string()))?;

        let provider_arn = self.create_saml_idp(&properties)?;
        let mut data = ResponseData::new();
        data.insert(SAML_PROVIDER_ARN_KEY.to_string(), provider_arn);

        self.upload_sample_data(&properties.data_bucket_name)?;

        if self.config.adjust_catalog_permissions {
            let account_id = self.account_id()?;
            restrict_catalog_defaults(self.catalog_store, &account_id)?;
        }

        Ok(data)
    }

    fn update(&self, _request: &CfnRequest) -> Result<ResponseData, ResourceError> {
        Ok(ResponseData::new())
    }

    fn delete(&self, request: &CfnRequest) -> Result<ResponseData, ResourceError> {
        log_info(COMPONENT, "delete_initiated", json!({}));
        let properties: IdpResourceProperties = request
            .properties()
            .map_err(|error| ResourceError::new("parse_properties", error.to_string()))?;

        self.purge_bucket(&properties.data_bucket_name)?;

        let provider_arn = saml_provider_arn(&self.account_id()?, &properties.saml_provider_name);
        log_info(
            COMPONENT,
            "removing_saml_provider",
            json!({ "provider_arn": provider_arn.clone() }),
        );
        self.saml_registry
            .delete_saml_provider(&provider_arn)
            .map_err(|error| ResourceError::new("delete_saml_provider", error))?;

        log_info(COMPONENT, "deletion_complete", json!({}));
        Ok(ResponseData::new())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};
    use std::io::{Cursor, Write};
    use std::sync::Mutex;

    use serde_json::Value;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    use crate::adapters::object_store::ObjectPage;
    use crate::runtime::catalog::CatalogDefaults;
    use crate::runtime::contract::parse_request;

    use super::*;

    const METADATA_URL: &str = "https://example.okta.com/app/exk1/sso/saml/metadata";
    const METADATA_XML: &str = "<md:EntityDescriptor entityID=\"http://www.okta.com/exk1\"/>";

    /// Records every adapter call so tests can assert on side effects and on
    /// the absence of them.
    struct FakeAws {
        documents: HashMap<String, Vec<u8>>,
        objects: Mutex<BTreeMap<String, Vec<u8>>>,
        providers: Mutex<Vec<String>>,
        catalog: Mutex<CatalogDefaults>,
        calls: Mutex<Vec<String>>,
        delete_batches: Mutex<Vec<usize>>,
        page_size: usize,
    }

    impl FakeAws {
        fn new() -> Self {
            Self {
                documents: HashMap::from([
                    (METADATA_URL.to_string(), METADATA_XML.as_bytes().to_vec()),
                    (DEFAULT_SAMPLE_ARCHIVE_URL.to_string(), sample_archive()),
                ]),
                objects: Mutex::new(BTreeMap::new()),
                providers: Mutex::new(Vec::new()),
                catalog: Mutex::new(CatalogDefaults::default()),
                calls: Mutex::new(Vec::new()),
                delete_batches: Mutex::new(Vec::new()),
                page_size: 2,
            }
        }

        fn record(&self, call: &str) {
            self.calls
                .lock()
                .expect("poisoned mutex")
                .push(call.to_string());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("poisoned mutex").clone()
        }

        fn objects(&self) -> BTreeMap<String, Vec<u8>> {
            self.objects.lock().expect("poisoned mutex").clone()
        }

        fn object_key(bucket: &str, key: &str) -> String {
            format!("{bucket}/{key}")
        }
    }

    impl DocumentFetcher for FakeAws {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, String> {
            self.record("fetch");
            self.documents
                .get(url)
                .cloned()
                .ok_or_else(|| format!("failed to fetch {url}: 404 Not Found"))
        }
    }

    impl ObjectStore for FakeAws {
        fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), String> {
            self.record("put_object");
            self.objects
                .lock()
                .expect("poisoned mutex")
                .insert(Self::object_key(bucket, key), body.to_vec());
            Ok(())
        }

        fn list_objects(
            &self,
            bucket: &str,
            continuation_token: Option<&str>,
        ) -> Result<ObjectPage, String> {
            self.record("list_objects");
            let prefix = format!("{bucket}/");
            let keys: Vec<String> = self
                .objects
                .lock()
                .expect("poisoned mutex")
                .keys()
                .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
                .collect();

            let start = continuation_token
                .map(|token| token.parse::<usize>().expect("token is an offset"))
                .unwrap_or(0);
            let end = (start + self.page_size).min(keys.len());
            Ok(ObjectPage {
                keys: keys[start..end].to_vec(),
                next_continuation_token: (end < keys.len()).then(|| end.to_string()),
            })
        }

        fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), String> {
            self.record("delete_objects");
            self.delete_batches
                .lock()
                .expect("poisoned mutex")
                .push(keys.len());
            let mut objects = self.objects.lock().expect("poisoned mutex");
            for key in keys {
                objects.remove(&Self::object_key(bucket, key));
            }
            Ok(())
        }
    }

    impl SamlProviderRegistry for FakeAws {
        fn create_saml_provider(
            &self,
            name: &str,
            metadata_document: &str,
        ) -> Result<String, String> {
            self.record("create_saml_provider");
            assert_eq!(metadata_document, METADATA_XML);
            let arn = saml_provider_arn("123456789012", name);
            self.providers
                .lock()
                .expect("poisoned mutex")
                .push(arn.clone());
            Ok(arn)
        }

        fn delete_saml_provider(&self, provider_arn: &str) -> Result<(), String> {
            self.record("delete_saml_provider");
            let mut providers = self.providers.lock().expect("poisoned mutex");
            let before = providers.len();
            providers.retain(|arn| arn != provider_arn);
            if providers.len() == before {
                return Err(format!("NoSuchEntity: {provider_arn}"));
            }
            Ok(())
        }
    }

    impl CallerIdentity for FakeAws {
        fn account_id(&self) -> Result<String, String> {
            self.record("account_id");
            Ok("123456789012".to_string())
        }
    }

    impl CatalogSettingsStore for FakeAws {
        fn read_defaults(&self) -> Result<CatalogDefaults, String> {
            self.record("read_defaults");
            Ok(self.catalog.lock().expect("poisoned mutex").clone())
        }

        fn write_defaults(&self, defaults: &CatalogDefaults) -> Result<(), String> {
            self.record("write_defaults");
            *self.catalog.lock().expect("poisoned mutex") = defaults.clone();
            Ok(())
        }
    }

    fn sample_archive() -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .add_directory("cars/", FileOptions::default())
            .expect("directory entry should be written");
        for (name, body) in [
            ("cars/cars_2019.csv", "make,model\nvolvo,xc60\n"),
            ("cars/cars_2020.csv", "make,model\nsaab,900\n"),
            ("cars/schema.json", "{\"columns\":[\"make\",\"model\"]}"),
        ] {
            writer
                .start_file(name, FileOptions::default())
                .expect("file entry should start");
            writer
                .write_all(body.as_bytes())
                .expect("file entry should be written");
        }
        writer
            .finish()
            .expect("archive should finish")
            .into_inner()
    }

    fn provisioner(aws: &FakeAws) -> IdpProvisioner<'_> {
        IdpProvisioner {
            config: IdpProvisionerConfig::default(),
            fetcher: aws,
            object_store: aws,
            saml_registry: aws,
            caller_identity: aws,
            catalog_store: aws,
        }
    }

    fn sample_request(request_type: &str) -> CfnRequest {
        parse_request(serde_json::json!({
            "RequestType": request_type,
            "ResponseURL": "https://cfn-response.example/signed",
            "StackId": "arn:aws:cloudformation:us-east-1:123456789012:stack/emr-okta/guid",
            "RequestId": "req-1",
            "LogicalResourceId": "OktaSamlProvider",
            "ResourceProperties": {
                "DataBucketName": "emr-okta-data",
                "SAMLProviderName": "OktaEMR",
                "OktaAppMetadataURL": METADATA_URL
            }
        }))
        .expect("request should parse")
    }

    #[test]
    fn create_returns_provider_arn_and_stores_metadata() {
        let aws = FakeAws::new();
        let data = provisioner(&aws)
            .create(&sample_request("Create"))
            .expect("create should succeed");

        assert_eq!(
            data[SAML_PROVIDER_ARN_KEY],
            "arn:aws:iam::123456789012:saml-provider/OktaEMR"
        );
        assert_eq!(
            aws.objects()["emr-okta-data/IdP-metadata/okta-metadata.xml"],
            METADATA_XML.as_bytes()
        );
    }

    #[test]
    fn create_reuploads_every_archive_file_under_data_prefix() {
        let aws = FakeAws::new();
        provisioner(&aws)
            .create(&sample_request("Create"))
            .expect("create should succeed");

        let objects = aws.objects();
        assert_eq!(
            objects["emr-okta-data/Data/cars/cars_2019.csv"],
            b"make,model\nvolvo,xc60\n"
        );
        assert_eq!(
            objects["emr-okta-data/Data/cars/cars_2020.csv"],
            b"make,model\nsaab,900\n"
        );
        assert_eq!(
            objects["emr-okta-data/Data/cars/schema.json"],
            b"{\"columns\":[\"make\",\"model\"]}"
        );
        assert!(!objects.contains_key("emr-okta-data/Data/cars/"));
        assert_eq!(objects.len(), 4);
    }

    #[test]
    fn create_restricts_catalog_defaults_to_invoking_account() {
        let aws = FakeAws::new();
        provisioner(&aws)
            .create(&sample_request("Create"))
            .expect("create should succeed");

        let catalog = aws.catalog.lock().expect("poisoned mutex").clone();
        assert!(catalog.allow_external_data_filtering);
        assert_eq!(catalog.external_data_filtering_allow_list, vec!["123456789012"]);
    }

    #[test]
    fn create_skips_catalog_when_disabled() {
        let aws = FakeAws::new();
        let mut provisioner = provisioner(&aws);
        provisioner.config.adjust_catalog_permissions = false;

        provisioner
            .create(&sample_request("Create"))
            .expect("create should succeed");

        let calls = aws.calls();
        assert!(!calls.iter().any(|call| call.ends_with("_defaults")));
        assert!(!calls.contains(&"account_id".to_string()));
    }

    #[test]
    fn create_fails_before_registration_when_metadata_unreachable() {
        let aws = FakeAws::new();
        let mut request = sample_request("Create");
        request.resource_properties["OktaAppMetadataURL"] =
            Value::from("https://example.okta.com/missing");

        let error = provisioner(&aws)
            .create(&request)
            .expect_err("unreachable metadata should fail");

        assert_eq!(error.step, "fetch_saml_metadata");
        assert!(error.message.contains("404 Not Found"));
        assert_eq!(aws.calls(), vec!["fetch".to_string()]);
    }

    #[test]
    fn update_makes_no_adapter_calls() {
        let aws = FakeAws::new();
        let data = provisioner(&aws)
            .update(&sample_request("Update"))
            .expect("update should succeed");

        assert!(data.is_empty());
        assert!(aws.calls().is_empty());
    }

    #[test]
    fn delete_empties_bucket_and_removes_provider() {
        let aws = FakeAws::new();
        let provisioner = provisioner(&aws);
        provisioner
            .create(&sample_request("Create"))
            .expect("create should succeed");
        aws.put_object("other-bucket", "keep.txt", b"keep")
            .expect("seed should succeed");

        provisioner
            .delete(&sample_request("Delete"))
            .expect("delete should succeed");

        let objects = aws.objects();
        assert!(!objects.keys().any(|key| key.starts_with("emr-okta-data/")));
        assert!(objects.contains_key("other-bucket/keep.txt"));
        assert!(aws.providers.lock().expect("poisoned mutex").is_empty());
        assert!(aws.calls().iter().filter(|call| *call == "list_objects").count() >= 2);
    }

    #[test]
    fn purge_deletes_in_batches_of_at_most_one_thousand_keys() {
        let mut aws = FakeAws::new();
        aws.page_size = 1_000;
        for index in 0..2_501 {
            aws.put_object("emr-okta-data", &format!("Data/part-{index:05}.csv"), b"row")
                .expect("seed should succeed");
        }

        let deleted = provisioner(&aws)
            .purge_bucket("emr-okta-data")
            .expect("purge should succeed");

        assert_eq!(deleted, 2_501);
        assert_eq!(
            *aws.delete_batches.lock().expect("poisoned mutex"),
            vec![MAX_DELETE_BATCH, MAX_DELETE_BATCH, 501]
        );
        assert_eq!(
            aws.calls().iter().filter(|call| *call == "list_objects").count(),
            3
        );
        assert!(aws.objects().is_empty());
    }

    #[test]
    fn delete_reports_missing_provider() {
        let aws = FakeAws::new();

        let error = provisioner(&aws)
            .delete(&sample_request("Delete"))
            .expect_err("deleting an unknown provider should fail");

        assert_eq!(error.step, "delete_saml_provider");
        assert!(error
            .message
            .contains("arn:aws:iam::123456789012:saml-provider/OktaEMR"));
    }

    #[test]
    fn config_reads_overrides_and_disable_flag() {
        let env = HashMap::from([
            (SAMPLE_DATA_ARCHIVE_URL_ENV, "https://mirror.example/cars.zip"),
            (SAMPLE_DATA_PREFIX_ENV, "samples/"),
            (ADJUST_CATALOG_PERMISSIONS_ENV, "False"),
        ]);

        let config = IdpProvisionerConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.sample_archive_url, "https://mirror.example/cars.zip");
        assert_eq!(config.data_prefix, "samples/");
        assert_eq!(config.metadata_key, IDP_METADATA_OBJECT_KEY);
        assert!(!config.adjust_catalog_permissions);
    }

    #[test]
    fn config_catalog_flag_values() {
        for (value, expected) in [
            ("false", false),
            ("FALSE", false),
            ("0", false),
            ("no", false),
            (" No ", false),
            ("true", true),
            ("1", true),
            ("yes", true),
            ("", true),
        ] {
            let config = IdpProvisionerConfig::from_lookup(|key| {
                (key == ADJUST_CATALOG_PERMISSIONS_ENV).then(|| value.to_string())
            });
            assert_eq!(
                config.adjust_catalog_permissions, expected,
                "ADJUST_CATALOG_PERMISSIONS={value:?}"
            );
        }
    }

    #[test]
    fn config_defaults_when_unset_or_blank() {
        let config = IdpProvisionerConfig::from_lookup(|key| {
            (key == SAMPLE_DATA_PREFIX_ENV).then(|| "  ".to_string())
        });

        assert_eq!(config, IdpProvisionerConfig::default());
    }
}
