use aws_sdk_lakeformation::types::{
    DataLakePrincipal, DataLakeSettings, Permission, PrincipalPermissions,
};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use cfn_provisioner_lambda::adapters::block_on;
use cfn_provisioner_lambda::adapters::catalog::CatalogSettingsStore;
use cfn_provisioner_lambda::adapters::http::HttpClient;
use cfn_provisioner_lambda::adapters::identity::{CallerIdentity, SamlProviderRegistry};
use cfn_provisioner_lambda::adapters::object_store::{ObjectPage, ObjectStore};
use cfn_provisioner_lambda::handlers::custom_resource::{reject_malformed_event, run_lifecycle};
use cfn_provisioner_lambda::handlers::idp_provisioner::{IdpProvisioner, IdpProvisionerConfig};
use cfn_provisioner_lambda::runtime::catalog::{CatalogDefaults, DefaultPermission};
use cfn_provisioner_lambda::runtime::contract::{parse_request, CfnResponse};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;

struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl ObjectStore for S3ObjectStore {
    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), String> {
        let request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body.to_vec()));

        block_on(request.send()).map(|_| ()).map_err(|error| {
            format!(
                "failed to write s3://{bucket}/{key}: {}",
                aws_sdk_s3::error::DisplayErrorContext(&error)
            )
        })
    }

    fn list_objects(
        &self,
        bucket: &str,
        continuation_token: Option<&str>,
    ) -> Result<ObjectPage, String> {
        let request = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .set_continuation_token(continuation_token.map(str::to_string));

        let output = block_on(request.send()).map_err(|error| {
            format!(
                "failed to list s3://{bucket}: {}",
                aws_sdk_s3::error::DisplayErrorContext(&error)
            )
        })?;

        Ok(ObjectPage {
            keys: output
                .contents()
                .iter()
                .filter_map(|object| object.key().map(str::to_string))
                .collect(),
            next_continuation_token: output.next_continuation_token().map(str::to_string),
        })
    }

    fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), String> {
        if keys.is_empty() {
            return Ok(());
        }

        let identifiers = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| format!("invalid object key in s3://{bucket}: {error}"))?;
        let delete = Delete::builder()
            .set_objects(Some(identifiers))
            .quiet(true)
            .build()
            .map_err(|error| format!("invalid delete request for s3://{bucket}: {error}"))?;

        let output = block_on(
            self.client
                .delete_objects()
                .bucket(bucket)
                .delete(delete)
                .send(),
        )
        .map_err(|error| {
            format!(
                "failed to delete objects from s3://{bucket}: {}",
                aws_sdk_s3::error::DisplayErrorContext(&error)
            )
        })?;

        if let Some(failed) = output.errors().first() {
            return Err(format!(
                "failed to delete s3://{bucket}/{}: {}",
                failed.key().unwrap_or("<unknown>"),
                failed.message().unwrap_or("unknown error")
            ));
        }
        Ok(())
    }
}

struct IamSamlProviderRegistry {
    client: aws_sdk_iam::Client,
}

impl SamlProviderRegistry for IamSamlProviderRegistry {
    fn create_saml_provider(
        &self,
        name: &str,
        metadata_document: &str,
    ) -> Result<String, String> {
        let request = self
            .client
            .create_saml_provider()
            .name(name)
            .saml_metadata_document(metadata_document);

        let output = block_on(request.send()).map_err(|error| {
            format!(
                "failed to create SAML provider {name}: {}",
                aws_sdk_iam::error::DisplayErrorContext(&error)
            )
        })?;
        output
            .saml_provider_arn()
            .map(str::to_string)
            .ok_or_else(|| format!("SAML provider {name} was created without an ARN"))
    }

    fn delete_saml_provider(&self, provider_arn: &str) -> Result<(), String> {
        let request = self
            .client
            .delete_saml_provider()
            .saml_provider_arn(provider_arn);

        block_on(request.send()).map(|_| ()).map_err(|error| {
            format!(
                "failed to delete SAML provider {provider_arn}: {}",
                aws_sdk_iam::error::DisplayErrorContext(&error)
            )
        })
    }
}

struct StsCallerIdentity {
    client: aws_sdk_sts::Client,
}

impl CallerIdentity for StsCallerIdentity {
    fn account_id(&self) -> Result<String, String> {
        let output = block_on(self.client.get_caller_identity().send()).map_err(|error| {
            format!(
                "failed to resolve caller identity: {}",
                aws_sdk_sts::error::DisplayErrorContext(&error)
            )
        })?;
        output
            .account()
            .map(str::to_string)
            .ok_or_else(|| "caller identity did not include an account id".to_string())
    }
}

struct LakeFormationSettingsStore {
    client: aws_sdk_lakeformation::Client,
}

impl LakeFormationSettingsStore {
    fn current_settings(&self) -> Result<DataLakeSettings, String> {
        let output = block_on(self.client.get_data_lake_settings().send()).map_err(|error| {
            format!(
                "failed to read data lake settings: {}",
                aws_sdk_lakeformation::error::DisplayErrorContext(&error)
            )
        })?;
        Ok(output
            .data_lake_settings()
            .cloned()
            .unwrap_or_else(|| DataLakeSettings::builder().build()))
    }
}

impl CatalogSettingsStore for LakeFormationSettingsStore {
    fn read_defaults(&self) -> Result<CatalogDefaults, String> {
        Ok(catalog_defaults_from_settings(&self.current_settings()?))
    }

    fn write_defaults(&self, defaults: &CatalogDefaults) -> Result<(), String> {
        // Re-read so admins, trusted owners and parameters are written back as-is.
        let settings = apply_catalog_defaults(self.current_settings()?, defaults);

        block_on(
            self.client
                .put_data_lake_settings()
                .data_lake_settings(settings)
                .send(),
        )
        .map(|_| ())
        .map_err(|error| {
            format!(
                "failed to write data lake settings: {}",
                aws_sdk_lakeformation::error::DisplayErrorContext(&error)
            )
        })
    }
}

fn catalog_defaults_from_settings(settings: &DataLakeSettings) -> CatalogDefaults {
    CatalogDefaults {
        create_database_default_permissions: settings
            .create_database_default_permissions()
            .iter()
            .map(default_permission)
            .collect(),
        create_table_default_permissions: settings
            .create_table_default_permissions()
            .iter()
            .map(default_permission)
            .collect(),
        allow_external_data_filtering: settings.allow_external_data_filtering().unwrap_or(false),
        external_data_filtering_allow_list: settings
            .external_data_filtering_allow_list()
            .iter()
            .filter_map(|principal| principal.data_lake_principal_identifier().map(str::to_string))
            .collect(),
    }
}

fn apply_catalog_defaults(
    mut settings: DataLakeSettings,
    defaults: &CatalogDefaults,
) -> DataLakeSettings {
    settings.create_database_default_permissions = Some(
        defaults
            .create_database_default_permissions
            .iter()
            .map(principal_permissions)
            .collect(),
    );
    settings.create_table_default_permissions = Some(
        defaults
            .create_table_default_permissions
            .iter()
            .map(principal_permissions)
            .collect(),
    );
    settings.allow_external_data_filtering = Some(defaults.allow_external_data_filtering);
    settings.external_data_filtering_allow_list = Some(
        defaults
            .external_data_filtering_allow_list
            .iter()
            .map(|identifier| data_lake_principal(identifier))
            .collect(),
    );
    settings
}

fn default_permission(grant: &PrincipalPermissions) -> DefaultPermission {
    DefaultPermission {
        principal: grant
            .principal()
            .and_then(|principal| principal.data_lake_principal_identifier())
            .unwrap_or_default()
            .to_string(),
        permissions: grant
            .permissions()
            .iter()
            .map(|permission| permission.as_str().to_string())
            .collect(),
    }
}

fn principal_permissions(grant: &DefaultPermission) -> PrincipalPermissions {
    PrincipalPermissions::builder()
        .principal(data_lake_principal(&grant.principal))
        .set_permissions(Some(
            grant
                .permissions
                .iter()
                .map(|permission| Permission::from(permission.as_str()))
                .collect(),
        ))
        .build()
}

fn data_lake_principal(identifier: &str) -> DataLakePrincipal {
    DataLakePrincipal::builder()
        .data_lake_principal_identifier(identifier)
        .build()
}

async fn handle_request(event: LambdaEvent<Value>) -> Result<CfnResponse, Error> {
    let http = HttpClient::new();
    let request = match parse_request(event.payload.clone()) {
        Ok(request) => request,
        Err(error) => {
            return reject_malformed_event(&event.payload, &error.to_string(), &http)
                .map_err(Error::from);
        }
    };
    let log_stream = event.context.env_config.log_stream.clone();

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let object_store = S3ObjectStore {
        client: aws_sdk_s3::Client::new(&aws_config),
    };
    let saml_registry = IamSamlProviderRegistry {
        client: aws_sdk_iam::Client::new(&aws_config),
    };
    let caller_identity = StsCallerIdentity {
        client: aws_sdk_sts::Client::new(&aws_config),
    };
    let catalog_store = LakeFormationSettingsStore {
        client: aws_sdk_lakeformation::Client::new(&aws_config),
    };

    let provisioner = IdpProvisioner {
        config: IdpProvisionerConfig::from_env(),
        fetcher: &http,
        object_store: &object_store,
        saml_registry: &saml_registry,
        caller_identity: &caller_identity,
        catalog_store: &catalog_store,
    };

    run_lifecycle(&request, &log_stream, &provisioner, &http).map_err(Error::from)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::run(service_fn(handle_request)).await
}
