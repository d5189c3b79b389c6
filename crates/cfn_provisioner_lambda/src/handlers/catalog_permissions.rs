use serde_json::json;

use crate::adapters::catalog::CatalogSettingsStore;
use crate::runtime::catalog::CatalogDefaults;
use crate::telemetry::log_info;

use super::custom_resource::ResourceError;

const COMPONENT: &str = "catalog_permissions";

/// Read-modify-write of the catalog-wide defaults with no conflict detection.
pub fn restrict_catalog_defaults(
    store: &dyn CatalogSettingsStore,
    account_id: &str,
) -> Result<CatalogDefaults, ResourceError> {
    let current = store
        .read_defaults()
        .map_err(|error| ResourceError::new("read_catalog_settings", error))?;

    log_info(
        COMPONENT,
        "catalog_settings_read",
        json!({
            "database_default_grants": current.create_database_default_permissions.len(),
            "table_default_grants": current.create_table_default_permissions.len(),
            "allow_external_data_filtering": current.allow_external_data_filtering,
        }),
    );

    let restricted = current.restrict_to_account(account_id);
    store
        .write_defaults(&restricted)
        .map_err(|error| ResourceError::new("write_catalog_settings", error))?;

    log_info(
        COMPONENT,
        "catalog_settings_written",
        json!({ "external_data_filtering_allow_list": restricted.external_data_filtering_allow_list.clone() }),
    );
    Ok(restricted)
}
