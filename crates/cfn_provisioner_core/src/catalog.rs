use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DefaultPermission {
    pub principal: String,
    pub permissions: Vec<String>,
}

/// The slice of the account-wide data-catalog settings that the provisioner
/// rewrites. Everything else in the settings document is left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogDefaults {
    pub create_database_default_permissions: Vec<DefaultPermission>,
    pub create_table_default_permissions: Vec<DefaultPermission>,
    pub allow_external_data_filtering: bool,
    pub external_data_filtering_allow_list: Vec<String>,
}

impl CatalogDefaults {
    /// Drops the default grants for new databases and tables and lets exactly
    /// `account_id` filter data for external engines.
    pub fn restrict_to_account(mut self, account_id: &str) -> Self {
        self.create_database_default_permissions.clear();
        self.create_table_default_permissions.clear();
        self.allow_external_data_filtering = true;
        self.external_data_filtering_allow_list = vec![account_id.to_string()];
        self
    }
}
