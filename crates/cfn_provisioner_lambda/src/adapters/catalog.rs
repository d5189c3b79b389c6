use crate::runtime::catalog::CatalogDefaults;

pub trait CatalogSettingsStore {
    fn read_defaults(&self) -> Result<CatalogDefaults, String>;

    /// Overwrites the default-permission fields; last writer wins.
    fn write_defaults(&self, defaults: &CatalogDefaults) -> Result<(), String>;
}
