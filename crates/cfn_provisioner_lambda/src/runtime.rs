pub use cfn_provisioner_core::{archive, catalog, cluster, contract, storage_keys};
