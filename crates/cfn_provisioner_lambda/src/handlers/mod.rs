pub mod catalog_permissions;
pub mod custom_resource;
pub mod idp_provisioner;
pub mod master_node;
