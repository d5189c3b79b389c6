use crate::runtime::cluster::ClusterInstance;

pub trait ClusterInstanceSource {
    fn running_master_instances(&self, cluster_id: &str) -> Result<Vec<ClusterInstance>, String>;
}
