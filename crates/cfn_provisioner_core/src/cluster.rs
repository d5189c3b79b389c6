use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterInstance {
    pub ec2_instance_id: Option<String>,
    pub private_ip_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MasterNode {
    pub private_ip_address: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterSelection {
    pub node: MasterNode,
    pub running_masters: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("no running master instance found for cluster {cluster_id}")]
    NoRunningMaster { cluster_id: String },
    #[error("master instance of cluster {cluster_id} is missing {field}")]
    MissingField {
        cluster_id: String,
        field: &'static str,
    },
}

/// Picks the first reported running master. Multi-master clusters report
/// several; callers get the count so they can flag it.
pub fn select_master_node(
    cluster_id: &str,
    instances: &[ClusterInstance],
) -> Result<MasterSelection, SelectionError> {
    let Some(first) = instances.first() else {
        return Err(SelectionError::NoRunningMaster {
            cluster_id: cluster_id.to_string(),
        });
    };

    let private_ip_address =
        first
            .private_ip_address
            .clone()
            .ok_or_else(|| SelectionError::MissingField {
                cluster_id: cluster_id.to_string(),
                field: "a private IP address",
            })?;
    let instance_id = first
        .ec2_instance_id
        .clone()
        .ok_or_else(|| SelectionError::MissingField {
            cluster_id: cluster_id.to_string(),
            field: "an EC2 instance id",
        })?;

    Ok(MasterSelection {
        node: MasterNode {
            private_ip_address,
            instance_id,
        },
        running_masters: instances.len(),
    })
}
