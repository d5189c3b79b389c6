use serde_json::json;

use crate::adapters::cluster::ClusterInstanceSource;
use crate::runtime::cluster::select_master_node;
use crate::runtime::contract::{
    CfnRequest, MasterNodeResourceProperties, ResponseData, MASTER_NODE_INSTANCE_ID_KEY,
    MASTER_NODE_IP_KEY,
};
use crate::telemetry::{log_info, log_warn};

use super::custom_resource::{CustomResource, ResourceError};

const COMPONENT: &str = "master_node_lookup";

pub struct MasterNodeLookup<'a> {
    pub instances: &'a dyn ClusterInstanceSource,
}

impl MasterNodeLookup<'_> {
    fn lookup(&self, request: &CfnRequest) -> Result<ResponseData, ResourceError> {
        let properties: MasterNodeResourceProperties = request
            .properties()
            .map_err(|error| ResourceError::new("parse_properties", error.to_string()))?;

        let instances = self
            .instances
            .running_master_instances(&properties.cluster_id)
            .map_err(|error| ResourceError::new("list_master_instances", error))?;
        let selection = select_master_node(&properties.cluster_id, &instances)
            .map_err(|error| ResourceError::new("select_master_node", error.to_string()))?;

        if selection.running_masters > 1 {
            log_warn(
                COMPONENT,
                "multiple_running_masters",
                json!({
                    "cluster_id": properties.cluster_id.clone(),
                    "running_masters": selection.running_masters,
                    "selected_instance_id": selection.node.instance_id.clone(),
                }),
            );
        }

        log_info(
            COMPONENT,
            "master_node_found",
            json!({
                "cluster_id": properties.cluster_id,
                "private_ip_address": selection.node.private_ip_address.clone(),
                "instance_id": selection.node.instance_id.clone(),
            }),
        );

        Ok(ResponseData::from([
            (
                MASTER_NODE_IP_KEY.to_string(),
                selection.node.private_ip_address,
            ),
            (
                MASTER_NODE_INSTANCE_ID_KEY.to_string(),
                selection.node.instance_id,
            ),
        ]))
    }
}

impl CustomResource for MasterNodeLookup<'_> {
    fn name(&self) -> &'static str {
        COMPONENT
    }

    fn create(&self, request: &CfnRequest) -> Result<ResponseData, ResourceError> {
        self.lookup(request)
    }

    fn update(&self, request: &CfnRequest) -> Result<ResponseData, ResourceError> {
        self.lookup(request)
    }

    fn delete(&self, _request: &CfnRequest) -> Result<ResponseData, ResourceError> {
        Ok(ResponseData::new())
    }
}
