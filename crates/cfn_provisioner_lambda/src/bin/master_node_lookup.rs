use aws_sdk_emr::types::{Instance, InstanceGroupType, InstanceState};
use cfn_provisioner_lambda::adapters::block_on;
use cfn_provisioner_lambda::adapters::cluster::ClusterInstanceSource;
use cfn_provisioner_lambda::adapters::http::HttpClient;
use cfn_provisioner_lambda::handlers::custom_resource::{reject_malformed_event, run_lifecycle};
use cfn_provisioner_lambda::handlers::master_node::MasterNodeLookup;
use cfn_provisioner_lambda::runtime::cluster::ClusterInstance;
use cfn_provisioner_lambda::runtime::contract::{parse_request, CfnResponse};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;

struct EmrClusterInstances {
    client: aws_sdk_emr::Client,
}

impl ClusterInstanceSource for EmrClusterInstances {
    fn running_master_instances(&self, cluster_id: &str) -> Result<Vec<ClusterInstance>, String> {
        let request = self
            .client
            .list_instances()
            .cluster_id(cluster_id)
            .instance_group_types(InstanceGroupType::Master)
            .instance_states(InstanceState::Running);

        let output = block_on(request.send()).map_err(|error| {
            format!(
                "failed to list master instances of cluster {cluster_id}: {}",
                aws_sdk_emr::error::DisplayErrorContext(&error)
            )
        })?;
        Ok(output.instances().iter().map(cluster_instance).collect())
    }
}

fn cluster_instance(instance: &Instance) -> ClusterInstance {
    ClusterInstance {
        ec2_instance_id: instance.ec2_instance_id().map(str::to_string),
        private_ip_address: instance.private_ip_address().map(str::to_string),
    }
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
    let cluster = EmrClusterInstances {
        client: aws_sdk_emr::Client::new(&aws_config),
    };

    run_lifecycle(
        &request,
        &log_stream,
        &MasterNodeLookup {
            instances: &cluster,
        },
        &http,
    )
    .map_err(Error::from)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::run(service_fn(handle_request)).await
}
