use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::common::{labels, meta, selector};
use crate::profile::profile;
use crate::ServiceInput;

/// ClusterIP service in front of the stack pod; ports follow the type profile.
pub fn service(input: &ServiceInput<'_>) -> Service {
    let profile = profile(input.stack_type);
    let ports = profile
        .ports
        .iter()
        .map(|p| ServicePort {
            name: Some(p.name.to_string()),
            port: p.port,
            target_port: Some(IntOrString::Int(p.port)),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        })
        .collect();
    Service {
        metadata: meta(input.service_name, labels(input.deployment_name, input.stack_type)),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(selector(input.deployment_name)),
            ports: Some(ports),
            ..Default::default()
        }),
        ..Default::default()
    }
}
