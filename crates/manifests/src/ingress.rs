use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule, IngressServiceBackend, IngressSpec,
    ServiceBackendPort,
};

use crate::common::meta;
use crate::{GeneratorError, IngressInput};

fn service_port(service: &Service, service_name: &str, index: usize) -> Result<i32, GeneratorError> {
    service
        .spec
        .as_ref()
        .and_then(|s| s.ports.as_ref())
        .and_then(|ports| ports.get(index))
        .map(|p| p.port)
        .ok_or_else(|| GeneratorError::MissingPort { service: service_name.to_string(), index })
}

fn path(prefix: &str, service_name: &str, port: i32) -> HTTPIngressPath {
    HTTPIngressPath {
        path: Some(prefix.to_string()),
        path_type: "Prefix".to_string(),
        backend: IngressBackend {
            service: Some(IngressServiceBackend {
                name: service_name.to_string(),
                port: Some(ServiceBackendPort { number: Some(port), name: None }),
            }),
            resource: None,
        },
    }
}

fn build(input: &IngressInput<'_>, with_connect: bool) -> Result<Ingress, GeneratorError> {
    let service_name = input
        .service
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| GeneratorError::MissingServiceName { ingress: input.ingress_name.to_string() })?;
    let mut paths = vec![path("/", service_name, service_port(input.service, service_name, 0)?)];
    if with_connect {
        paths.push(path("/connect", service_name, service_port(input.service, service_name, 1)?));
    }
    Ok(Ingress {
        metadata: meta(input.ingress_name, input.labels.clone()),
        spec: Some(IngressSpec {
            rules: Some(vec![IngressRule {
                host: Some(input.host.to_string()),
                http: Some(HTTPIngressRuleValue { paths }),
            }]),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Route the stack host to the created service's first port.
pub fn ingress(input: &IngressInput<'_>) -> Result<Ingress, GeneratorError> {
    build(input, false)
}

/// Like [`ingress`], plus `/connect` routed to the service's second port.
pub fn ingress_with_connect(input: &IngressInput<'_>) -> Result<Ingress, GeneratorError> {
    build(input, true)
}
