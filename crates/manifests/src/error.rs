#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("service {service} exposes no port at index {index}")]
    MissingPort { service: String, index: usize },
    #[error("ingress {ingress} needs a named service")]
    MissingServiceName { ingress: String },
    #[error("building {kind} manifest: {source}")]
    Encoding { kind: &'static str, #[source] source: serde_json::Error },
}
