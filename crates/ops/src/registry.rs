//! Stack type registry: which steps build and tear down each stack type.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use stacklab_core::{Category, Config, StackType, UnknownStackType};
use stacklab_manifests::ManifestGenerators;

use crate::credentials::CredentialKind;

/// One resource-builder step of a lifecycle pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    Credentials,
    HomeClaim,
    Deployment,
    Workers,
    Service,
    Ingress,
    IngressWithConnect,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::Credentials => "credentials",
            Step::HomeClaim => "home-claim",
            Step::Deployment => "deployment",
            Step::Workers => "workers",
            Step::Service => "service",
            Step::Ingress => "ingress",
            Step::IngressWithConnect => "ingress-with-connect",
        };
        f.write_str(s)
    }
}

const NOTEBOOK_STEPS: &[Step] = &[Step::Credentials, Step::HomeClaim, Step::Deployment, Step::Service, Step::Ingress];
const NOTEBOOK_CONNECT_STEPS: &[Step] =
    &[Step::Credentials, Step::HomeClaim, Step::Deployment, Step::Service, Step::IngressWithConnect];
const PUBLISH_STEPS: &[Step] = &[Step::Deployment, Step::Service, Step::Ingress];
const CLUSTER_STEPS: &[Step] = &[Step::Deployment, Step::Workers, Step::Service, Step::Ingress];
const CLUSTER_CONNECT_STEPS: &[Step] = &[Step::Deployment, Step::Workers, Step::Service, Step::IngressWithConnect];

/// Everything the manager needs to drive one stack type.
#[derive(Clone, Copy)]
pub struct StackHandler {
    pub stack_type: StackType,
    pub category: Category,
    pub create_steps: &'static [Step],
    pub credentials: CredentialKind,
    pub generators: ManifestGenerators,
}

impl StackHandler {
    /// Teardown order: the create steps reversed.
    pub fn delete_steps(&self) -> impl Iterator<Item = Step> + '_ {
        self.create_steps.iter().rev().copied()
    }

    pub fn has_step(&self, step: Step) -> bool {
        self.create_steps.contains(&step)
    }
}

impl fmt::Debug for StackHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackHandler")
            .field("stack_type", &self.stack_type)
            .field("category", &self.category)
            .field("create_steps", &self.create_steps)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

pub fn handler_for(stack_type: StackType) -> StackHandler {
    let (create_steps, credentials) = match stack_type {
        StackType::Jupyter | StackType::JupyterLab => (NOTEBOOK_STEPS, CredentialKind::Token),
        StackType::Zeppelin => (NOTEBOOK_CONNECT_STEPS, CredentialKind::Token),
        StackType::RStudio => (NOTEBOOK_STEPS, CredentialKind::UsernamePassword),
        StackType::RShiny | StackType::NbViewer => (PUBLISH_STEPS, CredentialKind::None),
        StackType::Spark => (CLUSTER_CONNECT_STEPS, CredentialKind::None),
        StackType::Dask => (CLUSTER_STEPS, CredentialKind::None),
    };
    StackHandler {
        stack_type,
        category: stack_type.category(),
        create_steps,
        credentials,
        generators: ManifestGenerators::for_type(stack_type),
    }
}

/// The stack types this deployment serves.
#[derive(Debug, Clone)]
pub struct Registry {
    enabled: BTreeSet<StackType>,
}

impl Registry {
    pub fn builtin() -> Self {
        Self::with_types(StackType::ALL)
    }

    pub fn with_types(types: impl IntoIterator<Item = StackType>) -> Self {
        Self { enabled: types.into_iter().collect() }
    }

    pub fn from_config(config: &Config) -> Self {
        match &config.enabled_types {
            Some(types) => Self::with_types(types.iter().copied()),
            None => Self::builtin(),
        }
    }

    /// Look up a raw type key. Unknown and disabled keys are both `UnknownStackType`.
    pub fn resolve(&self, key: &str) -> Result<StackHandler, UnknownStackType> {
        let stack_type: StackType = key.parse()?;
        self.handler(stack_type)
    }

    pub fn handler(&self, stack_type: StackType) -> Result<StackHandler, UnknownStackType> {
        if self.enabled.contains(&stack_type) {
            Ok(handler_for(stack_type))
        } else {
            Err(UnknownStackType(stack_type.to_string()))
        }
    }

    pub fn types(&self) -> Vec<StackType> {
        self.enabled.iter().copied().collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_resolves_and_ends_with_service_then_ingress() {
        let reg = Registry::builtin();
        for t in StackType::ALL {
            let h = reg.resolve(t.as_str()).unwrap();
            assert_eq!(h.stack_type, t);
            let steps = h.create_steps;
            let svc = steps.iter().position(|s| *s == Step::Service).unwrap();
            let ing = steps.iter().position(|s| matches!(s, Step::Ingress | Step::IngressWithConnect)).unwrap();
            assert!(svc < ing, "{t}: ingress must follow service");
            assert!(steps.iter().position(|s| *s == Step::Deployment).unwrap() < svc);
        }
    }

    #[test]
    fn connect_ingress_for_zeppelin_and_spark() {
        for t in StackType::ALL {
            let h = handler_for(t);
            assert_eq!(h.has_step(Step::IngressWithConnect), matches!(t, StackType::Zeppelin | StackType::Spark), "{t}");
        }
    }

    #[test]
    fn delete_mirrors_create() {
        let h = handler_for(StackType::Jupyter);
        let del: Vec<Step> = h.delete_steps().collect();
        assert_eq!(del, vec![Step::Ingress, Step::Service, Step::Deployment, Step::HomeClaim, Step::Credentials]);
    }

    #[test]
    fn unknown_and_disabled_types_are_rejected() {
        let reg = Registry::with_types([StackType::Jupyter]);
        assert_eq!(reg.resolve("fortran").unwrap_err(), UnknownStackType("fortran".into()));
        assert_eq!(reg.resolve("rstudio").unwrap_err(), UnknownStackType("rstudio".into()));
        assert!(reg.resolve("jupyter").is_ok());
        assert_eq!(reg.types(), vec![StackType::Jupyter]);
    }

    #[test]
    fn credentials_follow_stack_type() {
        assert_eq!(handler_for(StackType::Jupyter).credentials, CredentialKind::Token);
        assert_eq!(handler_for(StackType::RStudio).credentials, CredentialKind::UsernamePassword);
        assert_eq!(handler_for(StackType::RShiny).credentials, CredentialKind::None);
    }
}
