use stacklab_core::StackType;

/// Container port exposed by a stack and published through its service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSpec {
    pub name: &'static str,
    pub port: i32,
}

/// Environment variable filled from a key of the stack credential secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialEnv {
    pub env: &'static str,
    pub key: &'static str,
}

/// Fixed per-type facts the generators build from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackProfile {
    pub image: &'static str,
    /// Web port first; a second entry is the connect (or scheduler) port.
    pub ports: &'static [PortSpec],
    pub credential_env: &'static [CredentialEnv],
    pub extra_env: &'static [(&'static str, &'static str)],
    /// Where the per-stack home claim is mounted, for types that get one.
    pub home_path: Option<&'static str>,
    /// Mount point of the shared data volume.
    pub data_path: &'static str,
}

const WEB_8888: &[PortSpec] = &[PortSpec { name: "web", port: 8888 }];
const JUPYTER_TOKEN: &[CredentialEnv] = &[CredentialEnv { env: "JUPYTER_TOKEN", key: "token" }];

pub fn profile(stack_type: StackType) -> StackProfile {
    match stack_type {
        StackType::Jupyter => StackProfile {
            image: "jupyter/datascience-notebook:latest",
            ports: WEB_8888,
            credential_env: JUPYTER_TOKEN,
            extra_env: &[],
            home_path: Some("/home/jovyan"),
            data_path: "/data",
        },
        StackType::JupyterLab => StackProfile {
            image: "jupyter/datascience-notebook:latest",
            ports: WEB_8888,
            credential_env: JUPYTER_TOKEN,
            extra_env: &[("JUPYTER_ENABLE_LAB", "yes")],
            home_path: Some("/home/jovyan"),
            data_path: "/data",
        },
        StackType::Zeppelin => StackProfile {
            image: "apache/zeppelin:0.10.1",
            ports: &[PortSpec { name: "web", port: 8080 }, PortSpec { name: "connect", port: 4040 }],
            credential_env: &[CredentialEnv { env: "ZEPPELIN_TOKEN", key: "token" }],
            extra_env: &[("ZEPPELIN_NOTEBOOK_DIR", "/opt/zeppelin/notebook")],
            home_path: Some("/opt/zeppelin/notebook"),
            data_path: "/data",
        },
        StackType::RStudio => StackProfile {
            image: "rocker/rstudio:4.3",
            ports: &[PortSpec { name: "web", port: 8787 }],
            credential_env: &[
                CredentialEnv { env: "USER", key: "username" },
                CredentialEnv { env: "PASSWORD", key: "password" },
            ],
            extra_env: &[],
            home_path: Some("/home/datalab"),
            data_path: "/data",
        },
        StackType::RShiny => StackProfile {
            image: "rocker/shiny:4.3",
            ports: &[PortSpec { name: "web", port: 3838 }],
            credential_env: &[],
            extra_env: &[],
            home_path: None,
            data_path: "/srv/shiny-server",
        },
        StackType::NbViewer => StackProfile {
            image: "jupyter/nbviewer:latest",
            ports: &[PortSpec { name: "web", port: 9090 }],
            credential_env: &[],
            extra_env: &[],
            home_path: None,
            data_path: "/data",
        },
        StackType::Spark => StackProfile {
            image: "bitnami/spark:3.5",
            ports: &[PortSpec { name: "web", port: 8080 }, PortSpec { name: "connect", port: 7077 }],
            credential_env: &[],
            extra_env: &[("SPARK_MODE", "master")],
            home_path: None,
            data_path: "/data",
        },
        StackType::Dask => StackProfile {
            image: "daskdev/dask:2024.1.1",
            ports: &[PortSpec { name: "web", port: 8787 }, PortSpec { name: "scheduler", port: 8786 }],
            credential_env: &[],
            extra_env: &[],
            home_path: None,
            data_path: "/data",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_publishes_a_web_port_first() {
        for t in StackType::ALL {
            let p = profile(t);
            assert_eq!(p.ports[0].name, "web", "{t}");
        }
    }

    #[test]
    fn connect_port_only_for_zeppelin_and_spark() {
        let with_connect: Vec<StackType> =
            StackType::ALL.into_iter().filter(|t| profile(*t).ports.iter().any(|p| p.name == "connect")).collect();
        assert_eq!(with_connect, vec![StackType::Zeppelin, StackType::Spark]);
    }
}
