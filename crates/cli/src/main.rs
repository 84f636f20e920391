use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use stacklab_core::names;
use stacklab_core::{AssetMetadata, Config, StackKey, StackParams, StackRef, StackRepository, Visibility};
use stacklab_kubehub::Cluster;
use stacklab_ops::{ClusterSecretStore, MountRequest, Registry, StackManager};
use stacklab_persist::SqliteStore;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "stacklabctl", version, about = "Stacklab stack lifecycle CLI")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Acting user recorded on stack records
    #[arg(long = "user", global = true, env = "STACKLAB_USER", default_value = "stacklab")]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output {
    Human,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Visible {
    Private,
    Project,
    Public,
}

impl From<Visible> for Visibility {
    fn from(v: Visible) -> Self {
        match v {
            Visible::Private => Visibility::Private,
            Visible::Project => Visibility::Project,
            Visible::Public => Visibility::Public,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List enabled stack types
    Types,
    /// Print the resource names a stack would use
    Names {
        project: String,
        stack_type: String,
        name: String,
    },
    /// Create a stack and its resources
    Create {
        project: String,
        stack_type: String,
        name: String,
        #[arg(long = "display-name")]
        display_name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Shared data volume mounted at /data
        #[arg(long = "volume")]
        volume_mount: Option<String>,
        /// Content path served by publishing stacks
        #[arg(long = "source-path")]
        source_path: Option<String>,
        /// Asset ids to mount once the deployment exists
        #[arg(long = "asset")]
        assets: Vec<String>,
        #[arg(long, value_enum, default_value_t = Visible::Private)]
        visible: Visible,
    },
    /// Delete a stack's resources and its record
    Delete {
        project: String,
        stack_type: String,
        name: String,
    },
    /// Rolling restart of a stack deployment
    Restart {
        project: String,
        stack_type: String,
        name: String,
    },
    /// Set the assets mounted on a stack
    Mount {
        project: String,
        stack_type: String,
        name: String,
        /// Asset ids; none clears every asset mount
        assets: Vec<String>,
        /// Show the patch without submitting it
        #[arg(long = "dry-run", action = ArgAction::SetTrue)]
        dry_run: bool,
    },
    /// List stacks recorded for a project
    Ls {
        project: String,
    },
    /// Manage asset metadata
    Asset {
        #[command(subcommand)]
        command: AssetCommands,
    },
}

#[derive(Subcommand, Debug)]
enum AssetCommands {
    /// Register an asset and its catalogue location
    Add {
        asset_id: String,
        file_location: String,
    },
}

fn init_tracing() {
    let env = std::env::var("STACKLAB_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("STACKLAB_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid STACKLAB_METRICS_ADDR; expected host:port");
        }
    }
}

async fn manager(config: Config, store: Arc<SqliteStore>) -> Result<StackManager> {
    let cluster = Cluster::connect().await?;
    let registry = Registry::from_config(&config);
    let secrets = Arc::new(ClusterSecretStore::new(cluster.secrets.clone(), config.secret_namespace.clone()));
    Ok(StackManager::new(cluster, registry, config, secrets, store.clone(), store))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Types => {
            let registry = Registry::from_config(&config);
            let types = registry.types();
            match cli.output {
                Output::Human => {
                    for t in types {
                        println!("{:<12} {}", t.as_str(), t.category());
                    }
                }
                Output::Json => {
                    let keys: Vec<_> = types.iter().map(|t| t.as_str()).collect();
                    print_json(&keys)?;
                }
            }
        }
        Commands::Names { project, stack_type, name } => {
            let key: StackKey = StackRef::new(project, name, stack_type).resolve()?;
            let deployment = key.deployment_name();
            let rows = [
                ("namespace", key.namespace()),
                ("deployment", deployment.clone()),
                ("service", names::service_name(&key.name, key.stack_type)),
                ("ingress", names::ingress_name(&key.name, key.stack_type)),
                ("credentials", names::stack_credential_secret(&key.name, key.stack_type)),
                ("home-claim", names::pvc_name(&deployment)),
                ("secret-path", names::secret_path(&config.datalab.name, &deployment)),
                ("host", names::stack_host(&key.project_key, &key.name, &config.datalab.domain)),
            ];
            match cli.output {
                Output::Human => {
                    for (k, v) in rows {
                        println!("{:<12} {}", k, v);
                    }
                }
                Output::Json => {
                    let map: serde_json::Map<String, serde_json::Value> =
                        rows.into_iter().map(|(k, v)| (k.to_string(), serde_json::Value::String(v))).collect();
                    print_json(&map)?;
                }
            }
        }
        Commands::Create { project, stack_type, name, display_name, description, volume_mount, source_path, assets, visible } => {
            let store = Arc::new(SqliteStore::open_default()?);
            let mgr = manager(config, store).await?;
            let params = StackParams {
                project_key: project,
                name,
                stack_type,
                display_name,
                description,
                volume_mount,
                source_path,
                asset_ids: assets,
                visible: visible.into(),
            };
            info!(project = %params.project_key, name = %params.name, stack_type = %params.stack_type, "create invoked");
            let created = mgr.create_stack(&cli.user, &params).await?;
            match cli.output {
                Output::Human => {
                    let steps: Vec<_> = created.completed.iter().map(|s| s.to_string()).collect();
                    println!("created {} ({})", created.stack.key(), steps.join(", "));
                    if let Some(url) = &created.stack.url {
                        println!("url: {}", url);
                    }
                    if let Some(m) = &created.mount {
                        println!("assets: {}", m.volumes.join(", "));
                    }
                }
                Output::Json => print_json(&created)?,
            }
        }
        Commands::Delete { project, stack_type, name } => {
            let store = Arc::new(SqliteStore::open_default()?);
            let mgr = manager(config, store).await?;
            let stack = StackRef::new(project, name, stack_type);
            let steps = mgr.delete_stack(&cli.user, &stack).await?;
            match cli.output {
                Output::Human => {
                    let steps: Vec<_> = steps.iter().map(|s| s.to_string()).collect();
                    println!("deleted {}/{} ({})", stack.project_key, stack.name, steps.join(", "));
                }
                Output::Json => print_json(&steps)?,
            }
        }
        Commands::Restart { project, stack_type, name } => {
            let store = Arc::new(SqliteStore::open_default()?);
            let mgr = manager(config, store).await?;
            let d = mgr.restart_stack(&StackRef::new(project, name, stack_type)).await?;
            let dname = d.metadata.name.clone().unwrap_or_default();
            match cli.output {
                Output::Human => println!("restarted {}", dname),
                Output::Json => print_json(&serde_json::json!({ "deployment": dname, "resourceVersion": d.metadata.resource_version }))?,
            }
        }
        Commands::Mount { project, stack_type, name, assets, dry_run } => {
            let store = Arc::new(SqliteStore::open_default()?);
            let mgr = manager(config, store).await?;
            let req = MountRequest { stack: StackRef::new(project, name, stack_type), asset_ids: assets };
            if dry_run {
                let preview = mgr.plan_asset_mount(&req).await?;
                match cli.output {
                    Output::Human => {
                        println!("deployment: {}", preview.deployment);
                        println!("before: {}", preview.volumes_before.join(", "));
                        println!("after:  {}", preview.volumes_after.join(", "));
                        println!(
                            "+{} ~{} -{}",
                            preview.summary.adds, preview.summary.updates, preview.summary.removes
                        );
                        if !preview.unresolved.is_empty() {
                            println!("unresolved: {}", preview.unresolved.join(", "));
                        }
                    }
                    Output::Json => print_json(&preview)?,
                }
            } else {
                let outcome = mgr.mount_assets_on_stack(&req).await?;
                match cli.output {
                    Output::Human => {
                        println!("mounted on {}/{}: {}", outcome.namespace, outcome.deployment, outcome.volumes.join(", "));
                        if !outcome.unresolved.is_empty() {
                            println!("unresolved: {}", outcome.unresolved.join(", "));
                        }
                    }
                    Output::Json => print_json(&outcome)?,
                }
            }
        }
        Commands::Ls { project } => {
            let store = SqliteStore::open_default()?;
            let stacks = store.list(&project).await?;
            match cli.output {
                Output::Human => {
                    println!("{:<12} {:<20} {:<12} URL", "TYPE", "NAME", "STATUS");
                    for s in &stacks {
                        let status = serde_json::to_value(&s.status)?;
                        println!(
                            "{:<12} {:<20} {:<12} {}",
                            s.stack_type.as_str(),
                            s.name,
                            status.as_str().unwrap_or("-"),
                            s.url.as_deref().unwrap_or("-")
                        );
                    }
                }
                Output::Json => print_json(&stacks)?,
            }
        }
        Commands::Asset { command: AssetCommands::Add { asset_id, file_location } } => {
            let store = SqliteStore::open_default()?;
            let asset = AssetMetadata { asset_id, file_location };
            store.put_asset(&asset)?;
            match cli.output {
                Output::Human => println!("asset {} -> {}", asset.asset_id, asset.file_location),
                Output::Json => print_json(&asset)?,
            }
        }
    }
    Ok(())
}
