//! OpenStack Provider
//!
//! Creates, reads, updates and deletes typed OpenStack resources:
//! - Compute: instances, volumes, keypairs, floating IPs, security groups
//! - Network: networks, subnets, routers
//! - FWaaS: firewall rules, policies and firewalls
//! - LBaaS: pools with members, health monitors and a VIP
//!
//! Every operation prints the resulting state record as JSON on stdout. A
//! create that fails after the resource exists still prints its record, then
//! exits with the error.
//! Logs go to stderr, filtered by `RUST_LOG`.

mod config;
mod context;
mod error;
mod provider;
mod resources;
mod test_utils;
mod waits;

use crate::config::ProviderConfig;
use crate::context::ProviderContext;
use crate::error::ProviderError;
use crate::provider::{Provider, ResourceDocument, StateRecord};
use clap::{Parser, Subcommand};
use openstack_client::Cloud;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "openstack-provider", version, about = "Manage OpenStack resources from declarative documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the resource a document describes
    Create {
        /// Resource document (YAML or JSON)
        #[arg(long)]
        resource: PathBuf,
    },
    /// Refresh a state record from the cloud
    Read {
        /// Prior state record (JSON)
        #[arg(long)]
        state: PathBuf,
        /// Document whose `provider` block supplies credentials
        #[arg(long)]
        resource: Option<PathBuf>,
    },
    /// Converge an existing resource on a changed document
    Update {
        #[arg(long)]
        state: PathBuf,
        #[arg(long)]
        resource: PathBuf,
    },
    /// Delete the resource behind a state record
    Delete {
        #[arg(long)]
        state: PathBuf,
        #[arg(long)]
        resource: Option<PathBuf>,
    },
}

/// A command with its inputs loaded
enum Operation {
    Create(ResourceDocument),
    Read(StateRecord),
    Update(StateRecord, ResourceDocument),
    Delete(StateRecord),
}

async fn load_document(path: &Path) -> Result<ResourceDocument, ProviderError> {
    let text = tokio::fs::read_to_string(path).await?;
    // YAML is a superset of JSON, so one parser covers both
    let doc: ResourceDocument = serde_yaml::from_str(&text)?;
    debug!("Loaded {} document from {}", doc.kind, path.display());
    Ok(doc)
}

async fn load_record(path: &Path) -> Result<StateRecord, ProviderError> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&text)?)
}

async fn load_optional(path: Option<&Path>) -> Result<Option<ResourceDocument>, ProviderError> {
    match path {
        Some(path) => Ok(Some(load_document(path).await?)),
        None => Ok(None),
    }
}

impl Operation {
    async fn load(command: &Command) -> Result<(Self, Option<ResourceDocument>), ProviderError> {
        Ok(match command {
            Command::Create { resource } => {
                let doc = load_document(resource).await?;
                (Self::Create(doc.clone()), Some(doc))
            }
            Command::Read { state, resource } => (
                Self::Read(load_record(state).await?),
                load_optional(resource.as_deref()).await?,
            ),
            Command::Update { state, resource } => {
                let doc = load_document(resource).await?;
                (Self::Update(load_record(state).await?, doc.clone()), Some(doc))
            }
            Command::Delete { state, resource } => (
                Self::Delete(load_record(state).await?),
                load_optional(resource.as_deref()).await?,
            ),
        })
    }

    async fn run(self, provider: &Provider) -> Result<StateRecord, ProviderError> {
        match self {
            Self::Create(doc) => provider.create(&doc).await,
            Self::Read(record) => provider.read(&record).await,
            Self::Update(record, doc) => provider.update(&record, &doc).await,
            Self::Delete(record) => provider.delete(&record).await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), ProviderError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let (operation, doc) = Operation::load(&cli.command).await?;

    let overrides = doc.and_then(|d| d.provider).unwrap_or_default();
    let config = ProviderConfig::from_env().with_overrides(&overrides);
    config.validate()?;

    let cloud = Cloud::connect(&config.auth_options()).await?;
    let ctx = ProviderContext::new(config, Arc::new(cloud));
    info!(
        "Authenticated against {} (default region {})",
        ctx.config().auth_url,
        ctx.region_for(None)
    );

    match operation.run(&Provider::new(ctx)).await {
        Ok(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        // The record still goes to stdout so the resource can be read or deleted later
        Err(ProviderError::Incomplete { record, source }) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Err(*source)
        }
        Err(e) => Err(e),
    }
}
