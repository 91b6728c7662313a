//! Resource documents, state records and lifecycle dispatch
//!
//! This is the only place where untyped JSON meets the typed resource specs:
//! a document's `spec` is deserialized into the handler's `Spec` and the
//! handler's `State` is serialized back into the record's `attributes`.

use crate::config::ProviderOverrides;
use crate::context::{ProviderContext, Scope};
use crate::error::ProviderError;
use crate::resources::{
    firewall::FirewallHandler, firewall_policy::FirewallPolicyHandler, firewall_rule::FirewallRuleHandler,
    floating_ip::FloatingIpHandler, instance::InstanceHandler, keypair::KeypairHandler, lbaas::LbaasHandler,
    network::NetworkHandler, router::RouterHandler, secgroup::SecGroupHandler, subnet::SubnetHandler,
    volume::VolumeHandler,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// Resource types this provider manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "openstack_instance")]
    Instance,
    #[serde(rename = "openstack_volume")]
    Volume,
    #[serde(rename = "openstack_keypair")]
    Keypair,
    #[serde(rename = "openstack_floating_ip")]
    FloatingIp,
    #[serde(rename = "openstack_secgroup")]
    SecGroup,
    #[serde(rename = "openstack_network")]
    Network,
    #[serde(rename = "openstack_subnet")]
    Subnet,
    #[serde(rename = "openstack_router")]
    Router,
    #[serde(rename = "openstack_firewall_rule")]
    FirewallRule,
    #[serde(rename = "openstack_firewall_policy")]
    FirewallPolicy,
    #[serde(rename = "openstack_firewall")]
    Firewall,
    #[serde(rename = "openstack_lbaas")]
    Lbaas,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 12] = [
        Self::Instance,
        Self::Volume,
        Self::Keypair,
        Self::FloatingIp,
        Self::SecGroup,
        Self::Network,
        Self::Subnet,
        Self::Router,
        Self::FirewallRule,
        Self::FirewallPolicy,
        Self::Firewall,
        Self::Lbaas,
    ];

    /// Type name as written in documents
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Instance => "openstack_instance",
            Self::Volume => "openstack_volume",
            Self::Keypair => "openstack_keypair",
            Self::FloatingIp => "openstack_floating_ip",
            Self::SecGroup => "openstack_secgroup",
            Self::Network => "openstack_network",
            Self::Subnet => "openstack_subnet",
            Self::Router => "openstack_router",
            Self::FirewallRule => "openstack_firewall_rule",
            Self::FirewallPolicy => "openstack_firewall_policy",
            Self::Firewall => "openstack_firewall",
            Self::Lbaas => "openstack_lbaas",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl FromStr for ResourceKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.type_name() == s)
            .ok_or_else(|| ProviderError::InvalidResource(format!("unknown resource type {s:?}")))
    }
}

/// Desired resource as written by the user
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceDocument {
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub provider: Option<ProviderOverrides>,
    #[serde(default = "empty_object")]
    pub spec: Value,
}

impl fmt::Debug for ResourceDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDocument")
            .field("kind", &self.kind)
            .field("region", &self.region)
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Observed resource, the output of every lifecycle operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    /// `None` once the resource is gone
    pub id: Option<String>,
    pub region: String,
    pub spec: Value,
    #[serde(default)]
    pub attributes: Value,
}

impl StateRecord {
    /// Record for a resource that no longer exists
    fn gone(kind: ResourceKind, region: String, spec: Value) -> Self {
        Self {
            kind,
            id: None,
            region,
            spec,
            attributes: Value::Null,
        }
    }
}

/// Create, read, update and delete for one resource type
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Desired configuration, deserialized from the document `spec`
    type Spec: DeserializeOwned + Send + Sync + fmt::Debug;
    /// Observed attributes, stored in the record
    type State: Serialize + DeserializeOwned + Send + Sync + fmt::Debug;

    /// Reject specs the cloud would refuse, before any API call
    fn validate(&self, _spec: &Self::Spec) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Create the resource and wait until it is usable; returns its id.
    async fn create(&self, scope: &Scope, spec: &Self::Spec) -> Result<(String, Self::State), ProviderError>;

    /// Refresh the observed state; `None` when the resource is gone.
    async fn read(&self, scope: &Scope, id: &str, spec: &Self::Spec, prior: &Self::State) -> Result<Option<Self::State>, ProviderError>;

    /// Move the resource from `old` to `new` in place.
    async fn update(&self, scope: &Scope, id: &str, old: &Self::Spec, new: &Self::Spec, prior: &Self::State) -> Result<Self::State, ProviderError>;

    /// Delete the resource and wait until it is gone.
    async fn delete(&self, scope: &Scope, id: &str, spec: &Self::Spec, prior: &Self::State) -> Result<(), ProviderError>;
}

fn parse_spec<H: ResourceHandler>(handler: &H, kind: ResourceKind, spec: &Value) -> Result<H::Spec, ProviderError> {
    let spec: H::Spec = serde_json::from_value(spec.clone())
        .map_err(|e| ProviderError::InvalidResource(format!("{kind}: {e}")))?;
    handler.validate(&spec)?;
    Ok(spec)
}

fn parse_state<H: ResourceHandler>(kind: ResourceKind, attributes: &Value) -> Result<H::State, ProviderError> {
    serde_json::from_value(attributes.clone())
        .map_err(|e| ProviderError::InvalidResource(format!("{kind} attributes: {e}")))
}

fn record_id(record: &StateRecord) -> Result<&str, ProviderError> {
    record
        .id
        .as_deref()
        .ok_or_else(|| ProviderError::InvalidResource(format!("{} record has no id", record.kind)))
}

async fn create_with<H: ResourceHandler>(handler: &H, ctx: &ProviderContext, doc: &ResourceDocument) -> Result<StateRecord, ProviderError> {
    let spec = parse_spec(handler, doc.kind, &doc.spec)?;
    let scope = ctx.scope(doc.region.as_deref()).await?;
    info!("Creating {} in {}", doc.kind, scope.region);

    let (id, state) = match handler.create(&scope, &spec).await {
        Ok(created) => created,
        Err(ProviderError::Partial { id, attributes, source }) => {
            warn!("{} {} was created but not completed: {}", doc.kind, id, source);
            let record = StateRecord {
                kind: doc.kind,
                id: Some(id),
                region: scope.region,
                spec: doc.spec.clone(),
                attributes,
            };
            return Err(ProviderError::Incomplete {
                record: Box::new(record),
                source,
            });
        }
        Err(e) => return Err(e),
    };
    info!("Created {} {}", doc.kind, id);

    Ok(StateRecord {
        kind: doc.kind,
        id: Some(id),
        region: scope.region,
        spec: doc.spec.clone(),
        attributes: serde_json::to_value(&state)?,
    })
}

async fn read_with<H: ResourceHandler>(handler: &H, ctx: &ProviderContext, record: &StateRecord) -> Result<StateRecord, ProviderError> {
    let Some(id) = record.id.as_deref() else {
        return Ok(record.clone());
    };
    let spec = parse_spec(handler, record.kind, &record.spec)?;
    let prior = parse_state::<H>(record.kind, &record.attributes)?;
    let scope = ctx.scope(Some(&record.region)).await?;

    match handler.read(&scope, id, &spec, &prior).await? {
        Some(state) => Ok(StateRecord {
            attributes: serde_json::to_value(&state)?,
            ..record.clone()
        }),
        None => {
            warn!("{} {} no longer exists", record.kind, id);
            Ok(StateRecord::gone(record.kind, record.region.clone(), record.spec.clone()))
        }
    }
}

async fn update_with<H: ResourceHandler>(handler: &H, ctx: &ProviderContext, record: &StateRecord, doc: &ResourceDocument) -> Result<StateRecord, ProviderError> {
    if record.kind != doc.kind {
        return Err(ProviderError::RequiresReplacement(format!(
            "type changed from {} to {}",
            record.kind, doc.kind
        )));
    }
    let region = ctx.region_for(doc.region.as_deref());
    if region != record.region {
        return Err(ProviderError::RequiresReplacement(format!(
            "region changed from {} to {}",
            record.region, region
        )));
    }

    let id = record_id(record)?;
    let old = parse_spec(handler, record.kind, &record.spec)?;
    let new = parse_spec(handler, doc.kind, &doc.spec)?;
    let prior = parse_state::<H>(record.kind, &record.attributes)?;
    let scope = ctx.scope(Some(&record.region)).await?;
    info!("Updating {} {}", record.kind, id);

    let state = handler.update(&scope, id, &old, &new, &prior).await?;
    Ok(StateRecord {
        kind: record.kind,
        id: Some(id.to_string()),
        region: record.region.clone(),
        spec: doc.spec.clone(),
        attributes: serde_json::to_value(&state)?,
    })
}

async fn delete_with<H: ResourceHandler>(handler: &H, ctx: &ProviderContext, record: &StateRecord) -> Result<StateRecord, ProviderError> {
    let Some(id) = record.id.as_deref() else {
        return Ok(record.clone());
    };
    let spec = parse_spec(handler, record.kind, &record.spec)?;
    let prior = parse_state::<H>(record.kind, &record.attributes)?;
    let scope = ctx.scope(Some(&record.region)).await?;
    info!("Deleting {} {}", record.kind, id);

    handler.delete(&scope, id, &spec, &prior).await?;
    info!("Deleted {} {}", record.kind, id);
    Ok(StateRecord::gone(record.kind, record.region.clone(), record.spec.clone()))
}

macro_rules! dispatch {
    ($kind:expr, $handler:ident => $body:expr) => {
        match $kind {
            ResourceKind::Instance => { let $handler = &InstanceHandler; $body }
            ResourceKind::Volume => { let $handler = &VolumeHandler; $body }
            ResourceKind::Keypair => { let $handler = &KeypairHandler; $body }
            ResourceKind::FloatingIp => { let $handler = &FloatingIpHandler; $body }
            ResourceKind::SecGroup => { let $handler = &SecGroupHandler; $body }
            ResourceKind::Network => { let $handler = &NetworkHandler; $body }
            ResourceKind::Subnet => { let $handler = &SubnetHandler; $body }
            ResourceKind::Router => { let $handler = &RouterHandler; $body }
            ResourceKind::FirewallRule => { let $handler = &FirewallRuleHandler; $body }
            ResourceKind::FirewallPolicy => { let $handler = &FirewallPolicyHandler; $body }
            ResourceKind::Firewall => { let $handler = &FirewallHandler; $body }
            ResourceKind::Lbaas => { let $handler = &LbaasHandler; $body }
        }
    };
}

/// Lifecycle entry points over every resource type
#[derive(Debug, Clone)]
pub struct Provider {
    ctx: ProviderContext,
}

impl Provider {
    pub fn new(ctx: ProviderContext) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, doc: &ResourceDocument) -> Result<StateRecord, ProviderError> {
        dispatch!(doc.kind, handler => create_with(handler, &self.ctx, doc).await)
    }

    pub async fn read(&self, record: &StateRecord) -> Result<StateRecord, ProviderError> {
        dispatch!(record.kind, handler => read_with(handler, &self.ctx, record).await)
    }

    pub async fn update(&self, record: &StateRecord, doc: &ResourceDocument) -> Result<StateRecord, ProviderError> {
        dispatch!(record.kind, handler => update_with(handler, &self.ctx, record, doc).await)
    }

    pub async fn delete(&self, record: &StateRecord) -> Result<StateRecord, ProviderError> {
        dispatch!(record.kind, handler => delete_with(handler, &self.ctx, record).await)
    }
}
