//! Mock OpenStackClient for unit testing
//!
//! This module provides an in-memory implementation of [`OpenStackClientTrait`]
//! so that resource handlers can be exercised without a cloud.
//!
//! Resources with a lifecycle (servers, volumes, routers, firewalls, pools)
//! follow scripted status transitions: a created server reports `BUILD` for
//! `pending_polls` reads and then `ACTIVE`, a deleted one keeps answering for
//! `delete_polls` reads before it disappears.
//!
//! The mock is organized into service modules:
//! - `compute.rs` - servers, flavors, images, keypairs, security groups,
//!   volume attachments and nova-network floating IPs
//! - `blockstorage.rs` - volumes
//! - `network.rs` - networks, subnets, routers, ports, FWaaS, LBaaS and
//!   neutron floating IPs

mod blockstorage;
mod compute;
mod network;

use crate::error::OpenStackError;
use crate::models::*;
use crate::openstack_trait::{CloudConnector, OpenStackClientTrait};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub(crate) type Store<T> = Arc<Mutex<HashMap<String, T>>>;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn not_found(kind: &str, id: &str) -> OpenStackError {
    OpenStackError::NotFound(format!("{kind} {id} not found"))
}

pub(crate) fn conflict(message: impl Into<String>) -> OpenStackError {
    OpenStackError::Api {
        status: 409,
        message: message.into(),
    }
}

/// Entities whose status the mock scripts
pub(crate) trait Stateful: Clone {
    fn set_status(&mut self, status: &str);
    fn status(&self) -> &str;
}

macro_rules! stateful {
    ($($ty:ty),*) => {
        $(impl Stateful for $ty {
            fn set_status(&mut self, status: &str) {
                self.status = status.to_string();
            }

            fn status(&self) -> &str {
                &self.status
            }
        })*
    };
}

stateful!(Server, Volume, Router, Firewall, Pool);

/// A stored entity plus the statuses its next reads will report
#[derive(Debug, Clone)]
pub(crate) struct Tracked<T> {
    pub(crate) value: T,
    script: VecDeque<String>,
    removing: bool,
}

impl<T: Stateful> Tracked<T> {
    pub(crate) fn settled(value: T) -> Self {
        Self {
            value,
            script: VecDeque::new(),
            removing: false,
        }
    }

    /// Report `through` for `polls` reads, then settle on `to`.
    pub(crate) fn transition(&mut self, through: &str, polls: usize, to: &str) {
        self.value.set_status(through);
        self.script = std::iter::repeat_n(through.to_string(), polls).collect();
        self.script.push_back(to.to_string());
        self.removing = false;
    }

    /// Keep answering for `polls` reads (optionally with a new status), then vanish.
    pub(crate) fn remove_after(&mut self, through: Option<&str>, polls: usize) {
        if let Some(status) = through {
            self.value.set_status(status);
        }
        let current = self.value.status().to_string();
        self.script = std::iter::repeat_n(current, polls).collect();
        self.removing = true;
    }

    pub(crate) fn is_removing(&self) -> bool {
        self.removing
    }

    /// Advance one read; `None` once a removal has completed.
    fn poll(&mut self) -> Option<T> {
        match self.script.pop_front() {
            Some(status) => {
                self.value.set_status(&status);
                Some(self.value.clone())
            }
            None if self.removing => None,
            None => Some(self.value.clone()),
        }
    }
}

/// Read `id` from a tracked store, dropping it once its removal completes.
pub(crate) fn poll_tracked<T: Stateful>(store: &Store<Tracked<T>>, kind: &str, id: &str) -> Result<T, OpenStackError> {
    let mut entries = lock(store);
    let entry = entries.get_mut(id).ok_or_else(|| not_found(kind, id))?;
    match entry.poll() {
        Some(value) => Ok(value),
        None => {
            entries.remove(id);
            Err(not_found(kind, id))
        }
    }
}

/// Mock OpenStackClient for testing
///
/// Clones share their stores, so a test can keep one handle for inspection
/// while the provider works through another.
#[derive(Debug, Clone)]
pub struct MockOpenStackClient {
    pub(crate) region: String,
    pub(crate) tenant_id: String,
    // Scripting
    pub(crate) pending_polls: usize,
    pub(crate) delete_polls: usize,
    pub(crate) settle: Arc<Mutex<HashMap<String, String>>>,
    pub(crate) server_addresses: Arc<Mutex<Option<BTreeMap<String, Vec<ServerAddress>>>>>,
    // Compute
    pub(crate) servers: Store<Tracked<Server>>,
    pub(crate) flavors: Store<Flavor>,
    pub(crate) images: Store<Image>,
    pub(crate) keypairs: Store<Keypair>,
    pub(crate) security_groups: Store<SecurityGroup>,
    pub(crate) nova_floating_ips: Store<NovaFloatingIp>,
    // Block storage
    pub(crate) volumes: Store<Tracked<Volume>>,
    // Network
    pub(crate) networks: Store<Network>,
    pub(crate) subnets: Store<Subnet>,
    pub(crate) routers: Store<Tracked<Router>>,
    pub(crate) ports: Store<Port>,
    pub(crate) firewall_rules: Store<FirewallRule>,
    pub(crate) firewall_policies: Store<FirewallPolicy>,
    pub(crate) firewalls: Store<Tracked<Firewall>>,
    pub(crate) pools: Store<Tracked<Pool>>,
    pub(crate) members: Store<Member>,
    pub(crate) health_monitors: Store<HealthMonitor>,
    pub(crate) vips: Store<Vip>,
    pub(crate) floating_ips: Store<FloatingIp>,
    // Bookkeeping
    pub(crate) calls: Arc<Mutex<Vec<String>>>,
    pub(crate) failures: Arc<Mutex<HashMap<String, String>>>,
    pub(crate) next_id: Arc<Mutex<u64>>,
}

impl MockOpenStackClient {
    /// Create a new mock client for `region`
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            tenant_id: "mock-tenant".to_string(),
            pending_polls: 1,
            delete_polls: 1,
            settle: Arc::default(),
            server_addresses: Arc::default(),
            servers: Arc::default(),
            flavors: Arc::default(),
            images: Arc::default(),
            keypairs: Arc::default(),
            security_groups: Arc::default(),
            nova_floating_ips: Arc::default(),
            volumes: Arc::default(),
            networks: Arc::default(),
            subnets: Arc::default(),
            routers: Arc::default(),
            ports: Arc::default(),
            firewall_rules: Arc::default(),
            firewall_policies: Arc::default(),
            firewalls: Arc::default(),
            pools: Arc::default(),
            members: Arc::default(),
            health_monitors: Arc::default(),
            vips: Arc::default(),
            floating_ips: Arc::default(),
            calls: Arc::default(),
            failures: Arc::default(),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    /// Tenant stamped on created entities
    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = tenant_id.into();
        self
    }

    /// Number of reads that report the transitional status before settling
    #[must_use]
    pub fn with_pending_polls(mut self, polls: usize) -> Self {
        self.pending_polls = polls;
        self
    }

    /// Number of reads a deleted entity keeps answering before it is gone
    #[must_use]
    pub fn with_delete_polls(mut self, polls: usize) -> Self {
        self.delete_polls = polls;
        self
    }

    /// Override the status a kind (`server`, `volume`, `router`, `firewall`,
    /// `pool`) settles on after creation, e.g. `ERROR` for a failed build.
    pub fn set_settle_status(&self, kind: &str, status: &str) {
        lock(&self.settle).insert(kind.to_string(), status.to_string());
    }

    /// Addresses reported for every server booted from now on
    pub fn set_server_addresses(&self, addresses: BTreeMap<String, Vec<ServerAddress>>) {
        *lock(&self.server_addresses) = Some(addresses);
    }

    /// Make every call of `operation` fail with a 500 carrying `message`
    pub fn fail_on(&self, operation: &str, message: &str) {
        lock(&self.failures).insert(operation.to_string(), message.to_string());
    }

    /// Stop failing `operation`
    pub fn clear_failure(&self, operation: &str) {
        lock(&self.failures).remove(operation);
    }

    /// How many times `operation` was called
    #[must_use]
    pub fn call_count(&self, operation: &str) -> usize {
        lock(&self.calls).iter().filter(|c| c.as_str() == operation).count()
    }

    /// Every call made so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    // Seeding

    pub fn add_flavor(&self, flavor: Flavor) {
        lock(&self.flavors).insert(flavor.id.clone(), flavor);
    }

    pub fn add_image(&self, image: Image) {
        lock(&self.images).insert(image.id.clone(), image);
    }

    /// Store a server that already exists in the cloud
    pub fn add_server(&self, server: Server) {
        lock(&self.servers).insert(server.id.clone(), Tracked::settled(server));
    }

    pub fn add_network(&self, network: Network) {
        lock(&self.networks).insert(network.id.clone(), network);
    }

    pub fn add_subnet(&self, subnet: Subnet) {
        lock(&self.subnets).insert(subnet.id.clone(), subnet);
    }

    pub fn add_port(&self, port: Port) {
        lock(&self.ports).insert(port.id.clone(), port);
    }

    pub fn add_network_floating_ip(&self, floating_ip: FloatingIp) {
        lock(&self.floating_ips).insert(floating_ip.id.clone(), floating_ip);
    }

    // Inspection

    /// Current server without advancing its script
    #[must_use]
    pub fn server(&self, id: &str) -> Option<Server> {
        lock(&self.servers).get(id).map(|t| t.value.clone())
    }

    /// Current volume without advancing its script
    #[must_use]
    pub fn volume(&self, id: &str) -> Option<Volume> {
        lock(&self.volumes).get(id).map(|t| t.value.clone())
    }

    #[must_use]
    pub fn security_group(&self, id: &str) -> Option<SecurityGroup> {
        lock(&self.security_groups).get(id).cloned()
    }

    #[must_use]
    pub fn nova_floating_ip(&self, id: &str) -> Option<NovaFloatingIp> {
        lock(&self.nova_floating_ips).get(id).cloned()
    }

    #[must_use]
    pub fn network_floating_ip(&self, id: &str) -> Option<FloatingIp> {
        lock(&self.floating_ips).get(id).cloned()
    }

    #[must_use]
    pub fn ports(&self) -> Vec<Port> {
        lock(&self.ports).values().cloned().collect()
    }

    #[must_use]
    pub fn pool(&self, id: &str) -> Option<Pool> {
        lock(&self.pools).get(id).map(|t| t.value.clone())
    }

    #[must_use]
    pub fn member_count(&self) -> usize {
        lock(&self.members).len()
    }

    #[must_use]
    pub fn health_monitor_count(&self) -> usize {
        lock(&self.health_monitors).len()
    }

    /// Record a call and return the injected failure, if any.
    pub(crate) fn enter(&self, operation: &str) -> Result<(), OpenStackError> {
        lock(&self.calls).push(operation.to_string());
        match lock(&self.failures).get(operation) {
            Some(message) => Err(OpenStackError::Api {
                status: 500,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    pub(crate) fn next_id(&self, prefix: &str) -> String {
        let mut next = lock(&self.next_id);
        let id = format!("{prefix}-{}", *next);
        *next += 1;
        id
    }

    pub(crate) fn next_number(&self) -> u64 {
        let mut next = lock(&self.next_id);
        let n = *next;
        *next += 1;
        n
    }

    pub(crate) fn settle_status(&self, kind: &str, default: &str) -> String {
        lock(&self.settle)
            .get(kind)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }
}

#[async_trait::async_trait]
impl OpenStackClientTrait for MockOpenStackClient {
    fn region(&self) -> &str {
        &self.region
    }

    async fn create_server(&self, request: &CreateServerRequest) -> Result<Server, OpenStackError> {
        compute::create_server(self, request).await
    }

    async fn get_server(&self, id: &str) -> Result<Server, OpenStackError> {
        compute::get_server(self, id).await
    }

    async fn rename_server(&self, id: &str, name: &str) -> Result<Server, OpenStackError> {
        compute::rename_server(self, id, name).await
    }

    async fn set_server_metadata(&self, id: &str, metadata: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>, OpenStackError> {
        compute::set_server_metadata(self, id, metadata).await
    }

    async fn resize_server(&self, id: &str, flavor_id: &str) -> Result<(), OpenStackError> {
        compute::resize_server(self, id, flavor_id).await
    }

    async fn confirm_resize(&self, id: &str) -> Result<(), OpenStackError> {
        compute::confirm_resize(self, id).await
    }

    async fn delete_server(&self, id: &str) -> Result<(), OpenStackError> {
        compute::delete_server(self, id).await
    }

    async fn get_flavor(&self, id: &str) -> Result<Flavor, OpenStackError> {
        compute::get_flavor(self, id).await
    }

    async fn list_flavors(&self) -> Result<Vec<Flavor>, OpenStackError> {
        compute::list_flavors(self).await
    }

    async fn get_image(&self, id: &str) -> Result<Image, OpenStackError> {
        compute::get_image(self, id).await
    }

    async fn list_images(&self) -> Result<Vec<Image>, OpenStackError> {
        compute::list_images(self).await
    }

    async fn create_keypair(&self, name: &str, public_key: &str) -> Result<Keypair, OpenStackError> {
        compute::create_keypair(self, name, public_key).await
    }

    async fn get_keypair(&self, name: &str) -> Result<Keypair, OpenStackError> {
        compute::get_keypair(self, name).await
    }

    async fn delete_keypair(&self, name: &str) -> Result<(), OpenStackError> {
        compute::delete_keypair(self, name).await
    }

    async fn create_security_group(&self, name: &str, description: &str) -> Result<SecurityGroup, OpenStackError> {
        compute::create_security_group(self, name, description).await
    }

    async fn get_security_group(&self, id: &str) -> Result<SecurityGroup, OpenStackError> {
        compute::get_security_group(self, id).await
    }

    async fn update_security_group(&self, id: &str, name: &str, description: &str) -> Result<SecurityGroup, OpenStackError> {
        compute::update_security_group(self, id, name, description).await
    }

    async fn delete_security_group(&self, id: &str) -> Result<(), OpenStackError> {
        compute::delete_security_group(self, id).await
    }

    async fn create_security_group_rule(&self, rule: &CreateSecurityGroupRule) -> Result<SecurityGroupRule, OpenStackError> {
        compute::create_security_group_rule(self, rule).await
    }

    async fn delete_security_group_rule(&self, id: &str) -> Result<(), OpenStackError> {
        compute::delete_security_group_rule(self, id).await
    }

    async fn attach_volume(&self, server_id: &str, volume_id: &str, device: Option<&str>) -> Result<VolumeAttachment, OpenStackError> {
        compute::attach_volume(self, server_id, volume_id, device).await
    }

    async fn detach_volume(&self, server_id: &str, attachment_id: &str) -> Result<(), OpenStackError> {
        compute::detach_volume(self, server_id, attachment_id).await
    }

    async fn allocate_floating_ip(&self, pool: &str) -> Result<NovaFloatingIp, OpenStackError> {
        compute::allocate_floating_ip(self, pool).await
    }

    async fn get_floating_ip(&self, id: &str) -> Result<NovaFloatingIp, OpenStackError> {
        compute::get_floating_ip(self, id).await
    }

    async fn release_floating_ip(&self, id: &str) -> Result<(), OpenStackError> {
        compute::release_floating_ip(self, id).await
    }

    async fn associate_floating_ip(&self, server_id: &str, address: &str) -> Result<(), OpenStackError> {
        compute::associate_floating_ip(self, server_id, address).await
    }

    async fn disassociate_floating_ip(&self, server_id: &str, address: &str) -> Result<(), OpenStackError> {
        compute::disassociate_floating_ip(self, server_id, address).await
    }

    async fn create_volume(&self, request: &CreateVolumeRequest) -> Result<Volume, OpenStackError> {
        blockstorage::create_volume(self, request).await
    }

    async fn get_volume(&self, id: &str) -> Result<Volume, OpenStackError> {
        blockstorage::get_volume(self, id).await
    }

    async fn update_volume(&self, id: &str, request: &UpdateVolumeRequest) -> Result<Volume, OpenStackError> {
        blockstorage::update_volume(self, id, request).await
    }

    async fn delete_volume(&self, id: &str) -> Result<(), OpenStackError> {
        blockstorage::delete_volume(self, id).await
    }

    async fn create_network(&self, request: &CreateNetworkRequest) -> Result<Network, OpenStackError> {
        network::create_network(self, request).await
    }

    async fn get_network(&self, id: &str) -> Result<Network, OpenStackError> {
        network::get_network(self, id).await
    }

    async fn update_network(&self, id: &str, request: &UpdateNetworkRequest) -> Result<Network, OpenStackError> {
        network::update_network(self, id, request).await
    }

    async fn delete_network(&self, id: &str) -> Result<(), OpenStackError> {
        network::delete_network(self, id).await
    }

    async fn list_external_networks(&self) -> Result<Vec<Network>, OpenStackError> {
        network::list_external_networks(self).await
    }

    async fn create_subnet(&self, request: &CreateSubnetRequest) -> Result<Subnet, OpenStackError> {
        network::create_subnet(self, request).await
    }

    async fn get_subnet(&self, id: &str) -> Result<Subnet, OpenStackError> {
        network::get_subnet(self, id).await
    }

    async fn update_subnet(&self, id: &str, request: &UpdateSubnetRequest) -> Result<Subnet, OpenStackError> {
        network::update_subnet(self, id, request).await
    }

    async fn delete_subnet(&self, id: &str) -> Result<(), OpenStackError> {
        network::delete_subnet(self, id).await
    }

    async fn create_router(&self, request: &CreateRouterRequest) -> Result<Router, OpenStackError> {
        network::create_router(self, request).await
    }

    async fn get_router(&self, id: &str) -> Result<Router, OpenStackError> {
        network::get_router(self, id).await
    }

    async fn rename_router(&self, id: &str, name: &str) -> Result<Router, OpenStackError> {
        network::rename_router(self, id, name).await
    }

    async fn delete_router(&self, id: &str) -> Result<(), OpenStackError> {
        network::delete_router(self, id).await
    }

    async fn add_router_interface(&self, router_id: &str, subnet_id: &str) -> Result<RouterInterface, OpenStackError> {
        network::add_router_interface(self, router_id, subnet_id).await
    }

    async fn remove_router_interface(&self, router_id: &str, port_id: &str) -> Result<(), OpenStackError> {
        network::remove_router_interface(self, router_id, port_id).await
    }

    async fn list_ports(&self, device_id: Option<&str>) -> Result<Vec<Port>, OpenStackError> {
        network::list_ports(self, device_id).await
    }

    async fn create_firewall_rule(&self, request: &CreateFirewallRuleRequest) -> Result<FirewallRule, OpenStackError> {
        network::create_firewall_rule(self, request).await
    }

    async fn get_firewall_rule(&self, id: &str) -> Result<FirewallRule, OpenStackError> {
        network::get_firewall_rule(self, id).await
    }

    async fn delete_firewall_rule(&self, id: &str) -> Result<(), OpenStackError> {
        network::delete_firewall_rule(self, id).await
    }

    async fn create_firewall_policy(&self, request: &CreateFirewallPolicyRequest) -> Result<FirewallPolicy, OpenStackError> {
        network::create_firewall_policy(self, request).await
    }

    async fn get_firewall_policy(&self, id: &str) -> Result<FirewallPolicy, OpenStackError> {
        network::get_firewall_policy(self, id).await
    }

    async fn delete_firewall_policy(&self, id: &str) -> Result<(), OpenStackError> {
        network::delete_firewall_policy(self, id).await
    }

    async fn create_firewall(&self, request: &CreateFirewallRequest) -> Result<Firewall, OpenStackError> {
        network::create_firewall(self, request).await
    }

    async fn get_firewall(&self, id: &str) -> Result<Firewall, OpenStackError> {
        network::get_firewall(self, id).await
    }

    async fn delete_firewall(&self, id: &str) -> Result<(), OpenStackError> {
        network::delete_firewall(self, id).await
    }

    async fn create_pool(&self, request: &CreatePoolRequest) -> Result<Pool, OpenStackError> {
        network::create_pool(self, request).await
    }

    async fn get_pool(&self, id: &str) -> Result<Pool, OpenStackError> {
        network::get_pool(self, id).await
    }

    async fn update_pool(&self, id: &str, request: &UpdatePoolRequest) -> Result<Pool, OpenStackError> {
        network::update_pool(self, id, request).await
    }

    async fn delete_pool(&self, id: &str) -> Result<(), OpenStackError> {
        network::delete_pool(self, id).await
    }

    async fn create_member(&self, request: &CreateMemberRequest) -> Result<Member, OpenStackError> {
        network::create_member(self, request).await
    }

    async fn delete_member(&self, id: &str) -> Result<(), OpenStackError> {
        network::delete_member(self, id).await
    }

    async fn create_health_monitor(&self, request: &CreateHealthMonitorRequest) -> Result<HealthMonitor, OpenStackError> {
        network::create_health_monitor(self, request).await
    }

    async fn delete_health_monitor(&self, id: &str) -> Result<(), OpenStackError> {
        network::delete_health_monitor(self, id).await
    }

    async fn associate_health_monitor(&self, pool_id: &str, monitor_id: &str) -> Result<(), OpenStackError> {
        network::associate_health_monitor(self, pool_id, monitor_id).await
    }

    async fn disassociate_health_monitor(&self, pool_id: &str, monitor_id: &str) -> Result<(), OpenStackError> {
        network::disassociate_health_monitor(self, pool_id, monitor_id).await
    }

    async fn create_vip(&self, request: &CreateVipRequest) -> Result<Vip, OpenStackError> {
        network::create_vip(self, request).await
    }

    async fn get_vip(&self, id: &str) -> Result<Vip, OpenStackError> {
        network::get_vip(self, id).await
    }

    async fn delete_vip(&self, id: &str) -> Result<(), OpenStackError> {
        network::delete_vip(self, id).await
    }

    async fn list_network_floating_ips(&self) -> Result<Vec<FloatingIp>, OpenStackError> {
        network::list_network_floating_ips(self).await
    }

    async fn associate_network_floating_ip(&self, floating_ip_id: &str, port_id: &str) -> Result<FloatingIp, OpenStackError> {
        network::associate_network_floating_ip(self, floating_ip_id, port_id).await
    }
}

/// Mock cloud handing out registered per-region mock clients
#[derive(Debug, Clone)]
pub struct MockCloud {
    tenant_id: String,
    clients: Arc<Mutex<HashMap<String, MockOpenStackClient>>>,
}

impl MockCloud {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            clients: Arc::default(),
        }
    }

    /// Register `client` for its region
    #[must_use]
    pub fn with_client(self, client: MockOpenStackClient) -> Self {
        lock(&self.clients).insert(client.region.clone(), client);
        self
    }
}

#[async_trait::async_trait]
impl CloudConnector for MockCloud {
    fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    async fn client_for(&self, region: &str) -> Result<Arc<dyn OpenStackClientTrait>, OpenStackError> {
        let client = lock(&self.clients)
            .get(region)
            .cloned()
            .ok_or_else(|| OpenStackError::EndpointNotFound {
                service: "compute".to_string(),
                region: region.to_string(),
            })?;
        Ok(Arc::new(client))
    }
}
