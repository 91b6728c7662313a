//! `openstack_volume`: a Cinder volume, optionally attached to servers

use crate::context::Scope;
use crate::error::ProviderError;
use crate::provider::ResourceHandler;
use crate::resources::{found, immutable, non_empty, partial, unique_by_name};
use crate::waits::{self, wait_for};
use openstack_client::{CreateVolumeRequest, OpenStackClientTrait, UpdateVolumeRequest, Volume};
use serde::{Deserialize, Serialize};
use state_reconciler::TargetStatus;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// One server attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VolumeAttach {
    pub instance_id: String,
    #[serde(default)]
    pub device: Option<String>,
}

/// Desired volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VolumeSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub size: u32,
    #[serde(default)]
    pub volume_type: Option<String>,
    #[serde(default)]
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub snapshot_id: Option<String>,
    #[serde(default)]
    pub source_volume_id: Option<String>,
    #[serde(default)]
    pub image_id: Option<String>,
    #[serde(default)]
    pub image_name: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub attach: Vec<VolumeAttach>,
}

/// Attachment as reported by Cinder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentState {
    pub id: String,
    pub instance_id: String,
    pub device: Option<String>,
}

/// Observed volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeState {
    pub name: Option<String>,
    pub description: Option<String>,
    pub size: u32,
    pub status: String,
    pub volume_type: Option<String>,
    pub availability_zone: Option<String>,
    pub bootable: Option<String>,
    pub created_at: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub attach: Vec<AttachmentState>,
}

impl From<Volume> for VolumeState {
    fn from(volume: Volume) -> Self {
        Self {
            name: volume.name,
            description: volume.description,
            size: volume.size,
            status: volume.status,
            volume_type: volume.volume_type,
            availability_zone: volume.availability_zone,
            bootable: volume.bootable,
            created_at: volume.created_at,
            metadata: volume.metadata,
            attach: volume
                .attachments
                .into_iter()
                .map(|a| AttachmentState {
                    id: a.id,
                    instance_id: a.server_id,
                    device: a.device,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VolumeHandler;

async fn wait_for_volume(client: &Arc<dyn OpenStackClientTrait>, id: &str, pending: &[&str], target: TargetStatus) -> Result<Option<Volume>, ProviderError> {
    wait_for(id, pending, target, waits::VOLUME, |id| {
        let client = Arc::clone(client);
        async move {
            let volume = client.get_volume(&id).await?;
            Ok((volume.status.clone(), volume))
        }
    })
    .await
}

async fn attach_all(client: &Arc<dyn OpenStackClientTrait>, volume_id: &str, attach: &[VolumeAttach]) -> Result<(), ProviderError> {
    for a in attach {
        let attachment = client
            .attach_volume(&a.instance_id, volume_id, a.device.as_deref())
            .await?;
        info!(
            "Attaching volume {} to server {} as {}",
            volume_id,
            a.instance_id,
            attachment.device.as_deref().unwrap_or("auto")
        );
        wait_for_attachment(client, volume_id, &a.instance_id).await?;
    }
    Ok(())
}

/// Status of `volume` as seen by an attach to `instance_id`: `in-use` only
/// counts once that server is listed among the attachments.
pub fn attachment_status(volume: &Volume, instance_id: &str) -> String {
    if volume.status == "in-use" && !volume.attachments.iter().any(|a| a.server_id == instance_id) {
        "attaching".to_string()
    } else {
        volume.status.clone()
    }
}

async fn wait_for_attachment(client: &Arc<dyn OpenStackClientTrait>, volume_id: &str, instance_id: &str) -> Result<(), ProviderError> {
    wait_for(volume_id, &["available", "attaching"], TargetStatus::status("in-use"), waits::VOLUME, |id| {
        let client = Arc::clone(client);
        let instance_id = instance_id.to_string();
        async move {
            let volume = client.get_volume(&id).await?;
            Ok((attachment_status(&volume, &instance_id), volume))
        }
    })
    .await?;
    Ok(())
}

/// Detach every current attachment and wait for `available`.
async fn detach_all(client: &Arc<dyn OpenStackClientTrait>, volume: &Volume) -> Result<(), ProviderError> {
    if volume.attachments.is_empty() {
        return Ok(());
    }
    for a in &volume.attachments {
        info!("Detaching volume {} from server {}", volume.id, a.server_id);
        client.detach_volume(&a.server_id, &a.id).await?;
    }
    wait_for_volume(client, &volume.id, &["in-use", "detaching"], TargetStatus::status("available")).await?;
    Ok(())
}

#[async_trait::async_trait]
impl ResourceHandler for VolumeHandler {
    type Spec = VolumeSpec;
    type State = VolumeState;

    fn validate(&self, spec: &VolumeSpec) -> Result<(), ProviderError> {
        if spec.size == 0 {
            return Err(ProviderError::InvalidResource("volume size must be positive".to_string()));
        }
        if spec.attach.iter().any(|a| a.instance_id.is_empty()) {
            return Err(ProviderError::InvalidResource(
                "every attach entry needs an instance_id".to_string(),
            ));
        }
        Ok(())
    }

    async fn create(&self, scope: &Scope, spec: &VolumeSpec) -> Result<(String, VolumeState), ProviderError> {
        let client = &scope.client;

        let image_id = match (non_empty(spec.image_id.as_deref()), non_empty(spec.image_name.as_deref())) {
            (Some(id), _) => Some(id.to_string()),
            (None, Some(name)) => {
                let image = unique_by_name(client.list_images().await?, name, "image", |i| i.name.as_str())?;
                debug!("Image {} resolved to {}", name, image.id);
                Some(image.id)
            }
            (None, None) => None,
        };

        let request = CreateVolumeRequest {
            name: spec.name.clone(),
            description: spec.description.clone(),
            size: spec.size,
            volume_type: spec.volume_type.clone(),
            availability_zone: spec.availability_zone.clone(),
            snapshot_id: spec.snapshot_id.clone(),
            source_volume_id: spec.source_volume_id.clone(),
            image_id,
            metadata: spec.metadata.clone(),
        };
        let volume = client.create_volume(&request).await?;
        info!("Volume {} ({} GB) created, waiting for available", volume.id, spec.size);

        let settled = async {
            wait_for_volume(client, &volume.id, &["creating", "BUILD"], TargetStatus::status("available")).await?;
            attach_all(client, &volume.id, &spec.attach).await?;
            Ok::<_, ProviderError>(client.get_volume(&volume.id).await?)
        }
        .await;
        let volume = match settled {
            Ok(volume) => volume,
            Err(e) => {
                let id = volume.id.clone();
                return Err(partial(&id, &VolumeState::from(volume), e));
            }
        };
        Ok((volume.id.clone(), volume.into()))
    }

    async fn read(&self, scope: &Scope, id: &str, _spec: &VolumeSpec, _prior: &VolumeState) -> Result<Option<VolumeState>, ProviderError> {
        Ok(found(scope.client.get_volume(id).await)?.map(Into::into))
    }

    async fn update(&self, scope: &Scope, id: &str, old: &VolumeSpec, new: &VolumeSpec, _prior: &VolumeState) -> Result<VolumeState, ProviderError> {
        immutable("size", &old.size, &new.size)?;
        immutable("volume_type", &old.volume_type, &new.volume_type)?;
        immutable("availability_zone", &old.availability_zone, &new.availability_zone)?;
        immutable("snapshot_id", &old.snapshot_id, &new.snapshot_id)?;
        immutable("source_volume_id", &old.source_volume_id, &new.source_volume_id)?;
        immutable("image_id", &old.image_id, &new.image_id)?;
        immutable("image_name", &old.image_name, &new.image_name)?;

        let client = &scope.client;

        if old.name != new.name || old.description != new.description || old.metadata != new.metadata {
            let request = UpdateVolumeRequest {
                name: (old.name != new.name).then(|| new.name.clone()),
                description: if old.description == new.description {
                    None
                } else {
                    Some(new.description.clone().unwrap_or_default())
                },
                metadata: (old.metadata != new.metadata).then(|| new.metadata.clone()),
            };
            client.update_volume(id, &request).await?;
        }

        if old.attach != new.attach {
            let current = client.get_volume(id).await?;
            detach_all(client, &current).await?;
            attach_all(client, id, &new.attach).await?;
        }

        Ok(client.get_volume(id).await?.into())
    }

    async fn delete(&self, scope: &Scope, id: &str, _spec: &VolumeSpec, _prior: &VolumeState) -> Result<(), ProviderError> {
        let client = &scope.client;
        let Some(volume) = found(client.get_volume(id).await)? else {
            return Ok(());
        };

        detach_all(client, &volume).await?;
        client.delete_volume(id).await?;
        wait_for_volume(client, id, &["deleting", "available"], TargetStatus::Deleted).await?;
        Ok(())
    }
}
