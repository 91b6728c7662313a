//! Block storage operations for MockOpenStackClient

use super::{MockOpenStackClient, Tracked, lock, not_found, poll_tracked};
use crate::error::OpenStackError;
use crate::models::*;

pub async fn create_volume(client: &MockOpenStackClient, request: &CreateVolumeRequest) -> Result<Volume, OpenStackError> {
    client.enter("create_volume")?;
    let volume = Volume {
        id: client.next_id("volume"),
        status: "creating".to_string(),
        name: Some(request.name.clone()),
        description: request.description.clone(),
        size: request.size,
        volume_type: request.volume_type.clone(),
        availability_zone: Some(request.availability_zone.clone().unwrap_or_else(|| "nova".to_string())),
        snapshot_id: request.snapshot_id.clone(),
        source_volume_id: request.source_volume_id.clone(),
        bootable: Some(request.image_id.is_some().to_string()),
        created_at: Some("2026-01-01T00:00:00.000000".to_string()),
        attachments: Vec::new(),
        metadata: request.metadata.clone(),
    };

    let mut tracked = Tracked::settled(volume.clone());
    tracked.transition("creating", client.pending_polls, &client.settle_status("volume", "available"));
    lock(&client.volumes).insert(volume.id.clone(), tracked);
    Ok(volume)
}

pub async fn get_volume(client: &MockOpenStackClient, id: &str) -> Result<Volume, OpenStackError> {
    client.enter("get_volume")?;
    poll_tracked(&client.volumes, "volume", id)
}

pub async fn update_volume(client: &MockOpenStackClient, id: &str, request: &UpdateVolumeRequest) -> Result<Volume, OpenStackError> {
    client.enter("update_volume")?;
    let mut volumes = lock(&client.volumes);
    let entry = volumes.get_mut(id).ok_or_else(|| not_found("volume", id))?;
    if let Some(name) = &request.name {
        entry.value.name = Some(name.clone());
    }
    if let Some(description) = &request.description {
        entry.value.description = Some(description.clone());
    }
    if let Some(metadata) = &request.metadata {
        entry.value.metadata = metadata.clone();
    }
    Ok(entry.value.clone())
}

pub async fn delete_volume(client: &MockOpenStackClient, id: &str) -> Result<(), OpenStackError> {
    client.enter("delete_volume")?;
    let mut volumes = lock(&client.volumes);
    let entry = volumes.get_mut(id).ok_or_else(|| not_found("volume", id))?;
    if !entry.value.attachments.is_empty() {
        return Err(OpenStackError::Api {
            status: 400,
            message: format!("volume {id} is still attached"),
        });
    }
    if entry.is_removing() {
        return Ok(());
    }
    entry.remove_after(Some("deleting"), client.delete_polls);
    Ok(())
}
