//! Cinder v1 volume models

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attachment as reported on the volume
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeAttachmentInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub server_id: String,
    #[serde(default)]
    pub device: Option<String>,
}

/// Volume model matching the Cinder v1 `volume` body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "display_name", default)]
    pub name: Option<String>,
    #[serde(rename = "display_description", default)]
    pub description: Option<String>,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub volume_type: Option<String>,
    #[serde(default)]
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub snapshot_id: Option<String>,
    #[serde(rename = "source_volid", default)]
    pub source_volume_id: Option<String>,
    #[serde(default)]
    pub bootable: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub attachments: Vec<VolumeAttachmentInfo>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Parameters for creating a volume
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVolumeRequest {
    #[serde(rename = "display_name")]
    pub name: String,
    #[serde(rename = "display_description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    #[serde(rename = "source_volid", skip_serializing_if = "Option::is_none")]
    pub source_volume_id: Option<String>,
    #[serde(rename = "imageRef", skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// Mutable volume fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateVolumeRequest {
    #[serde(rename = "display_name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "display_description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_uses_v1_field_names() {
        let req = CreateVolumeRequest {
            name: "data".to_string(),
            size: 10,
            image_id: Some("img-1".to_string()),
            ..Default::default()
        };
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["display_name"], "data");
        assert_eq!(body["imageRef"], "img-1");
        assert!(body.get("metadata").is_none());
        assert!(body.get("display_description").is_none());
    }
}
