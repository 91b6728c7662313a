//! OpenStack API models
//!
//! Request and response bodies for the compute (Nova v2), block storage
//! (Cinder v1) and network (Neutron v2.0) APIs. Only the fields the provider
//! reads or writes are modelled; unknown fields are ignored.

pub mod blockstorage;
pub mod compute;
pub mod network;

pub use blockstorage::*;
pub use compute::*;
pub use network::*;

use serde::{Deserialize, Deserializer};

/// Accept ids serialized either as strings or as integers (nova-network
/// security groups and floating IPs use integers).
pub(crate) fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Num(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Num(n) => n.to_string(),
    })
}

/// Optional variant of [`de_id`]; `null` stays `None`.
pub(crate) fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Num(i64),
    }

    Ok(Option::<Id>::deserialize(deserializer)?.map(|id| match id {
        Id::Str(s) => s,
        Id::Num(n) => n.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(deserialize_with = "de_id")]
        id: String,
        #[serde(default, deserialize_with = "de_opt_id")]
        parent: Option<String>,
    }

    #[test]
    fn test_ids_accept_numbers_and_strings() {
        let h: Holder = serde_json::from_str(r#"{"id": 42, "parent": "7"}"#).unwrap();
        assert_eq!(h.id, "42");
        assert_eq!(h.parent.as_deref(), Some("7"));

        let h: Holder = serde_json::from_str(r#"{"id": "abc", "parent": null}"#).unwrap();
        assert_eq!(h.id, "abc");
        assert_eq!(h.parent, None);
    }
}
