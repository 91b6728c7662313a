//! Resource handlers
//!
//! One module per resource type, grouped the way the OpenStack services are:
//! - compute: `instance`, `keypair`, `floating_ip`, `secgroup`
//! - block storage: `volume`
//! - network: `network`, `subnet`, `router`, `firewall_rule`,
//!   `firewall_policy`, `firewall`, `lbaas`

pub mod firewall;
pub mod firewall_policy;
#[cfg(test)]
mod firewall_policy_test;
pub mod firewall_rule;
#[cfg(test)]
mod firewall_rule_test;
pub mod floating_ip;
pub mod instance;
#[cfg(test)]
mod instance_test;
pub mod keypair;
#[cfg(test)]
mod keypair_test;
pub mod lbaas;
pub mod network;
#[cfg(test)]
mod network_test;
pub mod router;
#[cfg(test)]
mod router_test;
pub mod secgroup;
#[cfg(test)]
mod secgroup_test;
pub mod subnet;
#[cfg(test)]
mod subnet_test;
pub mod volume;
#[cfg(test)]
mod volume_test;

use crate::error::ProviderError;
use openstack_client::OpenStackError;
use serde::Serialize;
use tracing::warn;

/// Serde default for flags that are on unless set
pub(crate) fn default_true() -> bool {
    true
}

/// Wrap a failure that happened after `id` was created, keeping `state`
/// so the caller can still record the resource.
pub(crate) fn partial<S: Serialize>(id: &str, state: &S, source: ProviderError) -> ProviderError {
    let attributes = serde_json::to_value(state).unwrap_or_else(|e| {
        warn!("State of {} could not be serialized: {}", id, e);
        serde_json::Value::Null
    });
    ProviderError::Partial {
        id: id.to_string(),
        attributes,
        source: Box::new(source),
    }
}

/// Map a 404 on read to "gone"
pub(crate) fn found<T>(result: Result<T, OpenStackError>) -> Result<Option<T>, ProviderError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Treat a 404 on delete as already done
pub(crate) fn ignore_not_found(result: Result<(), OpenStackError>) -> Result<(), ProviderError> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other.map_err(Into::into),
    }
}

/// `None` for unset and empty strings alike
pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Pick the single entry called `name`
pub(crate) fn unique_by_name<T>(items: Vec<T>, name: &str, kind: &str, name_of: impl Fn(&T) -> &str) -> Result<T, ProviderError> {
    let mut matches: Vec<T> = items.into_iter().filter(|item| name_of(item) == name).collect();
    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => Err(ProviderError::InvalidResource(format!("no {kind} named {name:?}"))),
        n => Err(ProviderError::InvalidResource(format!("{n} {kind}s named {name:?}; use an id"))),
    }
}

/// Match `desired` against `prior`, using each prior entry at most once.
///
/// Returns the prior entries to keep, the prior entries to remove and the
/// desired entries that have no counterpart yet.
pub(crate) fn diff_by<'a, S: Clone, D>(prior: &[S], desired: &'a [D], same: impl Fn(&S, &D) -> bool) -> (Vec<S>, Vec<S>, Vec<&'a D>) {
    let mut used = vec![false; prior.len()];
    let mut missing = Vec::new();
    for item in desired {
        match (0..prior.len()).find(|&i| !used[i] && same(&prior[i], item)) {
            Some(i) => used[i] = true,
            None => missing.push(item),
        }
    }

    let mut kept = Vec::new();
    let mut stale = Vec::new();
    for (entry, used) in prior.iter().zip(used) {
        if used {
            kept.push(entry.clone());
        } else {
            stale.push(entry.clone());
        }
    }
    (kept, stale, missing)
}

/// Fail with `RequiresReplacement` when `old != new`
pub(crate) fn immutable<T: PartialEq + std::fmt::Debug>(field: &str, old: &T, new: &T) -> Result<(), ProviderError> {
    if old == new {
        Ok(())
    } else {
        Err(ProviderError::RequiresReplacement(format!(
            "{field} cannot change in place ({old:?} -> {new:?})"
        )))
    }
}
