//! Trap Translator: maps one node record to its varbind set.
//!
//! Pure and deterministic. The varbind set is a function of the record
//! and the static trap configuration only, so the same node always
//! produces the same trap payload.

use crate::config::TrapConfig;
use crate::error::TranslateError;
use crate::fetcher::NodeRecord;

/// Standard OIDs carried at the head of every trap.
pub const SYSUPTIME_OID: &str = "1.3.6.1.2.1.1.3.0";
pub const SNMP_TRAP_OID: &str = "1.3.6.1.6.3.1.1.4.1.0";
pub const GENERIC_TRAP_OID: &str = "1.3.6.1.6.3.1.1.4.3.0";
pub const SYSLOCATION_OID: &str = "1.3.6.1.2.1.1.6.0";

/// Fixed enterprise prefix reported in the generic-trap varbind.
pub const ENTERPRISE_PREFIX: &str = "1.3.6.1.4.1.11307";

/// One (OID, value) pair. All values travel as opaque text; the receiver
/// expects octet strings even for numeric fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Varbind {
    pub oid: String,
    pub value: String,
}

/// Ordered varbind sequence for one node. Order is part of the wire
/// contract and must not change.
pub type VarbindSet = Vec<Varbind>;

/// Coerce the raw `NodeID` field to an integer.
///
/// Accepts a JSON integer, a float (truncated), or a string holding an
/// integer. Anything else fails the translation, and with it the run.
pub fn coerce_node_id(record: &NodeRecord) -> Result<i64, TranslateError> {
    let raw = record.node_id.as_ref().ok_or(TranslateError::MissingNodeId)?;
    match raw {
        serde_json::Value::Number(n) => {
            if let Some(id) = n.as_i64() {
                Ok(id)
            } else if let Some(f) = n.as_f64() {
                Ok(f.trunc() as i64)
            } else {
                Err(TranslateError::InvalidNodeId {
                    value: raw.to_string(),
                })
            }
        }
        serde_json::Value::String(s) => {
            s.trim().parse::<i64>().map_err(|_| TranslateError::InvalidNodeId {
                value: raw.to_string(),
            })
        }
        _ => Err(TranslateError::InvalidNodeId {
            value: raw.to_string(),
        }),
    }
}

/// Stable placeholder address for nodes the API reports without an IP.
///
/// Not routable; `10.199.x.y` is derived from the node id so a given node
/// always maps to the same mock address. Matches the floor-division
/// arithmetic of the upstream inventory tooling, negative ids included.
pub fn fallback_ip(node_id: i64) -> String {
    let a = node_id.div_euclid(256).rem_euclid(256);
    let b = node_id.rem_euclid(256);
    format!("10.199.{}.{}", a, b)
}

/// Build the ordered varbind set for one node record.
pub fn build_varbinds(
    record: &NodeRecord,
    trap: &TrapConfig,
) -> Result<VarbindSet, TranslateError> {
    let node_id = coerce_node_id(record)?;

    let caption = record
        .caption
        .clone()
        .unwrap_or_else(|| format!("node-{}", node_id));
    let status = record
        .status
        .as_deref()
        .unwrap_or("unknown")
        .to_lowercase();
    let vendor = record.vendor.clone().unwrap_or_else(|| "unknown".to_string());
    // Empty strings count as absent; the API emits both.
    let node_ip = record
        .node_ip
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| fallback_ip(node_id));
    let location = record
        .location
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(&trap.default_location)
        .to_string();

    let root = &trap.enterprise_oid;

    Ok(vec![
        // Uptime tracking is intentionally not implemented.
        Varbind {
            oid: SYSUPTIME_OID.to_string(),
            value: "0".to_string(),
        },
        Varbind {
            oid: SNMP_TRAP_OID.to_string(),
            value: root.clone(),
        },
        Varbind {
            oid: GENERIC_TRAP_OID.to_string(),
            value: ENTERPRISE_PREFIX.to_string(),
        },
        Varbind {
            oid: SYSLOCATION_OID.to_string(),
            value: location,
        },
        Varbind {
            oid: format!("{}.1", root),
            value: status,
        },
        Varbind {
            oid: format!("{}.2", root),
            value: caption,
        },
        Varbind {
            oid: format!("{}.3", root),
            value: node_ip,
        },
        Varbind {
            oid: format!("{}.4", root),
            value: node_id.to_string(),
        },
        Varbind {
            oid: format!("{}.5", root),
            value: vendor,
        },
    ])
}
