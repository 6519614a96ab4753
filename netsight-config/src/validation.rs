// netsight-config/src/validation.rs
//! Custom validation functions shared by the configuration sections.

use ipnetwork::IpNetwork;
use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidationError;

static INTERFACE_NAME: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:\-]*$").ok());

/// Interface names may be empty (auto-select) or follow the usual
/// Linux/BSD conventions (`eth0`, `en0`, `wlp3s0`, `eth0.100`, `br-lan`).
pub fn validate_interface(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Ok(());
    }
    let re = INTERFACE_NAME
        .as_ref()
        .ok_or_else(|| ValidationError::new("invalid_regex"))?;
    if name.len() <= 64 && re.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_interface"))
    }
}

/// Reject the unspecified network, which would classify everything as local.
pub fn validate_local_networks(networks: &[IpNetwork]) -> Result<(), ValidationError> {
    if networks.iter().any(|n| n.prefix() == 0) {
        return Err(ValidationError::new("catch_all_network"));
    }
    Ok(())
}

pub fn validate_log_format(format: &str) -> Result<(), ValidationError> {
    match format {
        "pretty" | "json" => Ok(()),
        _ => Err(ValidationError::new("invalid_log_format")),
    }
}
