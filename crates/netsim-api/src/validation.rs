//! Request validation
//!
//! Field constraints the engine does not enforce itself: device name
//! length and interface address formats. Status strings and device kinds
//! are checked by the engine and the deserializer.

use std::net::Ipv4Addr;

use netsim_core::{DeviceSpec, DeviceUpdate, InterfaceSpec};

use crate::response::ApiError;

pub const MAX_NAME_LEN: usize = 50;

pub fn validate_name(name: &str) -> Result<(), ApiError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("device name must not be empty"));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::validation(format!(
            "device name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_ipv4(field: &str, value: &str) -> Result<Ipv4Addr, ApiError> {
    value
        .parse::<Ipv4Addr>()
        .map_err(|_| ApiError::validation(format!("{field} is not a valid IPv4 address: {value}")))
}

/// A mask must be an IPv4 address whose set bits are contiguous from the top
pub fn validate_subnet_mask(value: &str) -> Result<Ipv4Addr, ApiError> {
    let mask = validate_ipv4("subnetMask", value)?;
    let bits = u32::from(mask);
    if bits.leading_ones() + bits.trailing_zeros() != 32 {
        return Err(ApiError::validation(format!("subnetMask is not contiguous: {value}")));
    }
    Ok(mask)
}

fn validate_interfaces(interfaces: &[InterfaceSpec]) -> Result<(), ApiError> {
    for iface in interfaces {
        if iface.name.trim().is_empty() {
            return Err(ApiError::validation("interface name must not be empty"));
        }
        if let Some(ip) = &iface.ip_address {
            validate_ipv4("ipAddress", ip)?;
        }
        if let Some(mask) = &iface.subnet_mask {
            validate_subnet_mask(mask)?;
        }
    }
    Ok(())
}

pub fn validate_device_spec(spec: &DeviceSpec) -> Result<(), ApiError> {
    validate_name(&spec.name)?;
    validate_interfaces(&spec.interfaces)
}

pub fn validate_device_update(update: &DeviceUpdate) -> Result<(), ApiError> {
    if let Some(name) = &update.name {
        validate_name(name)?;
    }
    if let Some(interfaces) = &update.interfaces {
        validate_interfaces(interfaces)?;
    }
    Ok(())
}
