//! Handshake message model exchanged between the parent and the child.
//!
//! Field names on the wire follow the parent's encoding (`Stage`,
//! `StateDir`, `Network.IP`, ...). Everything except `Stage` may be absent:
//! a stage-0 message usually carries nothing else.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ChildError, Result};

/// Driver-specific key/value payload passed through without interpretation.
pub type Opaque = BTreeMap<String, String>;

/// Message sent by the parent over the handshake descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HandshakeMessage {
    /// Raw stage number. Use [`HandshakeMessage::stage`] to classify it.
    pub stage: i64,
    /// Directory owned by the parent for runtime state.
    #[serde(default)]
    pub state_dir: PathBuf,
    /// Network namespace configuration.
    #[serde(default)]
    pub network: NetworkConfig,
    /// Port driver payload.
    #[serde(default)]
    pub port: PortConfig,
}

impl HandshakeMessage {
    /// Classifies the raw stage number.
    ///
    /// # Errors
    ///
    /// Returns [`ChildError::Protocol`] for any stage other than 0 or 1.
    pub fn stage(&self) -> Result<Stage> {
        Stage::try_from(self.stage)
    }
}

/// The two handshake stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// UID/GID maps are written but the process has not yet picked up its
    /// capabilities; it must re-execute itself.
    Bootstrap,
    /// The message is authoritative and setup may proceed.
    Configured,
}

impl TryFrom<i64> for Stage {
    type Error = ChildError;

    fn try_from(raw: i64) -> Result<Self> {
        match raw {
            0 => Ok(Self::Bootstrap),
            1 => Ok(Self::Configured),
            other => Err(ChildError::protocol(format!(
                "expected stage 1, got stage {other}"
            ))),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bootstrap => write!(f, "bootstrap"),
            Self::Configured => write!(f, "configured"),
        }
    }
}

/// Addressing for the device created by the network driver.
///
/// Only meaningful when a network driver is configured; host-network mode
/// never reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Address assigned to the device.
    #[serde(rename = "IP", default)]
    pub ip: String,
    /// Prefix length of `ip`.
    #[serde(rename = "Netmask", default)]
    pub netmask: u8,
    /// Default gateway.
    #[serde(rename = "Gateway", default)]
    pub gateway: String,
    /// Device MTU.
    #[serde(rename = "MTU", default)]
    pub mtu: u32,
    /// Nameservers written to `resolv.conf`.
    #[serde(rename = "DNS", default)]
    pub dns: Vec<String>,
    /// Network driver payload.
    #[serde(rename = "Opaque", default)]
    pub opaque: Opaque,
}

impl NetworkConfig {
    /// Checks that every field is well-formed for device configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ChildError::Config`] if an address does not parse, the
    /// gateway family differs from the address family, the prefix length
    /// exceeds the family's width, or the MTU is zero.
    pub fn validate(&self) -> Result<()> {
        let ip = parse_addr("IP", &self.ip)?;
        let gateway = parse_addr("gateway", &self.gateway)?;
        if ip.is_ipv4() != gateway.is_ipv4() {
            return Err(ChildError::config(format!(
                "gateway {gateway} is not in the address family of {ip}"
            )));
        }
        let width = if ip.is_ipv4() { 32 } else { 128 };
        if self.netmask > width {
            return Err(ChildError::config(format!(
                "prefix length {} exceeds {width}",
                self.netmask
            )));
        }
        if self.mtu == 0 {
            return Err(ChildError::config("MTU must be positive"));
        }
        for server in &self.dns {
            let _ = parse_addr("nameserver", server)?;
        }
        Ok(())
    }

    /// Returns `ip/netmask` as accepted by `ip addr add`.
    #[must_use]
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.ip, self.netmask)
    }
}

fn parse_addr(what: &str, value: &str) -> Result<IpAddr> {
    value.parse().map_err(|e| ChildError::Config {
        message: format!("invalid {what} address {value:?}"),
        source: Some(Box::new(e)),
    })
}

/// Payload for the port driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    /// Driver-specific settings.
    #[serde(rename = "Opaque", default)]
    pub opaque: Opaque,
}
