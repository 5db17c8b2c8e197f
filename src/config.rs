//! 门户配置
//!
//! `PortalOptions` 是编译期 / 配置期开关，`PortalConfig` 是每次启动的参数。
//! 两者都可以从 JSON 读取（固件把它们存在 NVS 里）。

use std::net::Ipv4Addr;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::dns::DEFAULT_TTL;
use crate::task::TaskSpec;
use crate::wifi::{self, LEGACY_AP_ADDRESS, LEGACY_AP_NETMASK};

const DNS_PORT: u16 = 53;
const MIN_STACK_SIZE: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalOptions {
    /// Move the AP to `ap_address` after bring-up.
    pub legacy_static_ip: bool,
    pub ap_address: Ipv4Addr,
    pub ap_netmask: Ipv4Addr,
    pub dns_port: u16,
    /// seconds
    pub dns_ttl: u32,
    pub poll_interval_ms: u64,
    pub task: TaskSpec,
}

impl Default for PortalOptions {
    fn default() -> Self {
        Self {
            legacy_static_ip: !cfg!(feature = "no-static-ip-quirk"),
            ap_address: LEGACY_AP_ADDRESS,
            ap_netmask: LEGACY_AP_NETMASK,
            dns_port: DNS_PORT,
            dns_ttl: DEFAULT_TTL,
            poll_interval_ms: 1,
            task: TaskSpec::default(),
        }
    }
}

impl PortalOptions {
    /// Missing fields keep their defaults.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let options: Self = serde_json::from_str(json).context("invalid portal options")?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.legacy_static_ip {
            if self.ap_address.is_unspecified() || self.ap_address.is_broadcast() {
                bail!("AP address {} is not usable", self.ap_address);
            }
            if wifi::prefix_len(self.ap_netmask).is_none() {
                bail!("netmask {} is not contiguous", self.ap_netmask);
            }
        }
        if self.task.stack_size < MIN_STACK_SIZE {
            bail!(
                "DNS task stack of {}B is below the {}B minimum",
                self.task.stack_size,
                MIN_STACK_SIZE
            );
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalConfig {
    pub ssid: String,
    /// empty for an open network
    #[serde(default)]
    pub pass: String,
    #[serde(default = "default_redirect_path")]
    pub redirect_path: String,
}

fn default_redirect_path() -> String {
    "/".to_string()
}

impl PortalConfig {
    pub fn new(ssid: &str, pass: &str, redirect_path: &str) -> Self {
        Self {
            ssid: ssid.to_string(),
            pass: pass.to_string(),
            redirect_path: redirect_path.to_string(),
        }
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json).context("invalid portal config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !wifi::ssid_is_valid(&self.ssid) {
            bail!(
                "SSID must be 1..={} bytes, got {}",
                wifi::MAX_SSID_LEN,
                self.ssid.len()
            );
        }
        if !wifi::passphrase_is_valid(&self.pass) {
            bail!(
                "passphrase must be empty or {}..={} bytes",
                wifi::MIN_PASSPHRASE_LEN,
                wifi::MAX_PASSPHRASE_LEN
            );
        }
        if !self.redirect_path.starts_with('/') {
            bail!("redirect path must start with '/', got {:?}", self.redirect_path);
        }
        Ok(())
    }

    pub fn passphrase(&self) -> Option<&str> {
        if self.pass.is_empty() {
            None
        } else {
            Some(&self.pass)
        }
    }
}
