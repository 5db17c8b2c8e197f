//! SoftAP 控制接口和 802.11 参数限制

use std::net::Ipv4Addr;

/// Address the AP is moved to unless the static-IP quirk is disabled.
///
/// Some handsets resolve their connectivity-check hosts through a hardcoded
/// public resolver and never ask the DHCP-announced one; owning that address
/// puts our DNS responder in their path.
pub const LEGACY_AP_ADDRESS: Ipv4Addr = Ipv4Addr::new(8, 8, 8, 8);
pub const LEGACY_AP_NETMASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);

pub const MAX_SSID_LEN: usize = 32;
pub const MIN_PASSPHRASE_LEN: usize = 8;
pub const MAX_PASSPHRASE_LEN: usize = 63;

/// SoftAP control used by the portal.
pub trait AccessPoint: Send {
    /// Start the AP. `None` means an open network.
    fn bring_up(&mut self, ssid: &str, passphrase: Option<&str>) -> anyhow::Result<()>;

    /// Move the AP interface to a fixed address (gateway == address).
    fn set_address(&mut self, address: Ipv4Addr, netmask: Ipv4Addr) -> anyhow::Result<()>;

    fn tear_down(&mut self);

    /// Address clients see the AP at.
    fn own_address(&self) -> Ipv4Addr;
}

/// Radio steps needed to move a running AP onto a router interface.
pub trait ApRestart {
    fn stop_ap(&mut self) -> anyhow::Result<()>;

    /// Replace the AP interface with one serving DHCP on `address/prefix`.
    fn attach_router(&mut self, address: Ipv4Addr, prefix: u8) -> anyhow::Result<()>;

    /// Start the AP again and wait for its interface.
    fn start_ap(&mut self) -> anyhow::Result<()>;
}

/// Move a running AP to `address`. Returns the prefix length used.
///
/// The new interface is attached while the radio is stopped. An interface
/// attached to a running AP misses the AP start event and never starts its
/// DHCP server.
pub fn readdress<R: ApRestart + ?Sized>(
    radio: &mut R,
    address: Ipv4Addr,
    netmask: Ipv4Addr,
) -> anyhow::Result<u8> {
    let prefix = prefix_len(netmask)
        .ok_or_else(|| anyhow::anyhow!("netmask {} is not contiguous", netmask))?;
    radio.stop_ap()?;
    radio.attach_router(address, prefix)?;
    radio.start_ap()?;
    Ok(prefix)
}

/// Check an SSID against the 802.11 limits.
pub fn ssid_is_valid(ssid: &str) -> bool {
    !ssid.is_empty() && ssid.len() <= MAX_SSID_LEN
}

/// Empty passphrases mean an open network and are always valid.
pub fn passphrase_is_valid(passphrase: &str) -> bool {
    passphrase.is_empty()
        || (MIN_PASSPHRASE_LEN..=MAX_PASSPHRASE_LEN).contains(&passphrase.len())
}

/// Prefix length of a contiguous netmask, `None` for masks like `255.0.255.0`.
pub fn prefix_len(netmask: Ipv4Addr) -> Option<u8> {
    let bits = u32::from(netmask);
    let ones = bits.leading_ones();
    if bits.checked_shl(ones).unwrap_or(0) == 0 {
        Some(ones as u8)
    } else {
        None
    }
}
