//! SoftAP 管理

use std::net::Ipv4Addr;

use anyhow::{anyhow, bail};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::modem::Modem,
    ipv4::{self, Mask, Subnet},
    netif::{EspNetif, NetifConfiguration},
    nvs::EspDefaultNvsPartition,
    wifi::{
        AccessPointConfiguration, AuthMethod, BlockingWifi, Configuration as WifiConfig, EspWifi,
    },
};

use crate::server::ApAddress;
use crate::wifi::{self, AccessPoint, ApRestart};

/// ESP-IDF 默认的 AP 地址，没有改成固定 IP 时客户端看到的就是它
const DEFAULT_AP_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);

pub struct EspSoftAp {
    wifi: BlockingWifi<EspWifi<'static>>,
    address: Ipv4Addr,
    shared: ApAddress,
    channel: u8,
    max_connections: u16,
}

impl EspSoftAp {
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
    ) -> anyhow::Result<Self> {
        let wifi = BlockingWifi::wrap(EspWifi::new(modem, sysloop.clone(), nvs)?, sysloop)?;

        Ok(Self {
            wifi,
            address: DEFAULT_AP_IP,
            shared: ApAddress::new(),
            channel: 1,
            max_connections: 4,
        })
    }

    /// Live AP address for [`crate::esp::mount`].
    pub fn ap_address(&self) -> ApAddress {
        self.shared.clone()
    }

    fn read_address(&self) -> anyhow::Result<Ipv4Addr> {
        Ok(self.wifi.wifi().ap_netif().get_ip_info()?.ip)
    }
}

impl ApRestart for EspSoftAp {
    fn stop_ap(&mut self) -> anyhow::Result<()> {
        self.wifi.stop()?;
        Ok(())
    }

    fn attach_router(&mut self, address: Ipv4Addr, prefix: u8) -> anyhow::Result<()> {
        // 路由模式的 netif，网关和 DNS 都指向自己
        let ap_netif_config = NetifConfiguration {
            ip_configuration: Some(ipv4::Configuration::Router(ipv4::RouterConfiguration {
                subnet: Subnet {
                    gateway: address,
                    mask: Mask(prefix),
                },
                dhcp_enabled: true,
                dns: Some(address),
                secondary_dns: None,
            })),
            ..NetifConfiguration::wifi_default_router()
        };
        let ap_netif = EspNetif::new_with_conf(&ap_netif_config)?;
        self.wifi.wifi_mut().swap_netif_ap(ap_netif)?;
        Ok(())
    }

    fn start_ap(&mut self) -> anyhow::Result<()> {
        self.wifi.start()?;
        self.wifi.wait_netif_up()?;
        Ok(())
    }
}

impl AccessPoint for EspSoftAp {
    fn bring_up(&mut self, ssid: &str, passphrase: Option<&str>) -> anyhow::Result<()> {
        let pass = passphrase.unwrap_or_default();
        if !wifi::passphrase_is_valid(pass) {
            bail!(
                "passphrase must be {}..={} characters",
                wifi::MIN_PASSPHRASE_LEN,
                wifi::MAX_PASSPHRASE_LEN
            );
        }

        let ap_config = AccessPointConfiguration {
            ssid: ssid
                .try_into()
                .map_err(|_| anyhow!("SSID too long: {}", ssid))?,
            ssid_hidden: false,
            channel: self.channel,
            password: pass
                .try_into()
                .map_err(|_| anyhow!("passphrase too long"))?,
            auth_method: if pass.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            max_connections: self.max_connections,
            ..Default::default()
        };

        self.wifi
            .set_configuration(&WifiConfig::AccessPoint(ap_config))?;
        self.wifi.start()?;
        self.wifi.wait_netif_up()?;

        self.address = self.read_address().unwrap_or(DEFAULT_AP_IP);
        self.shared.set(self.address);
        log::info!("SoftAP started: {} on {}", ssid, self.address);
        Ok(())
    }

    fn set_address(&mut self, address: Ipv4Addr, netmask: Ipv4Addr) -> anyhow::Result<()> {
        let prefix = wifi::readdress(self, address, netmask)?;
        self.address = address;
        self.shared.set(address);
        log::info!("SoftAP address set to {}/{}", address, prefix);
        Ok(())
    }

    fn tear_down(&mut self) {
        if let Err(e) = self.wifi.stop() {
            log::error!("Failed to stop SoftAP: {:?}", e);
        }
        self.address = DEFAULT_AP_IP;
        self.shared.clear();
    }

    fn own_address(&self) -> Ipv4Addr {
        self.address
    }
}
