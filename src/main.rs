use std::sync::Arc;

use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    http::server::{Configuration, EspHttpServer},
    nvs::{EspDefaultNvs, EspDefaultNvsPartition},
};

use captive_portal::{
    esp::{self, EspSoftAp, PinnedSpawner},
    CaptivePortal, HandlerChain, PortalConfig, PortalOptions, UdpWildcardResponder,
};

static DEFAULT_SSID: Option<&str> = std::option_env!("PORTAL_SSID");
static DEFAULT_PASS: Option<&str> = std::option_env!("PORTAL_PASS");

const REDIRECT_PATH: &str = "/portal";

fn read_json(nvs: &EspDefaultNvs, key: &str) -> Option<String> {
    let mut buf = [0; 512];
    nvs.get_str(key, &mut buf)
        .map_err(|e| log::error!("Failed to get {}: {:?}", key, e))
        .ok()
        .flatten()
        .map(str::to_string)
}

fn load_options(nvs: &EspDefaultNvs) -> PortalOptions {
    read_json(nvs, "options")
        .and_then(|json| {
            PortalOptions::from_json(&json)
                .map_err(|e| log::error!("Ignoring stored options: {:#}", e))
                .ok()
        })
        .unwrap_or_default()
}

fn load_config(nvs: &EspDefaultNvs) -> PortalConfig {
    read_json(nvs, "config")
        .and_then(|json| {
            PortalConfig::from_json(&json)
                .map_err(|e| log::error!("Ignoring stored config: {:#}", e))
                .ok()
        })
        .unwrap_or_else(|| {
            PortalConfig::new(
                DEFAULT_SSID.unwrap_or("EchoKit-Setup"),
                DEFAULT_PASS.unwrap_or_default(),
                REDIRECT_PATH,
            )
        })
}

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    let peripherals = esp_idf_svc::hal::prelude::Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let partition = EspDefaultNvsPartition::take()?;
    let nvs = EspDefaultNvs::new(partition.clone(), "portal", true)?;

    let options = load_options(&nvs);
    let config = load_config(&nvs);
    log::info!("Portal options: {:?}", options);
    log::info!("SSID: {:?}", config.ssid);

    let ap = EspSoftAp::new(peripherals.modem, sysloop, Some(partition))?;

    let chain = Arc::new(HandlerChain::new());
    let mut server = EspHttpServer::new(&Configuration {
        stack_size: 8192,
        uri_match_wildcard: true,
        ..Default::default()
    })?;
    esp::serve_page(&mut server, &config.redirect_path, &config.ssid)?;
    esp::mount(&mut server, chain.clone(), ap.ap_address())?;
    log::info!("HTTP server started");

    let dns = UdpWildcardResponder::with_ttl(options.dns_ttl);
    let mut portal = CaptivePortal::new(ap, dns, PinnedSpawner, options);
    if !portal.start_with(&config, chain) {
        log::error!("Captive portal failed to start, restarting");
        std::thread::sleep(std::time::Duration::from_secs(5));
        unsafe { esp_idf_svc::sys::esp_restart() }
    }

    if let Some(url) = portal.redirect_url() {
        log::info!("Captive portal running, portal page at {}", url);
    }

    loop {
        std::thread::sleep(std::time::Duration::from_secs(60));
    }
}
