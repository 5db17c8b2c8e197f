//! 门户生命周期控制
//!
//! 启动顺序：SoftAP -> (可选) 固定 IP -> DNS -> 重定向处理器 -> DNS 轮询任务。
//! 任何一步失败都会按相反顺序回滚，不会留下半启动的门户。

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::{PortalConfig, PortalOptions};
use crate::dns::DnsResponder;
use crate::error::PortalError;
use crate::server::{HandlerId, HttpServer, Interface, InterfaceFilter};
use crate::task::TaskSpawner;
use crate::wifi::{self, AccessPoint};

use super::dns_task::DnsPollTask;
use super::redirect::{RedirectHandler, RedirectTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalState {
    Stopped,
    /// only observable while `start` runs
    Starting,
    Running,
}

/// Everything acquired by one successful `start`.
struct Episode {
    server: Arc<dyn HttpServer>,
    handler_id: HandlerId,
    handler: Arc<RedirectHandler>,
    task: DnsPollTask,
}

/// Owns the AP, the DNS responder and the poll task of at most one running
/// portal.
///
/// Lifecycle calls take `&mut self`; share the portal behind a `Mutex` if more
/// than one thread needs to start or stop it.
pub struct CaptivePortal<W, D, T>
where
    W: AccessPoint,
    D: DnsResponder,
    T: TaskSpawner,
{
    wifi: W,
    dns: Arc<Mutex<D>>,
    spawner: T,
    options: PortalOptions,
    state: PortalState,
    episode: Option<Episode>,
}

impl<W, D, T> CaptivePortal<W, D, T>
where
    W: AccessPoint,
    D: DnsResponder,
    T: TaskSpawner,
{
    pub fn new(wifi: W, dns: D, spawner: T, options: PortalOptions) -> Self {
        Self {
            wifi,
            dns: Arc::new(Mutex::new(dns)),
            spawner,
            options,
            state: PortalState::Stopped,
            episode: None,
        }
    }

    pub fn state(&self) -> PortalState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PortalState::Running
    }

    pub fn options(&self) -> &PortalOptions {
        &self.options
    }

    /// Where captured requests are sent while running.
    pub fn redirect_url(&self) -> Option<&str> {
        self.episode
            .as_ref()
            .map(|episode| episode.handler.target().as_str())
    }

    pub fn wifi(&self) -> &W {
        &self.wifi
    }

    /// Configure and start the AP with the captive portal active.
    ///
    /// Returns `false` if any step failed; the log says which one. Nothing is
    /// left acquired in that case.
    pub fn start(
        &mut self,
        ssid: &str,
        passphrase: Option<&str>,
        server: Arc<dyn HttpServer>,
        redirect_path: &str,
    ) -> bool {
        self.try_start(ssid, passphrase, server, redirect_path).is_ok()
    }

    pub fn start_with(&mut self, config: &PortalConfig, server: Arc<dyn HttpServer>) -> bool {
        self.start(
            &config.ssid,
            config.passphrase(),
            server,
            &config.redirect_path,
        )
    }

    pub fn try_start(
        &mut self,
        ssid: &str,
        passphrase: Option<&str>,
        server: Arc<dyn HttpServer>,
        redirect_path: &str,
    ) -> Result<(), PortalError> {
        if self.state != PortalState::Stopped {
            log::error!("Captive portal start rejected: already running");
            return Err(PortalError::AlreadyRunning);
        }
        if !wifi::ssid_is_valid(ssid) {
            log::error!("Captive portal start rejected: invalid SSID {:?}", ssid);
            return Err(PortalError::InvalidSsid(ssid.to_string()));
        }

        self.state = PortalState::Starting;
        match self.acquire(ssid, passphrase, server, redirect_path) {
            Ok(episode) => {
                log::info!(
                    "Captive portal started. Redirecting all requests to {}",
                    episode.handler.target().as_str()
                );
                self.episode = Some(episode);
                self.state = PortalState::Running;
                Ok(())
            }
            Err(e) => {
                log::error!("Captive portal failed to start: {}", e);
                self.state = PortalState::Stopped;
                Err(e)
            }
        }
    }

    fn acquire(
        &mut self,
        ssid: &str,
        passphrase: Option<&str>,
        server: Arc<dyn HttpServer>,
        redirect_path: &str,
    ) -> Result<Episode, PortalError> {
        let passphrase = passphrase.filter(|p| !p.is_empty());
        self.wifi
            .bring_up(ssid, passphrase)
            .map_err(PortalError::AccessPoint)?;

        if self.options.legacy_static_ip {
            if let Err(e) = self
                .wifi
                .set_address(self.options.ap_address, self.options.ap_netmask)
            {
                self.wifi.tear_down();
                return Err(PortalError::Reconfigure(e));
            }
        }

        let ap_ip = self.wifi.own_address();

        let bound = self.dns().bind(self.options.dns_port, ap_ip);
        if let Err(e) = bound {
            self.wifi.tear_down();
            return Err(PortalError::DnsBind(e));
        }

        let target = match RedirectTarget::new(ap_ip, redirect_path) {
            Ok(target) => target,
            Err(e) => {
                self.dns().unbind();
                self.wifi.tear_down();
                return Err(e);
            }
        };
        let handler = Arc::new(RedirectHandler::new(ap_ip, target));
        // only for requests that came in through the AP
        let handler_id = server.add_handler(
            handler.clone(),
            InterfaceFilter::Only(Interface::AccessPoint),
        );

        let task = match DnsPollTask::spawn(
            &self.spawner,
            &self.options.task,
            self.dns.clone(),
            self.options.poll_interval(),
        ) {
            Ok(task) => task,
            Err(e) => {
                server.remove_handler(handler_id);
                drop(handler);
                self.dns().unbind();
                self.wifi.tear_down();
                return Err(PortalError::TaskSpawn(e));
            }
        };

        Ok(Episode {
            server,
            handler_id,
            handler,
            task,
        })
    }

    /// Stop a running portal. `keep_ap_running` leaves clients associated
    /// while the DNS responder and redirect go away.
    ///
    /// No-op when not running.
    pub fn stop(&mut self, keep_ap_running: bool) {
        let Some(episode) = self.episode.take() else {
            return;
        };

        // wait for the task before touching anything it uses
        episode.task.stop();

        if episode.server.remove_handler(episode.handler_id).is_none() {
            log::warn!("Captive portal handler was already removed from the server");
        }
        drop(episode.handler);

        self.dns().unbind();

        if !keep_ap_running {
            self.wifi.tear_down();
        }

        self.state = PortalState::Stopped;
        log::info!("Captive portal stopped (AP kept: {})", keep_ap_running);
    }

    fn dns(&self) -> MutexGuard<'_, D> {
        self.dns.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W, D, T> Drop for CaptivePortal<W, D, T>
where
    W: AccessPoint,
    D: DnsResponder,
    T: TaskSpawner,
{
    fn drop(&mut self) {
        self.stop(false);
    }
}
