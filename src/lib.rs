//! 极简 Captive Portal
//!
//! 连上 SoftAP 的客户端，所有域名都解析到设备本身，访问外部主机的 HTTP
//! 请求都被重定向到门户页面，Android、iOS 和 Windows 会因此弹出登录页。
//!
//! ```ignore
//! let chain = Arc::new(HandlerChain::new());
//! let mut portal = CaptivePortal::new(ap, UdpWildcardResponder::new(), StdSpawner, PortalOptions::default());
//! if portal.start("EchoKit-Setup", None, chain.clone(), "/portal") {
//!     // hand `chain` to the HTTP server
//! }
//! portal.stop(false);
//! ```

pub mod config;
pub mod dns;
pub mod error;
pub mod portal;
pub mod server;
pub mod task;
pub mod wifi;

#[cfg(feature = "esp")]
pub mod esp;

#[cfg(test)]
mod testing;

pub use config::{PortalConfig, PortalOptions};
pub use dns::{DnsResponder, UdpWildcardResponder};
pub use error::PortalError;
pub use portal::{CaptivePortal, PortalState};
pub use server::{
    ApAddress, HandlerChain, HttpServer, Interface, InterfaceFilter, RequestHandler,
};
pub use task::{StdSpawner, TaskSpawner, TaskSpec};
pub use wifi::AccessPoint;
