//! Captive Portal 模块
//!
//! SoftAP + 通配 DNS + HTTP 重定向，让手机连上热点后自动弹出门户页面。

mod controller;
mod dns_task;
pub mod html;
mod redirect;

pub use controller::{CaptivePortal, PortalState};
pub use dns_task::DnsPollTask;
pub use redirect::{RedirectHandler, RedirectTarget};
