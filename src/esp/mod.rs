//! ESP-IDF 平台实现
//!
//! SoftAP、HTTP 服务器桥接和固定核心的任务创建。

mod server;
mod task;
mod wifi;

pub use self::server::{mount, serve_page};
pub use self::task::PinnedSpawner;
pub use self::wifi::EspSoftAp;
