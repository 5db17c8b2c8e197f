//! 门户启动错误类型

/// Why a captive portal failed to start.
///
/// `AlreadyRunning` and `InvalidSsid` are caller mistakes; everything else is a
/// resource that could not be acquired. Either way nothing stays acquired.
#[derive(Debug)]
pub enum PortalError {
    /// `start` was called while a portal is already running
    AlreadyRunning,
    /// SSID empty or longer than the radio allows
    InvalidSsid(String),
    /// redirect URL cannot be sent as a `Location` header
    InvalidRedirect(String),
    /// access point failed to come up
    AccessPoint(anyhow::Error),
    /// access point came up but could not be moved to the fixed address
    Reconfigure(anyhow::Error),
    /// DNS responder could not bind its socket
    DnsBind(anyhow::Error),
    /// DNS poll task could not be launched
    TaskSpawn(anyhow::Error),
}

impl PortalError {
    /// Contract violations by the caller, as opposed to runtime failures.
    pub fn is_misuse(&self) -> bool {
        matches!(self, PortalError::AlreadyRunning | PortalError::InvalidSsid(_))
    }
}

impl std::fmt::Display for PortalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortalError::AlreadyRunning => write!(f, "captive portal is already running"),
            PortalError::InvalidSsid(ssid) => write!(f, "invalid SSID: {:?}", ssid),
            PortalError::InvalidRedirect(url) => write!(f, "invalid redirect target: {}", url),
            PortalError::AccessPoint(e) => write!(f, "access-point start failed: {:#}", e),
            PortalError::Reconfigure(e) => write!(f, "AP reconfiguration failed: {:#}", e),
            PortalError::DnsBind(e) => write!(f, "DNS bind failed: {:#}", e),
            PortalError::TaskSpawn(e) => write!(f, "task launch failed: {:#}", e),
        }
    }
}

impl std::error::Error for PortalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PortalError::AccessPoint(e)
            | PortalError::Reconfigure(e)
            | PortalError::DnsBind(e)
            | PortalError::TaskSpawn(e) => Some(&**e),
            _ => None,
        }
    }
}
