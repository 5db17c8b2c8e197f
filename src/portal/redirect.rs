//! 把外部主机的请求 302 重定向到门户页面

use std::net::Ipv4Addr;

use http::header::{HeaderValue, LOCATION};
use http::{Request, Response, StatusCode};

use crate::error::PortalError;
use crate::server::{request_host, RequestHandler};

/// Absolute URL every captured request is sent to: `http://<ap ip><path>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    url: String,
    location: HeaderValue,
}

impl RedirectTarget {
    pub fn new(ap_ip: Ipv4Addr, path: &str) -> Result<Self, PortalError> {
        let url = if path.starts_with('/') {
            format!("http://{}{}", ap_ip, path)
        } else {
            format!("http://{}/{}", ap_ip, path)
        };
        let location =
            HeaderValue::from_str(&url).map_err(|_| PortalError::InvalidRedirect(url.clone()))?;
        Ok(Self { url, location })
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }
}

/// Catch-all handler: anything not addressed to the AP itself is a client
/// probing the outside world and gets redirected to the portal page.
pub struct RedirectHandler {
    ap_host: String,
    target: RedirectTarget,
}

impl RedirectHandler {
    pub fn new(ap_ip: Ipv4Addr, target: RedirectTarget) -> Self {
        Self {
            ap_host: ap_ip.to_string(),
            target,
        }
    }

    pub fn target(&self) -> &RedirectTarget {
        &self.target
    }
}

impl RequestHandler for RedirectHandler {
    fn can_handle(&self, request: &Request<()>) -> bool {
        request_host(request) != self.ap_host
    }

    fn handle_request(&self, request: &Request<()>) -> Response<Vec<u8>> {
        log::debug!(
            "Captive handler triggered. Requested {}{} -> redirecting to {}",
            request_host(request),
            request.uri().path(),
            self.target.url
        );

        let mut resp = Response::new(Vec::new());
        *resp.status_mut() = StatusCode::FOUND;
        resp.headers_mut().insert(LOCATION, self.target.location.clone());
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::HOST;

    const AP: Ipv4Addr = Ipv4Addr::new(8, 8, 8, 8);

    fn handler(path: &str) -> RedirectHandler {
        RedirectHandler::new(AP, RedirectTarget::new(AP, path).unwrap())
    }

    fn request(host: Option<&str>, uri: &str) -> Request<()> {
        let mut builder = Request::builder().uri(uri);
        if let Some(host) = host {
            builder = builder.header(HOST, host);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_target_url() {
        assert_eq!(RedirectTarget::new(AP, "/portal").unwrap().as_str(), "http://8.8.8.8/portal");
        assert_eq!(RedirectTarget::new(AP, "portal").unwrap().as_str(), "http://8.8.8.8/portal");
        assert_eq!(RedirectTarget::new(AP, "/").unwrap().as_str(), "http://8.8.8.8/");
        assert!(matches!(
            RedirectTarget::new(AP, "/bad\npath"),
            Err(PortalError::InvalidRedirect(_))
        ));
    }

    #[test]
    fn test_requests_to_self_fall_through() {
        let h = handler("/portal");
        assert!(!h.can_handle(&request(Some("8.8.8.8"), "/portal")));
        assert!(!h.can_handle(&request(Some("8.8.8.8"), "/api/status")));
    }

    #[test]
    fn test_foreign_hosts_are_captured() {
        let h = handler("/portal");
        assert!(h.can_handle(&request(Some("connectivitycheck.gstatic.com"), "/generate_204")));
        assert!(h.can_handle(&request(Some("captive.apple.com"), "/hotspot-detect.html")));
        assert!(h.can_handle(&request(Some("192.168.4.1"), "/")));
        assert!(h.can_handle(&request(Some(""), "/")));
        assert!(h.can_handle(&request(None, "/")));
        assert!(h.can_handle(&request(Some("8.8.8.8.evil"), "/")));
    }

    #[test]
    fn test_redirect_ignores_requested_host_and_path() {
        let h = handler("/portal");
        for (host, uri) in [
            ("connectivitycheck.gstatic.com", "/generate_204"),
            ("www.msftconnecttest.com", "/connecttest.txt?x=1"),
            ("captive.apple.com", "/"),
        ] {
            let resp = h.handle_request(&request(Some(host), uri));
            assert_eq!(resp.status(), StatusCode::FOUND);
            assert_eq!(resp.headers()[LOCATION], "http://8.8.8.8/portal");
            assert!(resp.body().is_empty());
        }
    }
}
