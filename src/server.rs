//! HTTP 处理器链
//!
//! HTTP 服务器本身不在这个 crate 里。它把每个请求头按到达的 [`Interface`]
//! 打上标签交给 [`HandlerChain::dispatch`]，再把返回的响应写回去。

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use http::header::HOST;
use http::{Request, Response};

/// Network interface a request arrived on, stored in the request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interface {
    AccessPoint,
    Station,
}

/// Current AP address, shared between the radio driver and the HTTP glue.
///
/// The server tells the interfaces apart by the local address a connection was
/// accepted on. Unset while the AP is down.
#[derive(Debug, Clone, Default)]
pub struct ApAddress(Arc<AtomicU32>);

impl ApAddress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, address: Ipv4Addr) {
        self.0.store(u32::from(address), Ordering::Release);
    }

    pub fn clear(&self) {
        self.0.store(0, Ordering::Release);
    }

    pub fn get(&self) -> Option<Ipv4Addr> {
        match self.0.load(Ordering::Acquire) {
            0 => None,
            bits => Some(Ipv4Addr::from(bits)),
        }
    }

    /// Interface of a connection whose local end is `local`. `None` while the
    /// AP address is unknown, which leaves the request untagged.
    pub fn classify(&self, local: IpAddr) -> Option<Interface> {
        let ap = self.get()?;
        let local = match local {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(v6) => v6.to_ipv4_mapped(),
        };
        if local == Some(ap) {
            Some(Interface::AccessPoint)
        } else {
            Some(Interface::Station)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceFilter {
    Any,
    Only(Interface),
}

impl InterfaceFilter {
    /// Untagged requests only pass [`InterfaceFilter::Any`].
    pub fn accepts<B>(&self, request: &Request<B>) -> bool {
        match self {
            InterfaceFilter::Any => true,
            InterfaceFilter::Only(iface) => request.extensions().get::<Interface>() == Some(iface),
        }
    }
}

/// A predicate + action pair.
pub trait RequestHandler: Send + Sync {
    fn can_handle(&self, request: &Request<()>) -> bool;

    fn handle_request(&self, request: &Request<()>) -> Response<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

pub trait HttpServer: Send + Sync {
    fn add_handler(&self, handler: Arc<dyn RequestHandler>, filter: InterfaceFilter) -> HandlerId;

    /// Gives the handler back, `None` if it was not installed.
    fn remove_handler(&self, id: HandlerId) -> Option<Arc<dyn RequestHandler>>;
}

struct Installed {
    id: HandlerId,
    filter: InterfaceFilter,
    handler: Arc<dyn RequestHandler>,
}

/// Ordered handler list. The first handler whose filter and `can_handle`
/// both accept a request serves it.
pub struct HandlerChain {
    handlers: RwLock<Vec<Installed>>,
    next_id: AtomicU64,
}

impl HandlerChain {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `None` when no handler wants the request; the server falls back to its
    /// own routing then.
    pub fn dispatch(&self, request: &Request<()>) -> Option<Response<Vec<u8>>> {
        let handler = {
            let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
            handlers
                .iter()
                .find(|h| h.filter.accepts(request) && h.handler.can_handle(request))
                .map(|h| h.handler.clone())
        };
        handler.map(|h| h.handle_request(request))
    }
}

impl Default for HandlerChain {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpServer for HandlerChain {
    fn add_handler(&self, handler: Arc<dyn RequestHandler>, filter: InterfaceFilter) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Installed {
                id,
                filter,
                handler,
            });
        id
    }

    fn remove_handler(&self, id: HandlerId) -> Option<Arc<dyn RequestHandler>> {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let idx = handlers.iter().position(|h| h.id == id)?;
        Some(handlers.remove(idx).handler)
    }
}

/// Host the client asked for: `Host` header, else the authority of an
/// absolute-form URI, else empty.
pub fn request_host<B>(request: &Request<B>) -> &str {
    request
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().host())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    struct Fixed {
        prefix: &'static str,
        status: StatusCode,
    }

    impl RequestHandler for Fixed {
        fn can_handle(&self, request: &Request<()>) -> bool {
            request.uri().path().starts_with(self.prefix)
        }

        fn handle_request(&self, _request: &Request<()>) -> Response<Vec<u8>> {
            let mut resp = Response::new(Vec::new());
            *resp.status_mut() = self.status;
            resp
        }
    }

    fn request(path: &str, iface: Option<Interface>) -> Request<()> {
        let mut req = Request::builder()
            .uri(path)
            .header(HOST, "example.com")
            .body(())
            .unwrap();
        if let Some(iface) = iface {
            req.extensions_mut().insert(iface);
        }
        req
    }

    #[test]
    fn test_first_matching_handler_wins() {
        let chain = HandlerChain::new();
        chain.add_handler(
            Arc::new(Fixed { prefix: "/a", status: StatusCode::OK }),
            InterfaceFilter::Any,
        );
        chain.add_handler(
            Arc::new(Fixed { prefix: "/", status: StatusCode::NO_CONTENT }),
            InterfaceFilter::Any,
        );

        let resp = chain.dispatch(&request("/a/b", None)).unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = chain.dispatch(&request("/b", None)).unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_interface_filter() {
        let chain = HandlerChain::new();
        chain.add_handler(
            Arc::new(Fixed { prefix: "/", status: StatusCode::FOUND }),
            InterfaceFilter::Only(Interface::AccessPoint),
        );

        assert!(chain.dispatch(&request("/", Some(Interface::AccessPoint))).is_some());
        assert!(chain.dispatch(&request("/", Some(Interface::Station))).is_none());
        assert!(chain.dispatch(&request("/", None)).is_none());
    }

    #[test]
    fn test_ap_address_classify() {
        let ap = ApAddress::new();
        assert_eq!(ap.classify(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))), None);

        ap.set(Ipv4Addr::new(8, 8, 8, 8));
        let shared = ap.clone();
        assert_eq!(shared.get(), Some(Ipv4Addr::new(8, 8, 8, 8)));
        assert_eq!(
            shared.classify(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))),
            Some(Interface::AccessPoint)
        );
        assert_eq!(
            shared.classify("::ffff:8.8.8.8".parse().unwrap()),
            Some(Interface::AccessPoint)
        );
        assert_eq!(
            shared.classify(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 23))),
            Some(Interface::Station)
        );

        ap.clear();
        assert_eq!(shared.get(), None);
    }

    #[test]
    fn test_station_side_request_is_not_captured() {
        let ap = ApAddress::new();
        ap.set(Ipv4Addr::new(8, 8, 8, 8));

        let chain = HandlerChain::new();
        chain.add_handler(
            Arc::new(Fixed { prefix: "/", status: StatusCode::FOUND }),
            InterfaceFilter::Only(Interface::AccessPoint),
        );

        // device also joined a LAN as a station at 192.168.1.23
        let iface = ap.classify(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 23)));
        assert!(chain.dispatch(&request("/", iface)).is_none());

        let iface = ap.classify(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)));
        let resp = chain.dispatch(&request("/", iface)).unwrap();
        assert_eq!(resp.status(), StatusCode::FOUND);
    }

    #[test]
    fn test_remove_handler() {
        let chain = HandlerChain::new();
        let id = chain.add_handler(
            Arc::new(Fixed { prefix: "/", status: StatusCode::OK }),
            InterfaceFilter::Any,
        );
        assert_eq!(chain.len(), 1);

        assert!(chain.remove_handler(id).is_some());
        assert!(chain.is_empty());
        assert!(chain.remove_handler(id).is_none());
        assert!(chain.dispatch(&request("/", None)).is_none());
    }

    #[test]
    fn test_request_host() {
        let req = request("/", None);
        assert_eq!(request_host(&req), "example.com");

        let req = Request::builder()
            .uri("http://captive.apple.com/hotspot-detect.html")
            .body(())
            .unwrap();
        assert_eq!(request_host(&req), "captive.apple.com");

        let req = Request::builder().uri("/").body(()).unwrap();
        assert_eq!(request_host(&req), "");
    }
}
