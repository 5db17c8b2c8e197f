//! EspHttpServer 与 HandlerChain 的桥接

use std::mem::ManuallyDrop;
use std::net::{SocketAddr, TcpStream};
use std::os::fd::FromRawFd;
use std::sync::Arc;

use esp_idf_svc::{
    http::{
        server::{EspHttpConnection, EspHttpServer, Request},
        Method,
    },
    io::Write,
    sys,
};

use crate::portal::html;
use crate::server::{ApAddress, HandlerChain};

/// Methods the catch-all route answers. Connectivity checks are mostly GET, but
/// some clients probe with HEAD or POST.
const CATCH_ALL_METHODS: [Method; 3] = [Method::Get, Method::Head, Method::Post];

/// 注册门户页面，必须在 [`mount`] 之前调用，否则会被通配路由截走
pub fn serve_page(server: &mut EspHttpServer<'static>, path: &str, ssid: &str) -> anyhow::Result<()> {
    let page = html::render_index(ssid);
    server.fn_handler::<anyhow::Error, _>(path, Method::Get, move |req| {
        let mut resp = req.into_response(200, None, &[("Content-Type", "text/html; charset=utf-8")])?;
        resp.write_all(page.as_bytes())?;
        Ok(())
    })?;
    Ok(())
}

/// 把所有未匹配的请求交给 `chain`。
///
/// 服务器需要开启 `uri_match_wildcard`。每个请求按连接的本地地址打标签：
/// 等于 `ap` 的是 [`Interface::AccessPoint`](crate::Interface::AccessPoint)，
/// 其他的是 Station。
pub fn mount(
    server: &mut EspHttpServer<'static>,
    chain: Arc<HandlerChain>,
    ap: ApAddress,
) -> anyhow::Result<()> {
    for method in CATCH_ALL_METHODS {
        let chain = chain.clone();
        let ap = ap.clone();
        server.fn_handler::<anyhow::Error, _>("/*", method, move |mut req| {
            let request = to_request(&mut req, method, &ap)?;
            match chain.dispatch(&request) {
                Some(response) => {
                    let headers: Vec<(String, String)> = response
                        .headers()
                        .iter()
                        .filter_map(|(k, v)| Some((k.to_string(), v.to_str().ok()?.to_string())))
                        .collect();
                    let headers: Vec<(&str, &str)> = headers
                        .iter()
                        .map(|(k, v)| (k.as_str(), v.as_str()))
                        .collect();

                    let mut resp = req.into_response(response.status().as_u16(), None, &headers)?;
                    if method != Method::Head {
                        resp.write_all(response.body())?;
                    }
                }
                None => {
                    req.into_response(404, Some("Not Found"), &[])?;
                }
            }
            Ok(())
        })?;
    }
    Ok(())
}

fn to_request(
    req: &mut Request<&mut EspHttpConnection<'_>>,
    method: Method,
    ap: &ApAddress,
) -> anyhow::Result<http::Request<()>> {
    let method = match method {
        Method::Head => http::Method::HEAD,
        Method::Post => http::Method::POST,
        _ => http::Method::GET,
    };
    let mut builder = http::Request::builder().method(method).uri(req.uri());
    if let Some(host) = req.header("Host") {
        builder = builder.header(http::header::HOST, host);
    }
    let mut request = builder.body(())?;

    match local_addr(req).and_then(|addr| ap.classify(addr.ip())) {
        Some(interface) => {
            request.extensions_mut().insert(interface);
        }
        None => log::debug!("Request for {} left untagged", request.uri()),
    }
    Ok(request)
}

/// Local end of the connection `req` arrived on.
fn local_addr(req: &mut Request<&mut EspHttpConnection<'_>>) -> Option<SocketAddr> {
    let raw = req.connection().raw_connection().ok()?;
    let fd = unsafe { sys::httpd_req_to_sockfd(raw.handle()) };
    if fd < 0 {
        return None;
    }
    // socket 归 httpd 所有，不能在这里关闭
    let stream = ManuallyDrop::new(unsafe { TcpStream::from_raw_fd(fd) });
    stream.local_addr().ok()
}
