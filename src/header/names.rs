//! Well-known header names used by the request and response pipeline.

pub const ACCEPT: &str = "Accept";
pub const ACCEPT_ENCODING: &str = "Accept-Encoding";
pub const AUTHORIZATION: &str = "Authorization";
pub const CACHE_CONTROL: &str = "Cache-Control";
pub const CONNECTION: &str = "Connection";
pub const CONTENT_DISPOSITION: &str = "Content-Disposition";
pub const CONTENT_ENCODING: &str = "Content-Encoding";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const COOKIE: &str = "Cookie";
pub const HOST: &str = "Host";
pub const LOCATION: &str = "Location";
pub const PRAGMA: &str = "Pragma";
pub const PROXY_AUTHORIZATION: &str = "Proxy-Authorization";
pub const SET_COOKIE: &str = "Set-Cookie";
pub const TRANSFER_ENCODING: &str = "Transfer-Encoding";
pub const USER_AGENT: &str = "User-Agent";
pub const X_HTTP_METHOD_OVERRIDE: &str = "X-HTTP-Method-Override";
