//! Shared client state.
//!
//! A [`ClientContext`] holds everything requests share: default headers, the
//! default [`HttpConfig`] (timeouts, redirect cap, interceptor chains), the
//! cookie store and the content decoder registry. Requests copy the headers
//! and config when they are created, so later context changes only affect
//! new requests.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use url::Url;

use crate::charset::Charset;
use crate::config::{HttpConfig, DEFAULT_ACCEPT, DEFAULT_ACCEPT_ENCODING, DEFAULT_USER_AGENT};
use crate::cookie::CookieStore;
use crate::error_handling::HttpError;
use crate::header::{names, HeaderMap};
use crate::interceptor::Interceptor;
use crate::method::Method;
use crate::request::Request;
use crate::response::{DecoderRegistry, Response};

/// State shared by every request created from it.
#[derive(Debug)]
pub struct ClientContext {
    headers: RwLock<HeaderMap>,
    config: RwLock<HttpConfig>,
    cookie_store: Option<Arc<CookieStore>>,
    decoders: Arc<DecoderRegistry>,
    charset: Charset,
}

impl ClientContext {
    /// Context with default headers, a fresh cookie store and the built-in
    /// gzip/deflate decoders.
    pub fn new() -> Arc<Self> {
        Self::builder().build()
    }

    /// Starts building a customized context.
    pub fn builder() -> ClientContextBuilder {
        ClientContextBuilder::default()
    }

    /// Copy of the default headers.
    pub fn default_headers(&self) -> HeaderMap {
        self.headers.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Sets a default header for requests created from now on.
    pub fn set_default_header(&self, name: &str, value: impl Into<String>, replace: bool) {
        self.headers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name, value, replace);
    }

    /// Removes a default header.
    pub fn remove_default_header(&self, name: &str) {
        self.headers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
    }

    /// Copy of the default request configuration.
    pub fn config(&self) -> HttpConfig {
        self.config.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Edits the default request configuration in place.
    pub fn update_config(&self, update: impl FnOnce(&mut HttpConfig)) {
        let mut config = self.config.write().unwrap_or_else(|e| e.into_inner());
        update(&mut config);
    }

    /// Sets the default connect and read timeout.
    pub fn set_default_timeout(&self, timeout: Option<Duration>) {
        self.update_config(|config| config.set_timeout(timeout));
    }

    /// Adds an interceptor run on every request created from now on.
    pub fn add_request_interceptor(&self, interceptor: impl Interceptor<Request> + 'static) {
        self.update_config(|config| config.request_interceptors.add(interceptor));
    }

    /// Adds an interceptor run on the final response of every request created
    /// from now on.
    pub fn add_response_interceptor(&self, interceptor: impl Interceptor<Response> + 'static) {
        self.update_config(|config| config.response_interceptors.add(interceptor));
    }

    /// The shared cookie store, unless cookies are disabled for this context.
    pub fn cookie_store(&self) -> Option<&Arc<CookieStore>> {
        self.cookie_store.as_ref()
    }

    /// Content decoders applied to response bodies.
    pub fn decoders(&self) -> &DecoderRegistry {
        &self.decoders
    }

    /// Charset new requests start with.
    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// New request for `method` and `url`.
    ///
    /// A URL without a scheme gets `http://`.
    ///
    /// # Errors
    ///
    /// [`HttpError::InvalidUrl`] when the URL does not parse or its scheme is
    /// not http or https.
    pub fn request(self: &Arc<Self>, method: Method, url: &str) -> Result<Request, HttpError> {
        let url = normalize_url(url)?;
        Ok(Request::new(Arc::clone(self), method, url))
    }

    /// New GET request.
    pub fn get(self: &Arc<Self>, url: &str) -> Result<Request, HttpError> {
        self.request(Method::Get, url)
    }

    /// New POST request.
    pub fn post(self: &Arc<Self>, url: &str) -> Result<Request, HttpError> {
        self.request(Method::Post, url)
    }

    /// New PUT request.
    pub fn put(self: &Arc<Self>, url: &str) -> Result<Request, HttpError> {
        self.request(Method::Put, url)
    }

    /// New DELETE request.
    pub fn delete(self: &Arc<Self>, url: &str) -> Result<Request, HttpError> {
        self.request(Method::Delete, url)
    }

    /// New HEAD request.
    pub fn head(self: &Arc<Self>, url: &str) -> Result<Request, HttpError> {
        self.request(Method::Head, url)
    }

    /// New OPTIONS request.
    pub fn options(self: &Arc<Self>, url: &str) -> Result<Request, HttpError> {
        self.request(Method::Options, url)
    }

    /// New PATCH request (sent as POST with a method override header).
    pub fn patch(self: &Arc<Self>, url: &str) -> Result<Request, HttpError> {
        self.request(Method::Patch, url)
    }
}

/// Builder for [`ClientContext`].
#[derive(Debug)]
pub struct ClientContextBuilder {
    headers: HeaderMap,
    config: HttpConfig,
    cookie_store: Option<Arc<CookieStore>>,
    decoders: DecoderRegistry,
    charset: Charset,
}

impl Default for ClientContextBuilder {
    fn default() -> Self {
        let mut headers = HeaderMap::new();
        headers.append(names::ACCEPT, DEFAULT_ACCEPT);
        headers.append(names::ACCEPT_ENCODING, DEFAULT_ACCEPT_ENCODING);
        headers.append(names::USER_AGENT, DEFAULT_USER_AGENT);
        Self {
            headers,
            config: HttpConfig::default(),
            cookie_store: Some(Arc::new(CookieStore::new())),
            decoders: DecoderRegistry::default(),
            charset: Charset::utf8(),
        }
    }
}

impl ClientContextBuilder {
    /// Sets (replacing) a default header.
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Removes a default header.
    pub fn without_header(mut self, name: &str) -> Self {
        self.headers.remove(name);
        self
    }

    /// Replaces the default request configuration.
    pub fn config(mut self, config: HttpConfig) -> Self {
        self.config = config;
        self
    }

    /// Default connect and read timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.set_timeout(Some(timeout));
        self
    }

    /// Default redirect cap.
    pub fn max_redirect_count(mut self, count: usize) -> Self {
        self.config.max_redirect_count = count;
        self
    }

    /// Shares an existing cookie store.
    pub fn cookie_store(mut self, store: Arc<CookieStore>) -> Self {
        self.cookie_store = Some(store);
        self
    }

    /// Turns cookie handling off: nothing is stored or sent from a store.
    pub fn without_cookies(mut self) -> Self {
        self.cookie_store = None;
        self
    }

    /// Replaces the content decoder registry.
    pub fn decoders(mut self, decoders: DecoderRegistry) -> Self {
        self.decoders = decoders;
        self
    }

    /// Default request charset.
    pub fn charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    /// Finishes the context.
    pub fn build(self) -> Arc<ClientContext> {
        Arc::new(ClientContext {
            headers: RwLock::new(self.headers),
            config: RwLock::new(self.config),
            cookie_store: self.cookie_store,
            decoders: Arc::new(self.decoders),
            charset: self.charset,
        })
    }
}

/// Parses `raw`, defaulting to `http://` when no scheme is given.
pub(crate) fn normalize_url(raw: &str) -> Result<Url, HttpError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(HttpError::invalid_url(raw, "empty URL"));
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    let url = Url::parse(&with_scheme).map_err(|e| HttpError::invalid_url(raw, e))?;
    check_scheme(&url)?;
    Ok(url)
}

/// Rejects URLs that are not http(s) or have no host.
pub(crate) fn check_scheme(url: &Url) -> Result<(), HttpError> {
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(HttpError::invalid_url(
                url.as_str(),
                format!("unsupported scheme '{other}'"),
            ))
        }
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(HttpError::invalid_url(url.as_str(), "missing host"));
    }
    Ok(())
}
