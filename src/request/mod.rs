//! Request model.
//!
//! A [`Request`] is built with consuming setters and executed with
//! [`Request::execute`] or [`Request::execute_async`]. Execution borrows the
//! request mutably: following a redirect replaces its URL and bumps its hop
//! counter, so a request is never shared between concurrent executions.

mod send;

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use log::debug;
use rustls::client::danger::ServerCertVerifier;
use url::Url;

use crate::charset::Charset;
use crate::config::{HttpConfig, FOLLOW_REDIRECTS_DEFAULT_CAP};
use crate::connection::{Proxy, SocketFactory, TlsProtocol};
use crate::context::{check_scheme, ClientContext};
use crate::cookie::CookiePolicy;
use crate::encode::{append_query, content_type, encode_pairs, Form, MultipartPart};
use crate::error_handling::HttpError;
use crate::header::{names, HeaderMap};
use crate::interceptor::Interceptor;
use crate::method::Method;
use crate::redirect;
use crate::response::Response;

pub(crate) use send::send_once;

/// An HTTP request bound to a [`ClientContext`].
pub struct Request {
    context: Arc<ClientContext>,
    config: HttpConfig,
    url: Url,
    method: Method,
    headers: HeaderMap,
    charset: Charset,
    body: Option<Vec<u8>>,
    form: Option<Form>,
    cookie: CookiePolicy,
    multipart: bool,
    rest: bool,
    redirect_count: usize,
}

impl Request {
    pub(crate) fn new(context: Arc<ClientContext>, method: Method, url: Url) -> Self {
        let request = Self {
            config: context.config(),
            headers: context.default_headers(),
            charset: context.charset(),
            context,
            url,
            method: Method::Get,
            body: None,
            form: None,
            cookie: CookiePolicy::Default,
            multipart: false,
            rest: false,
            redirect_count: 0,
        };
        request.method(method)
    }

    // ----- headers -----

    /// Adds a header; `replace` drops existing values under the same name.
    pub fn header(mut self, name: &str, value: impl Into<String>, replace: bool) -> Self {
        self.headers.insert(name, value, replace);
        self
    }

    /// Replaces a header value.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    /// Adds every header of `headers`, replacing same-named ones.
    pub fn headers_from(mut self, headers: &HeaderMap) -> Self {
        self.headers.merge_from(headers, true);
        self
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable request headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Sets `Content-Type`.
    pub fn content_type(self, content_type: &str) -> Self {
        self.header(names::CONTENT_TYPE, content_type, true)
    }

    /// Sets `Content-Length`.
    pub fn content_length(self, length: u64) -> Self {
        self.header(names::CONTENT_LENGTH, length.to_string(), true)
    }

    /// `Connection: Keep-Alive` or `Connection: Close`.
    pub fn keep_alive(self, keep_alive: bool) -> Self {
        let value = if keep_alive { "Keep-Alive" } else { "Close" };
        self.header(names::CONNECTION, value, true)
    }

    /// Whether the connection is asked to stay open (the HTTP/1.1 default).
    pub fn is_keep_alive(&self) -> bool {
        self.headers
            .get(names::CONNECTION)
            .map_or(true, |v| !v.trim().eq_ignore_ascii_case("close"))
    }

    // ----- method and URL -----

    /// Sets the method. PATCH goes out as POST with
    /// `X-HTTP-Method-Override: PATCH`.
    pub fn method(mut self, method: Method) -> Self {
        if method == Method::Patch {
            self.method = Method::Post;
            self.headers
                .set(names::X_HTTP_METHOD_OVERRIDE, Method::Patch.as_str());
        } else {
            self.method = method;
        }
        self
    }

    /// Method written on the wire.
    pub fn http_method(&self) -> Method {
        self.method
    }

    /// Current URL (the latest hop's URL after a redirect).
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Replaces the URL.
    ///
    /// # Errors
    ///
    /// [`HttpError::InvalidUrl`] for non-http(s) URLs.
    pub fn set_url(&mut self, url: Url) -> Result<(), HttpError> {
        check_scheme(&url)?;
        self.url = url;
        Ok(())
    }

    /// Redirect hops taken so far.
    pub fn redirect_count(&self) -> usize {
        self.redirect_count
    }

    // ----- charset -----

    /// Charset for form encoding, text parts and credentials.
    ///
    /// # Errors
    ///
    /// [`HttpError::Encoding`] for an unknown label.
    pub fn charset(mut self, label: &str) -> Result<Self, HttpError> {
        self.charset = Charset::for_label(label)?;
        Ok(self)
    }

    /// Request charset.
    pub fn request_charset(&self) -> Charset {
        self.charset
    }

    // ----- body -----

    /// Sets a raw body, clearing any form fields.
    ///
    /// When no Content-Type is set yet (or it is the urlencoded default), a
    /// body starting with `{`/`[` is sent as JSON and one starting with `<` as
    /// XML, and rest mode is switched on.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.set_body(body.into(), None);
        self
    }

    /// Sets a raw body with an explicit Content-Type.
    pub fn body_with_type(mut self, body: impl Into<Vec<u8>>, content_type: &str) -> Self {
        self.set_body(body.into(), Some(content_type));
        self
    }

    fn set_body(&mut self, bytes: Vec<u8>, explicit_type: Option<&str>) {
        self.form = None;
        self.multipart = false;
        let content_type = match explicit_type {
            Some(ct) => Some(ct.to_string()),
            None => {
                let replaceable = self
                    .headers
                    .get(names::CONTENT_TYPE)
                    .map_or(true, content_type::is_default);
                if replaceable {
                    content_type::sniff(&bytes)
                        .map(|t| content_type::with_charset(t, self.charset.name()))
                } else {
                    None
                }
            }
        };
        if let Some(ct) = content_type {
            if content_type::is_rest_type(&ct) {
                self.rest = true;
            }
            self.headers.set(names::CONTENT_TYPE, ct);
        }
        self.headers
            .set(names::CONTENT_LENGTH, bytes.len().to_string());
        self.body = Some(bytes);
    }

    /// Raw body, if one is set.
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    // ----- form -----

    /// Adds a text form field. Blank names are ignored.
    pub fn form(mut self, name: &str, value: impl ToString) -> Self {
        self.form_mut().add_text(name, value.to_string());
        self
    }

    /// Adds a text field whose value is `values` joined with `,`.
    pub fn form_list<I, S>(self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = values
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.form(name, joined)
    }

    /// Adds every `(name, value)` pair as a text field.
    pub fn form_pairs<'a, I>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in pairs {
            self.form_mut().add_text(name, value);
        }
        self
    }

    /// Adds a file part named after the file.
    pub fn form_file(self, name: &str, path: impl Into<PathBuf>) -> Self {
        self.form_part(name, MultipartPart::file(path))
    }

    /// Adds a file part sent under `filename`.
    pub fn form_file_named(self, name: &str, path: impl Into<PathBuf>, filename: &str) -> Self {
        self.form_part(name, MultipartPart::file(path).with_filename(filename))
    }

    /// Adds one file part per path, all under `name`.
    pub fn form_files<I, P>(mut self, name: &str, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        for path in paths {
            self = self.form_file(name, path);
        }
        self
    }

    /// Adds an in-memory part.
    pub fn form_bytes(self, name: &str, bytes: impl Into<Vec<u8>>, filename: Option<&str>) -> Self {
        self.form_part(
            name,
            MultipartPart::bytes(bytes, filename.map(str::to_string)),
        )
    }

    /// Adds a part streamed from `reader`; the body is sent chunked.
    pub fn form_reader(
        self,
        name: &str,
        reader: impl Read + Send + 'static,
        filename: Option<&str>,
    ) -> Self {
        self.form_part(
            name,
            MultipartPart::reader(reader, filename.map(str::to_string)),
        )
    }

    /// Adds a prepared part and switches the body to multipart.
    pub fn form_part(mut self, name: &str, part: MultipartPart) -> Self {
        if name.trim().is_empty() {
            return self;
        }
        self.form_mut().add_part(name, part);
        self.multipart = true;
        if !self.is_keep_alive() {
            self = self.keep_alive(true);
        }
        self
    }

    /// Form fields, if any were added.
    pub fn form_fields(&self) -> Option<&Form> {
        self.form.as_ref()
    }

    /// Whether the body is sent as multipart/form-data.
    pub fn is_multipart(&self) -> bool {
        self.multipart
    }

    fn form_mut(&mut self) -> &mut Form {
        if self.body.take().is_some() {
            self.headers.remove(names::CONTENT_LENGTH);
        }
        self.form.get_or_insert_with(Form::new)
    }

    // ----- auth -----

    /// `Authorization: Basic base64(user:password)`.
    pub fn basic_auth(self, user: &str, password: &str) -> Self {
        let token = self.basic_token(user, password);
        self.auth(&token)
    }

    /// `Authorization: Bearer <token>`.
    pub fn bearer_auth(self, token: &str) -> Self {
        self.auth(&format!("Bearer {token}"))
    }

    /// Raw `Authorization` value.
    pub fn auth(self, value: &str) -> Self {
        self.header(names::AUTHORIZATION, value, true)
    }

    /// `Proxy-Authorization: Basic base64(user:password)`.
    pub fn basic_proxy_auth(self, user: &str, password: &str) -> Self {
        let token = self.basic_token(user, password);
        self.proxy_auth(&token)
    }

    /// Raw `Proxy-Authorization` value.
    pub fn proxy_auth(self, value: &str) -> Self {
        self.header(names::PROXY_AUTHORIZATION, value, true)
    }

    fn basic_token(&self, user: &str, password: &str) -> String {
        let credentials = format!("{user}:{password}");
        format!("Basic {}", STANDARD.encode(self.charset.encode(&credentials)))
    }

    // ----- cookies and caching -----

    /// Sends exactly this `Cookie` value instead of the stored one.
    pub fn cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = CookiePolicy::Explicit(cookie.into());
        self
    }

    /// Sends no `Cookie` header.
    pub fn disable_cookie(mut self) -> Self {
        self.cookie = CookiePolicy::Disabled;
        self
    }

    /// Sends the cookies recorded in the context's store (the default).
    pub fn enable_default_cookie(mut self) -> Self {
        self.cookie = CookiePolicy::Default;
        self
    }

    /// How this request sources its `Cookie` header.
    pub fn cookie_policy(&self) -> &CookiePolicy {
        &self.cookie
    }

    /// Sends `Cache-Control: no-cache` and `Pragma: no-cache`.
    pub fn disable_cache(mut self) -> Self {
        self.config.disable_cache = true;
        self
    }

    // ----- transport -----

    /// Sets both the connect and the read timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.set_timeout(Some(timeout));
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Sets the read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = Some(timeout);
        self
    }

    /// Turns redirect following on or off. Turning it on while the cap is
    /// zero sets the cap to 2.
    pub fn set_follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        if follow && self.config.max_redirect_count == 0 {
            self.config.max_redirect_count = FOLLOW_REDIRECTS_DEFAULT_CAP;
        }
        self
    }

    /// Maximum number of redirect hops.
    pub fn max_redirect_count(mut self, count: usize) -> Self {
        self.config.max_redirect_count = count;
        self
    }

    /// Goes through the HTTP proxy at `host:port`.
    pub fn http_proxy(self, host: &str, port: u16) -> Self {
        self.proxy(Proxy::http(host, port))
    }

    /// Goes through `proxy`.
    pub fn proxy(mut self, proxy: Proxy) -> Self {
        self.config.proxy = Some(proxy);
        self
    }

    /// Certificate verifier for https.
    pub fn hostname_verifier(mut self, verifier: Arc<dyn ServerCertVerifier>) -> Self {
        self.config.tls.hostname_verifier = Some(verifier);
        self
    }

    /// Socket factory for https.
    pub fn socket_factory(mut self, factory: Arc<dyn SocketFactory>) -> Self {
        self.config.tls.socket_factory = Some(factory);
        self
    }

    /// Pins the TLS protocol version. The pin is passed to whichever socket
    /// factory is in use, including one set with [`Request::socket_factory`].
    pub fn tls_protocol(mut self, protocol: TlsProtocol) -> Self {
        self.config.tls.protocol = Some(protocol);
        self
    }

    /// Sends the body with any method and never moves it into the query.
    pub fn rest(mut self, rest: bool) -> Self {
        self.rest = rest;
        self
    }

    /// Whether rest mode is on.
    pub fn is_rest(&self) -> bool {
        self.rest
    }

    /// Sends the body with chunked transfer coding in blocks of
    /// `block_size` bytes; `0` turns chunked mode off.
    pub fn chunked_streaming(mut self, block_size: usize) -> Self {
        self.config.block_size = block_size;
        self
    }

    /// Whether a body cut short is returned partially (`true`) or fails.
    pub fn ignore_eof_error(mut self, ignore: bool) -> Self {
        self.config.ignore_eof_error = ignore;
        self
    }

    // ----- interceptors -----

    /// Adds a request interceptor for this request only.
    pub fn add_request_interceptor(mut self, interceptor: impl Interceptor<Request> + 'static) -> Self {
        self.config.request_interceptors.add(interceptor);
        self
    }

    /// Adds a response interceptor for this request only.
    pub fn add_response_interceptor(mut self, interceptor: impl Interceptor<Response> + 'static) -> Self {
        self.config.response_interceptors.add(interceptor);
        self
    }

    /// Runs request interceptors again before every redirect hop.
    pub fn interceptor_on_redirect(mut self, enabled: bool) -> Self {
        self.config.interceptor_on_redirect = enabled;
        self
    }

    /// Settings of this request.
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// The context this request was created from.
    pub fn context(&self) -> &Arc<ClientContext> {
        &self.context
    }

    // ----- execution -----

    /// Sends the request, follows redirects and reads the whole body.
    ///
    /// # Errors
    ///
    /// Any [`HttpError`] raised while connecting, sending, following
    /// redirects or reading the body.
    pub fn execute(&mut self) -> Result<Response, HttpError> {
        redirect::execute(self, false)
    }

    /// Like [`Request::execute`] but leaves the body on the wire.
    pub fn execute_async(&mut self) -> Result<Response, HttpError> {
        redirect::execute(self, true)
    }

    /// Executes in async mode, hands the response to `consumer` and closes it.
    pub fn then<F>(&mut self, consumer: F) -> Result<(), HttpError>
    where
        F: FnOnce(&mut Response),
    {
        let mut response = self.execute_async()?;
        consumer(&mut response);
        response.close();
        Ok(())
    }

    /// URL the next attempt is sent to: for a GET outside rest mode on the
    /// first attempt, the body or the text form fields move into the query.
    pub(crate) fn effective_url(&self) -> Url {
        let mut url = self.url.clone();
        if self.method != Method::Get || self.rest || self.redirect_count > 0 {
            return url;
        }
        if let Some(body) = &self.body {
            let query = self.charset.decode(body);
            append_query(&mut url, query.trim());
        } else if let Some(form) = &self.form {
            append_query(&mut url, &encode_pairs(form.text_pairs(), self.charset));
        }
        url
    }

    /// Whether the body is written for the current method and mode.
    pub(crate) fn sends_body(&self) -> bool {
        self.method.sends_body() || self.rest
    }

    pub(crate) fn follow(&mut self, location: Url) {
        debug!(
            "Redirect hop {} from {} to {}",
            self.redirect_count + 1,
            self.url,
            location
        );
        self.url = location;
        self.redirect_count += 1;
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("charset", &self.charset)
            .field("body", &self.body.as_ref().map(Vec::len))
            .field("form", &self.form.as_ref().map(Form::len))
            .field("rest", &self.rest)
            .field("redirect_count", &self.redirect_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(url: &str) -> Request {
        ClientContext::new().get(url).expect("request")
    }

    #[test]
    fn test_patch_becomes_post_with_override() {
        let request = ClientContext::new().patch("http://h/x").expect("request");
        assert_eq!(request.http_method(), Method::Post);
        assert_eq!(request.headers().get("X-HTTP-Method-Override"), Some("PATCH"));
    }

    #[test]
    fn test_header_append_and_override() {
        let appended = get("http://h/").header("X-V", "v1", false).header("x-v", "v2", false);
        assert_eq!(appended.headers().get_all("X-V"), vec!["v1", "v2"]);
        let replaced = get("http://h/").header("X-V", "v1", false).header("X-V", "v2", true);
        assert_eq!(replaced.headers().get_all("X-V"), vec!["v2"]);
    }

    #[test]
    fn test_tls_protocol_keeps_custom_factory() {
        use crate::connection::RustlsSocketFactory;

        let request = get("https://h/")
            .socket_factory(Arc::new(RustlsSocketFactory::new()))
            .tls_protocol(TlsProtocol::Tls13);
        assert!(request.config().tls.socket_factory.is_some());
        assert_eq!(request.config().tls.protocol, Some(TlsProtocol::Tls13));
    }

    #[test]
    fn test_body_sniffs_json_and_sets_rest() {
        let request = ClientContext::new()
            .post("http://h/")
            .expect("request")
            .body("  {\"a\":1}");
        assert_eq!(
            request.headers().get("content-type"),
            Some("application/json;charset=UTF-8")
        );
        assert_eq!(request.headers().get("content-length"), Some("9"));
        assert!(request.is_rest());
    }

    #[test]
    fn test_body_keeps_explicit_non_default_type() {
        let request = get("http://h/")
            .content_type("text/plain")
            .body("<not xml for us>");
        assert_eq!(request.headers().get("content-type"), Some("text/plain"));
        assert!(!request.is_rest());
    }

    #[test]
    fn test_body_replaces_urlencoded_default() {
        let request = get("http://h/")
            .content_type("application/x-www-form-urlencoded;charset=UTF-8")
            .body("<a/>");
        assert_eq!(
            request.headers().get("content-type"),
            Some("application/xml;charset=UTF-8")
        );
    }

    #[test]
    fn test_body_with_explicit_xml_type_sets_rest() {
        let request = get("http://h/").body_with_type("data", "text/xml");
        assert!(request.is_rest());
    }

    #[test]
    fn test_body_and_form_are_exclusive() {
        let request = get("http://h/").body("raw").form("a", 1);
        assert!(request.body_bytes().is_none());
        assert!(!request.headers().contains("content-length"));
        assert_eq!(request.form_fields().map(Form::len), Some(1));

        let request = get("http://h/").form("a", 1).body("raw");
        assert!(request.form_fields().is_none());
        assert_eq!(request.body_bytes(), Some(&b"raw"[..]));
    }

    #[test]
    fn test_form_list_and_blank_names() {
        let request = get("http://h/")
            .form_list("ids", ["1", "2", "3"])
            .form("  ", "ignored");
        let pairs: Vec<_> = request
            .form_fields()
            .map(|f| f.text_pairs().collect())
            .unwrap_or_default();
        assert_eq!(pairs, vec![("ids", "1,2,3")]);
    }

    #[test]
    fn test_file_part_switches_to_multipart_and_keep_alive() {
        let request = ClientContext::new()
            .post("http://h/")
            .expect("request")
            .keep_alive(false)
            .form_bytes("f", b"x".to_vec(), Some("x.txt"));
        assert!(request.is_multipart());
        assert!(request.is_keep_alive());
    }

    #[test]
    fn test_effective_url_for_get() {
        let request = get("http://h/search?lang=en").form("q", "a b").form("q", "c");
        assert_eq!(
            request.effective_url().as_str(),
            "http://h/search?lang=en&q=a+b&q=c"
        );

        let request = get("http://h/p").body("x=1&y=2");
        assert_eq!(request.effective_url().as_str(), "http://h/p?x=1&y=2");

        let mut hopped = get("http://h/p").form("q", "1");
        hopped.follow(Url::parse("http://h/next").expect("url"));
        assert_eq!(hopped.effective_url().as_str(), "http://h/next");
        assert_eq!(hopped.redirect_count(), 1);
    }

    #[test]
    fn test_effective_url_unchanged_for_rest_and_post() {
        let rest = get("http://h/p").rest(true).form("q", "1");
        assert_eq!(rest.effective_url().as_str(), "http://h/p");
        assert!(rest.sends_body());

        let post = ClientContext::new()
            .post("http://h/p")
            .expect("request")
            .form("q", "1");
        assert_eq!(post.effective_url().as_str(), "http://h/p");
        assert!(post.sends_body());
    }

    #[test]
    fn test_basic_auth() {
        let request = get("http://h/").basic_auth("user", "pass");
        assert_eq!(
            request.headers().get("authorization"),
            Some("Basic dXNlcjpwYXNz")
        );
        let request = get("http://h/").basic_proxy_auth("user", "pass");
        assert_eq!(
            request.headers().get("proxy-authorization"),
            Some("Basic dXNlcjpwYXNz")
        );
        let request = get("http://h/").bearer_auth("tok");
        assert_eq!(request.headers().get("authorization"), Some("Bearer tok"));
    }

    #[test]
    fn test_follow_redirects_sets_default_cap() {
        let request = get("http://h/").set_follow_redirects(true);
        assert_eq!(request.config().max_redirect_count, 2);
        let request = get("http://h/").max_redirect_count(7).set_follow_redirects(true);
        assert_eq!(request.config().max_redirect_count, 7);
        let request = get("http://h/").max_redirect_count(7).set_follow_redirects(false);
        assert!(!request.config().allows_redirect(0));
    }

    #[test]
    fn test_cookie_policies() {
        assert_eq!(get("http://h/").cookie_policy(), &CookiePolicy::Default);
        assert_eq!(
            get("http://h/").cookie("a=b").cookie_policy(),
            &CookiePolicy::Explicit("a=b".into())
        );
        assert_eq!(
            get("http://h/").disable_cookie().cookie_policy(),
            &CookiePolicy::Disabled
        );
        assert_eq!(
            get("http://h/").disable_cookie().enable_default_cookie().cookie_policy(),
            &CookiePolicy::Default
        );
    }

    #[test]
    fn test_charset_label() {
        assert!(get("http://h/").charset("GBK").is_ok());
        assert!(get("http://h/").charset("no-such-charset").is_err());
    }

    #[test]
    fn test_set_url_rejects_other_schemes() {
        let mut request = get("http://h/");
        let ftp = Url::parse("ftp://h/file").expect("url");
        assert!(request.set_url(ftp).is_err());
        assert_eq!(request.url().as_str(), "http://h/");
    }
}
