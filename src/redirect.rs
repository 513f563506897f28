//! Redirect handling.
//!
//! Redirects are followed in a bounded loop: every hop re-runs the whole send
//! pipeline against the resolved `Location`, on a fresh connection. Running
//! out of hops is not an error; the last 3xx response is returned with a
//! warning so callers can check [`Response::is_redirect`].

use log::{debug, warn};
use url::Url;

use crate::config::HttpConfig;
use crate::context::check_scheme;
use crate::error_handling::HttpError;
use crate::header::names;
use crate::request::{send_once, Request};
use crate::response::Response;

/// Where the redirect loop stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectState {
    /// First attempt, nothing sent yet.
    Initial,
    /// At least one redirect has been followed.
    Redirecting,
    /// The current response is the one handed back.
    Terminal,
}

/// What to do with a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectDecision {
    /// Re-send to this URL.
    Follow(Url),
    /// A redirect, but the hop budget is spent.
    Exhausted,
    /// A redirect status without a `Location` header.
    MissingLocation,
    /// Not a redirect, or following is switched off.
    Final,
}

/// Decides whether `response` is followed after `hops` redirects.
///
/// # Errors
///
/// [`HttpError::InvalidUrl`] when `Location` cannot be resolved or points to
/// a scheme other than http(s).
pub fn decide(
    response: &Response,
    config: &HttpConfig,
    hops: usize,
) -> Result<RedirectDecision, HttpError> {
    if !response.is_redirect() {
        return Ok(RedirectDecision::Final);
    }
    if !config.follow_redirects || config.max_redirect_count == 0 {
        return Ok(RedirectDecision::Final);
    }
    if !config.allows_redirect(hops) {
        return Ok(RedirectDecision::Exhausted);
    }
    let Some(location) = response.header(names::LOCATION) else {
        return Ok(RedirectDecision::MissingLocation);
    };
    let next = resolve_location(response.url(), location)?;
    check_scheme(&next)?;
    Ok(RedirectDecision::Follow(next))
}

/// Resolves `location` as an absolute URL, or relative to `current`.
pub(crate) fn resolve_location(current: &Url, location: &str) -> Result<Url, HttpError> {
    let location = location.trim();
    Url::parse(location)
        .or_else(|_| current.join(location))
        .map_err(|e| HttpError::invalid_url(location, e))
}

/// Runs `request` to its final response.
pub(crate) fn execute(request: &mut Request, is_async: bool) -> Result<Response, HttpError> {
    let mut state = RedirectState::Initial;
    let mut response = loop {
        if state == RedirectState::Initial || request.config().interceptor_on_redirect {
            let interceptors = request.config().request_interceptors.clone();
            interceptors.apply(request);
        }

        let response = send_once(request, true)?;
        match decide(&response, request.config(), request.redirect_count())? {
            RedirectDecision::Follow(next) => {
                debug!(
                    "{} {} from {}, following",
                    response.status(),
                    response.reason(),
                    response.url()
                );
                // closes the previous hop's connection
                drop(response);
                request.follow(next);
                state = RedirectState::Redirecting;
            }
            RedirectDecision::Exhausted => {
                warn!(
                    "Redirect limit of {} reached at {}, returning {} response",
                    request.config().max_redirect_count,
                    response.url(),
                    response.status()
                );
                break response;
            }
            RedirectDecision::MissingLocation => {
                warn!(
                    "{} response from {} has no Location header, not following",
                    response.status(),
                    response.url()
                );
                break response;
            }
            RedirectDecision::Final => break response,
        }
    };
    state = RedirectState::Terminal;
    debug!(
        "Request to {} finished ({:?}) after {} redirect(s) with status {}",
        response.url(),
        state,
        request.redirect_count(),
        response.status()
    );

    if !is_async {
        response.sync()?;
    }
    request.config().response_interceptors.apply(&mut response);
    Ok(response)
}
