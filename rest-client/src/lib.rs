//! Private REST client for the home-automation server
//!
//! This crate owns the HTTP session used by the connection core. It builds
//! request URLs, sends JSON or raw-text bodies, and classifies every failure
//! into [`RestError`] so callers can tell a broken session
//! ([`RestError::is_disconnect_signal`]) from an ordinary error.

mod error;
mod request;

pub use error::{classify, is_disconnect_error, RestError, Result};
pub use request::{Body, Method, RestRequest, RestResponse};

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};

/// Everything needed to open a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// PEM file of the CA that signed the server certificate. Selects https.
    pub ca_cert: Option<PathBuf>,
    pub cert_verify: bool,
    pub connect_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8123,
            user: String::new(),
            password: String::new(),
            ca_cert: None,
            cert_verify: true,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// An authenticated HTTP session bound to one server
#[derive(Debug, Clone)]
pub struct RestSession {
    client: reqwest::Client,
    prefix: String,
    credentials: Option<(String, String)>,
}

impl RestSession {
    /// Open a new session. No network traffic happens here.
    pub fn new(options: &SessionOptions) -> Result<Self> {
        let scheme = if options.ca_cert.is_some() { "https" } else { "http" };

        let mut builder = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(path) = &options.ca_cert {
            let pem = std::fs::read(path).map_err(|e| {
                RestError::Session(format!("Failed to read CA certificate {}: {}", path.display(), e))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| RestError::Session(format!("Invalid CA certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }

        if !options.cert_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| RestError::Session(e.to_string()))?;

        let credentials = if options.user.is_empty() {
            None
        } else {
            Some((options.user.clone(), options.password.clone()))
        };

        Ok(Self {
            client,
            prefix: format!("{}://{}:{}", scheme, options.host, options.port),
            credentials,
        })
    }

    /// `scheme://host:port`
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Absolute URL of a REST path. The root path `""` maps to `<prefix>/rest/`.
    pub fn url_for(&self, path: &str) -> Result<String> {
        if path.starts_with('/') {
            return Err(RestError::InvalidPath(path.to_string()));
        }
        if path.is_empty() {
            Ok(format!("{}/rest/", self.prefix))
        } else {
            Ok(format!("{}/rest/{}/", self.prefix, path))
        }
    }

    /// URL of the push-event subscription for the given topic patterns
    pub fn events_url(&self, topics: &[String]) -> String {
        format!("{}/events?topics={}", self.prefix, topics.join(","))
    }

    /// Send a request and read the whole body.
    ///
    /// Transport failures are classified and logged here. The status code is
    /// not interpreted; pass the response through [`check_response`] for that.
    pub async fn execute(&self, request: &RestRequest) -> Result<RestResponse> {
        let url = self.url_for(&request.path)?;

        let mut builder = self.client.request(request.method.as_reqwest(), &url);
        if let Some((user, password)) = &self.credentials {
            builder = builder.basic_auth(user, Some(password));
        }
        builder = match &request.body {
            Some(Body::Json(value)) => builder.json(value),
            Some(Body::Text(text)) => builder
                .header(CONTENT_TYPE, "text/plain; charset=utf-8")
                .body(text.clone()),
            None => builder,
        };

        let response = builder.send().await.map_err(log_transport_error)?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.bytes().await.map_err(log_transport_error)?;

        Ok(RestResponse {
            status,
            method: request.method,
            url: final_url,
            body,
        })
    }

    /// Open the long-lived push-event response. The body is left unread.
    pub async fn open_stream(&self, url: &str) -> Result<reqwest::Response> {
        let mut builder = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream");
        if let Some((user, password)) = &self.credentials {
            builder = builder.basic_auth(user, Some(password));
        }

        let response = builder.send().await.map_err(log_transport_error)?;
        let status = response.status().as_u16();
        if status >= 500 {
            return Err(RestError::NotReady {
                status,
                method: Method::Get,
                url: url.to_string(),
            });
        }
        if status >= 400 {
            return Err(RestError::UnexpectedFailure {
                status,
                method: Method::Get,
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

fn log_transport_error(err: reqwest::Error) -> RestError {
    let classified = classify(&err);
    if classified.is_disconnect_signal() {
        tracing::warn!(error = %err, "Transport failure");
    } else {
        tracing::error!(error = %err, "Unexpected request failure");
    }
    classified
}

/// Interpret the status code of a response.
///
/// - `>= 500`: the server is not ready, [`RestError::NotReady`]
/// - `>= 400` when the request demands success: [`RestError::UnexpectedFailure`]
/// - `>= 300`: logged as a warning (404 only when `log_404` is set), response returned
pub fn check_response(request: &RestRequest, response: RestResponse) -> Result<RestResponse> {
    let status = response.status;

    if status >= 500 {
        return Err(RestError::NotReady {
            status,
            method: response.method,
            url: response.url,
        });
    }

    if request.disconnect_on_error && status >= 400 {
        return Err(RestError::UnexpectedFailure {
            status,
            method: response.method,
            url: response.url,
        });
    }

    let log_status = status >= 300 && (status != 404 || request.log_404);
    if log_status {
        match &request.body {
            Some(body) => tracing::warn!(
                "Status {} for {} {} {}",
                status,
                response.method,
                response.url,
                body
            ),
            None => tracing::warn!("Status {} for {} {}", status, response.method, response.url),
        }
        if let Ok(text) = response.text() {
            for line in text.lines() {
                tracing::debug!("{}", line);
            }
        }
    }

    Ok(response)
}
