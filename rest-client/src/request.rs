//! Request and response types shared by the session and its callers

use std::fmt;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::{RestError, Result};

/// HTTP methods used against the REST API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// POST, PUT and DELETE change server state and are suppressed in read-only mode
    pub fn is_mutating(self) -> bool {
        !matches!(self, Method::Get)
    }

    pub(crate) fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

/// Request body, either JSON or raw text sent as `text/plain`
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(serde_json::Value),
    Text(String),
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Json(value) => write!(f, "{value}"),
            Body::Text(text) => write!(f, "{text}"),
        }
    }
}

/// An in-flight call. The body is kept only so failures can be logged with it.
#[derive(Debug, Clone, PartialEq)]
pub struct RestRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Body>,
    /// Log a warning when the server answers 404
    pub log_404: bool,
    /// Treat any status >= 400 as a broken session
    pub disconnect_on_error: bool,
}

impl RestRequest {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            log_404: true,
            disconnect_on_error: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_json(mut self, value: serde_json::Value) -> Self {
        self.body = Some(Body::Json(value));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.body = Some(Body::Text(text.into()));
        self
    }

    pub fn without_404_log(mut self) -> Self {
        self.log_404 = false;
        self
    }

    pub fn disconnect_on_error(mut self) -> Self {
        self.disconnect_on_error = true;
        self
    }
}

/// A fully received response
#[derive(Debug, Clone)]
pub struct RestResponse {
    pub status: u16,
    pub method: Method,
    pub url: String,
    pub body: Bytes,
}

impl RestResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as UTF-8 text
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(|e| RestError::Decode(e.to_string()))
    }

    /// Body decoded as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| RestError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Method::Get, false, "GET")]
    #[case(Method::Post, true, "POST")]
    #[case(Method::Put, true, "PUT")]
    #[case(Method::Delete, true, "DELETE")]
    fn test_method_properties(#[case] method: Method, #[case] mutating: bool, #[case] name: &str) {
        assert_eq!(method.is_mutating(), mutating);
        assert_eq!(method.to_string(), name);
        assert_eq!(method.as_reqwest().as_str(), name);
    }

    #[test]
    fn test_request_builders() {
        let request = RestRequest::put("items/Light/state")
            .with_text("ON")
            .without_404_log();
        assert_eq!(request.method, Method::Put);
        assert_eq!(request.body, Some(Body::Text("ON".to_string())));
        assert!(!request.log_404);
        assert!(!request.disconnect_on_error);

        let request = RestRequest::get("uuid").disconnect_on_error();
        assert!(request.log_404);
        assert!(request.disconnect_on_error);
        assert!(request.body.is_none());
    }

    #[test]
    fn test_response_decoding() {
        let response = RestResponse {
            status: 200,
            method: Method::Get,
            url: "http://localhost:8123/rest/".to_string(),
            body: Bytes::from_static(br#"{"version": "1"}"#),
        };
        assert!(response.is_success());

        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["version"], "1");

        let bad = RestResponse {
            body: Bytes::from_static(b"\xff\xfe"),
            ..response
        };
        assert!(matches!(bad.text(), Err(RestError::Decode(_))));
        assert!(matches!(bad.json::<serde_json::Value>(), Err(RestError::Decode(_))));
    }
}
