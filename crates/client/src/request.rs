//! Immutable request descriptors

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::ClientError;

/// One logical API call: method, path, optional JSON body, extra headers.
///
/// A descriptor never changes after it is built. The session client keeps
/// replay state (attempt count) on the side, so the same descriptor serves
/// both the original dispatch and the post-refresh replay.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// Create a descriptor for an arbitrary method and path
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// GET request descriptor
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// POST request descriptor
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// PUT request descriptor
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// DELETE request descriptor
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body, serialized once at build time
    pub fn json<B: serde::Serialize>(mut self, body: &B) -> Result<Self, ClientError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Attach an extra header
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Request method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path, relative to the client's base URL
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Extra headers carried by the descriptor
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// JSON body, if any
    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Payload {
        label: String,
    }

    #[test]
    fn json_body_is_serialized_at_build_time() {
        let request = ApiRequest::post("/contacts")
            .json(&Payload {
                label: "lead".to_string(),
            })
            .unwrap();

        assert_eq!(request.body(), Some(&serde_json::json!({ "label": "lead" })));
    }

    #[test]
    fn body_is_absent_until_set() {
        assert_eq!(ApiRequest::get("/contacts").body(), None);
    }

    #[test]
    fn headers_survive_cloning() {
        let request = ApiRequest::get("/contacts").header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("abc-123"),
        );
        let replay = request.clone();

        assert_eq!(
            replay.headers().get("x-request-id"),
            Some(&HeaderValue::from_static("abc-123"))
        );
        assert_eq!(replay.path(), "/contacts");
        assert_eq!(replay.method(), &Method::GET);
    }
}
