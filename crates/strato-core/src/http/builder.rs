//! Request construction for service endpoints
//!
//! Builds inert request descriptors out of endpoint paths, query parameters,
//! headers, and body payloads. Nothing here performs I/O: a built
//! [`HttpRequest`] is plain data until a client executes it, and building the
//! same inputs twice yields identical descriptors.
//!
//! Supported body encodings:
//! - JSON (plain, merge-patch, and json-patch media types)
//! - URL-encoded forms
//! - Raw text or bytes with an explicit media type
//! - Multipart form data

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde::Serialize;
use url::form_urlencoded;

use crate::http::media;
use crate::{Error, Result};

/// Where a request points: a full URL, or a path resolved against the
/// client's configured base endpoint at dispatch time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestTarget {
    /// Complete URL used as-is
    Absolute(Url),
    /// Path (with encoded query) joined onto the client base URL
    Relative(String),
}

/// Body payload carried by a request descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// No payload
    None,
    /// Serialized payload with its media type
    Bytes { content_type: String, content: Bytes },
    /// Multipart form data, lowered to a wire form by the client
    Multipart(Vec<FormPart>),
}

/// One named part of a multipart body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub(crate) name: String,
    pub(crate) filename: Option<String>,
    pub(crate) content_type: Option<String>,
    pub(crate) content: Bytes,
}

impl FormPart {
    /// Creates a part from raw content
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            filename: None,
            content_type: None,
            content: content.into(),
        }
    }

    /// Creates a plain-text field part
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, value.into().into_bytes())
    }

    /// Sets the filename reported for this part
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Sets the content type of this part
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Part name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Part content
    pub fn content(&self) -> &Bytes {
        &self.content
    }
}

/// An immutable, inert request descriptor produced by [`RequestBuilder`]
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub(crate) method: Method,
    pub(crate) target: RequestTarget,
    pub(crate) headers: HeaderMap,
    pub(crate) body: RequestBody,
}

impl HttpRequest {
    /// HTTP method of this request
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Resolved target of this request
    pub fn target(&self) -> &RequestTarget {
        &self.target
    }

    /// Headers set explicitly on this request
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Body payload of this request
    pub fn body(&self) -> &RequestBody {
        &self.body
    }
}

/// Substitutes `{placeholder}` segments in a URL template with
/// percent-encoded parameter values, in declaration order.
///
/// The parameter count must match the placeholder count exactly; mismatches
/// fail before any request exists. Encoded values never introduce new path
/// segments: a `/` inside a value is escaped.
pub fn resolve_request_url(template: &str, path_params: &[&str]) -> Result<String> {
    let placeholders = template.matches('{').count();
    if template.matches('}').count() != placeholders {
        return Err(Error::invalid_argument(format!(
            "unbalanced placeholder braces in URL template '{}'",
            template
        )));
    }
    if placeholders != path_params.len() {
        return Err(Error::invalid_argument(format!(
            "URL template '{}' has {} placeholder(s) but {} parameter(s) were supplied",
            template,
            placeholders,
            path_params.len()
        )));
    }

    let mut resolved = String::with_capacity(template.len());
    let mut remaining = template;
    let mut params = path_params.iter();
    while let Some(open) = remaining.find('{') {
        let close = remaining[open..].find('}').ok_or_else(|| {
            Error::invalid_argument(format!(
                "unbalanced placeholder braces in URL template '{}'",
                template
            ))
        })?;
        resolved.push_str(&remaining[..open]);
        // Checked above: counts match, so the iterator cannot run dry
        if let Some(value) = params.next() {
            resolved.push_str(&encode_path_segment(value));
        }
        remaining = &remaining[open + close + 1..];
    }
    resolved.push_str(remaining);
    Ok(resolved)
}

/// Percent-encodes everything outside the RFC 3986 unreserved set, keeping
/// one template placeholder equal to one path segment
fn encode_path_segment(segment: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let bytes = segment.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        let unreserved = matches!(
            b,
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~'
        );
        if unreserved {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0f) as usize] as char);
        }
    }
    out
}

/// Fluent builder for [`HttpRequest`] descriptors
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    target: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: RequestBody,
}

impl RequestBuilder {
    /// Creates a builder for an arbitrary method and target URL or path
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::None,
        }
    }

    /// Creates a GET request builder
    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    /// Creates a POST request builder
    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::POST, target)
    }

    /// Creates a PUT request builder
    pub fn put(target: impl Into<String>) -> Self {
        Self::new(Method::PUT, target)
    }

    /// Creates a PATCH request builder
    pub fn patch(target: impl Into<String>) -> Self {
        Self::new(Method::PATCH, target)
    }

    /// Creates a DELETE request builder
    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(Method::DELETE, target)
    }

    /// Creates a HEAD request builder
    pub fn head(target: impl Into<String>) -> Self {
        Self::new(Method::HEAD, target)
    }

    /// Appends one query parameter; repeated names produce repeated pairs
    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// Appends one query pair per element, preserving element order. Arrays,
    /// vectors, and any other iterable all expand the same way.
    pub fn query_each<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        let name = name.into();
        for value in values {
            self.query.push((name.clone(), value.to_string()));
        }
        self
    }

    /// Sets a header; setting the same name again replaces the earlier value
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets a JSON body serialized from any `Serialize` value
    pub fn json<B: Serialize + ?Sized>(self, body: &B) -> Result<Self> {
        self.json_with_media_type(body, media::APPLICATION_JSON)
    }

    /// Sets a JSON-family body with an explicit media type, for patch
    /// endpoints that take `application/json-patch+json` or
    /// `application/merge-patch+json` documents
    pub fn json_with_media_type<B: Serialize + ?Sized>(
        mut self,
        body: &B,
        media_type: &str,
    ) -> Result<Self> {
        if !media::is_json_media_type(media_type) && !media::is_json_patch_media_type(media_type) {
            return Err(Error::invalid_argument(format!(
                "'{}' is not a JSON media type",
                media_type
            )));
        }
        let content = serde_json::to_vec(body)?;
        self.body = RequestBody::Bytes {
            content_type: media_type.to_string(),
            content: Bytes::from(content),
        };
        Ok(self)
    }

    /// Sets a URL-encoded form body from a flat list of alternating names
    /// and values. An odd number of arguments is rejected immediately.
    pub fn form<I, S>(mut self, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        if args.len() % 2 != 0 {
            return Err(Error::invalid_argument(format!(
                "form body requires an even number of name/value arguments, got {}",
                args.len()
            )));
        }
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for pair in args.chunks(2) {
            serializer.append_pair(&pair[0], &pair[1]);
        }
        self.body = RequestBody::Bytes {
            content_type: media::APPLICATION_FORM_URLENCODED.to_string(),
            content: Bytes::from(serializer.finish().into_bytes()),
        };
        Ok(self)
    }

    /// Sets a raw text body with an explicit media type
    pub fn text(self, content: impl Into<String>, media_type: &str) -> Self {
        self.content(Bytes::from(content.into().into_bytes()), media_type)
    }

    /// Sets a raw byte body with an explicit media type
    pub fn content(mut self, content: impl Into<Bytes>, media_type: &str) -> Self {
        self.body = RequestBody::Bytes {
            content_type: media_type.to_string(),
            content: content.into(),
        };
        self
    }

    /// Adds a multipart part. Consecutive calls accumulate parts; any other
    /// body method replaces the whole multipart payload.
    pub fn part(mut self, part: FormPart) -> Self {
        match &mut self.body {
            RequestBody::Multipart(parts) => parts.push(part),
            _ => self.body = RequestBody::Multipart(vec![part]),
        }
        self
    }

    /// Builds the request descriptor. Validation failures (bad target URL,
    /// malformed header names) surface here, before any I/O.
    pub fn build(&self) -> Result<HttpRequest> {
        let target = self.build_target()?;
        let headers = self.build_headers()?;
        Ok(HttpRequest {
            method: self.method.clone(),
            target,
            headers,
            body: self.body.clone(),
        })
    }

    fn build_target(&self) -> Result<RequestTarget> {
        // Raw braces mean a path template that was never resolved
        if self.target.contains(['{', '}']) {
            return Err(Error::invalid_argument(format!(
                "unresolved path placeholder in '{}'",
                self.target
            )));
        }
        match Url::parse(&self.target) {
            Ok(mut url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(Error::invalid_argument(format!(
                        "unsupported URL scheme '{}' in '{}'",
                        url.scheme(),
                        self.target
                    )));
                }
                if !self.query.is_empty() {
                    let mut pairs = url.query_pairs_mut();
                    for (name, value) in &self.query {
                        pairs.append_pair(name, value);
                    }
                }
                Ok(RequestTarget::Absolute(url))
            }
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                if self.query.is_empty() {
                    return Ok(RequestTarget::Relative(self.target.clone()));
                }
                let mut serializer = form_urlencoded::Serializer::new(String::new());
                for (name, value) in &self.query {
                    serializer.append_pair(name, value);
                }
                let encoded = serializer.finish();
                let separator = if self.target.contains('?') { '&' } else { '?' };
                Ok(RequestTarget::Relative(format!(
                    "{}{}{}",
                    self.target, separator, encoded
                )))
            }
            Err(e) => Err(Error::invalid_argument(format!(
                "invalid request URL '{}': {}",
                self.target, e
            ))),
        }
    }

    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                Error::invalid_argument(format!("invalid header name '{}': {}", name, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                Error::invalid_argument(format!("invalid value for header '{}': {}", name, e))
            })?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn absolute_url(request: &HttpRequest) -> &Url {
        match request.target() {
            RequestTarget::Absolute(url) => url,
            RequestTarget::Relative(path) => panic!("expected absolute target, got '{}'", path),
        }
    }

    #[test]
    fn test_verb_constructors() {
        assert_eq!(RequestBuilder::get("/x").build().unwrap().method(), &Method::GET);
        assert_eq!(RequestBuilder::post("/x").build().unwrap().method(), &Method::POST);
        assert_eq!(RequestBuilder::put("/x").build().unwrap().method(), &Method::PUT);
        assert_eq!(RequestBuilder::patch("/x").build().unwrap().method(), &Method::PATCH);
        assert_eq!(RequestBuilder::delete("/x").build().unwrap().method(), &Method::DELETE);
        assert_eq!(RequestBuilder::head("/x").build().unwrap().method(), &Method::HEAD);
    }

    #[test]
    fn test_query_parameters_in_order() {
        let request = RequestBuilder::get("https://api.example.com/v1/ping")
            .query("foo", "bar")
            .query("p2", "p2")
            .build()
            .unwrap();
        assert_eq!(
            absolute_url(&request).as_str(),
            "https://api.example.com/v1/ping?foo=bar&p2=p2"
        );
    }

    #[test]
    fn test_multi_value_query_from_array_and_vec() {
        let from_array = RequestBuilder::get("https://api.example.com/v1/ping")
            .query_each("foo", ["bar", "bar2"])
            .build()
            .unwrap();
        assert_eq!(
            absolute_url(&from_array).query(),
            Some("foo=bar&foo=bar2")
        );

        let values: Vec<String> = vec!["bar".to_string(), "bar2".to_string()];
        let from_vec = RequestBuilder::get("https://api.example.com/v1/ping")
            .query_each("foo", values)
            .build()
            .unwrap();
        assert_eq!(from_array, from_vec);
    }

    #[test]
    fn test_non_ascii_query_encoding() {
        let request = RequestBuilder::get("https://api.example.com/v1/ping")
            .query("ä&ö", "ö=ü")
            .build()
            .unwrap();
        assert_eq!(
            absolute_url(&request).query(),
            Some("%C3%A4%26%C3%B6=%C3%B6%3D%C3%BC")
        );
    }

    #[test]
    fn test_query_appends_to_existing() {
        let request = RequestBuilder::get("https://api.example.com/v1/ping?a=1")
            .query("b", "2")
            .build()
            .unwrap();
        assert_eq!(absolute_url(&request).query(), Some("a=1&b=2"));
    }

    #[test]
    fn test_relative_target_keeps_encoded_query() {
        let request = RequestBuilder::get("/v1/ping")
            .query("foo", "bar")
            .build()
            .unwrap();
        assert_eq!(
            request.target(),
            &RequestTarget::Relative("/v1/ping?foo=bar".to_string())
        );
    }

    #[test]
    fn test_unsupported_scheme_rejected() {
        let result = RequestBuilder::get("ftp://api.example.com/v1/ping").build();
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn test_path_template_resolution() {
        let url = resolve_request_url(
            "/v1/workspaces/{workspace_id}/dialog_nodes/{dialog_node}",
            &["ws-123", "greeting node"],
        )
        .unwrap();
        assert_eq!(url, "/v1/workspaces/ws-123/dialog_nodes/greeting%20node");
    }

    #[test]
    fn test_path_parameter_cannot_add_segments() {
        let url = resolve_request_url("/v1/items/{id}", &["a/b"]).unwrap();
        assert_eq!(url, "/v1/items/a%2Fb");
    }

    #[test]
    fn test_path_parameter_count_mismatch() {
        assert!(resolve_request_url("/v1/items/{id}", &[]).is_err());
        assert!(resolve_request_url("/v1/items/{id}", &["a", "b"]).is_err());
        assert!(resolve_request_url("/v1/items", &["a"]).is_err());
    }

    #[test]
    fn test_unbalanced_template_rejected() {
        assert!(resolve_request_url("/v1/items/{id", &["a"]).is_err());
    }

    #[test]
    fn test_unresolved_placeholder_rejected_at_build() {
        let result = RequestBuilder::get("/v1/items/{id}").build();
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn test_non_ascii_path_parameter() {
        let url = resolve_request_url("/v1/items/{id}", &["münchen"]).unwrap();
        assert_eq!(url, "/v1/items/m%C3%BCnchen");
    }

    #[test]
    fn test_json_body() {
        let request = RequestBuilder::post("https://api.example.com/v1/items")
            .json(&serde_json::json!({"hello": "world"}))
            .unwrap()
            .build()
            .unwrap();
        match request.body() {
            RequestBody::Bytes { content_type, content } => {
                assert_eq!(content_type, "application/json");
                assert_eq!(content.as_ref(), br#"{"hello":"world"}"#);
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_json_patch_media_type_kept() {
        let patch = serde_json::json!([{"op": "replace", "path": "/name", "value": "x"}]);
        let request = RequestBuilder::patch("https://api.example.com/v1/items/1")
            .json_with_media_type(&patch, "application/json-patch+json")
            .unwrap()
            .build()
            .unwrap();
        match request.body() {
            RequestBody::Bytes { content_type, .. } => {
                assert_eq!(content_type, "application/json-patch+json");
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_non_json_media_type_rejected_for_json_body() {
        let result = RequestBuilder::post("https://api.example.com/v1/items")
            .json_with_media_type(&serde_json::json!({}), "text/plain");
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn test_form_body_encoding() {
        let request = RequestBuilder::post("https://api.example.com/token")
            .form(["grant_type", "client_credentials", "scope", "all"])
            .unwrap()
            .build()
            .unwrap();
        match request.body() {
            RequestBody::Bytes { content_type, content } => {
                assert_eq!(content_type, "application/x-www-form-urlencoded");
                assert_eq!(
                    content.as_ref(),
                    b"grant_type=client_credentials&scope=all"
                );
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_odd_form_arguments_rejected() {
        let result =
            RequestBuilder::post("https://api.example.com/token").form(["a", "b", "dangling"]);
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn test_raw_content_passthrough() {
        let payload: &[u8] = &[0x52, 0x49, 0x46, 0x46];
        let request = RequestBuilder::post("https://api.example.com/v1/audio")
            .content(Bytes::copy_from_slice(payload), media::AUDIO_WAV)
            .build()
            .unwrap();
        match request.body() {
            RequestBody::Bytes { content_type, content } => {
                assert_eq!(content_type, "audio/wav");
                assert_eq!(content.as_ref(), payload);
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_multipart_parts_accumulate() {
        let request = RequestBuilder::post("https://api.example.com/v1/upload")
            .part(FormPart::text("kind", "document"))
            .part(
                FormPart::new("file", Bytes::from_static(b"content"))
                    .with_filename("report.txt")
                    .with_content_type(media::TEXT_PLAIN),
            )
            .build()
            .unwrap();
        match request.body() {
            RequestBody::Multipart(parts) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(parts[0].name(), "kind");
                assert_eq!(parts[1].filename.as_deref(), Some("report.txt"));
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_last_body_call_wins() {
        let request = RequestBuilder::post("https://api.example.com/v1/items")
            .json(&serde_json::json!({"a": 1}))
            .unwrap()
            .form(["k", "v"])
            .unwrap()
            .build()
            .unwrap();
        match request.body() {
            RequestBody::Bytes { content_type, .. } => {
                assert_eq!(content_type, "application/x-www-form-urlencoded");
            }
            other => panic!("unexpected body {:?}", other),
        }

        let replaced = RequestBuilder::post("https://api.example.com/v1/items")
            .part(FormPart::text("a", "1"))
            .json(&serde_json::json!({"a": 1}))
            .unwrap()
            .build()
            .unwrap();
        assert!(matches!(replaced.body(), RequestBody::Bytes { .. }));
    }

    #[test]
    fn test_header_last_write_wins() {
        let request = RequestBuilder::get("https://api.example.com/v1/ping")
            .header("X-Token", "first")
            .header("X-Token", "second")
            .build()
            .unwrap();
        assert_eq!(request.headers().get("X-Token").unwrap(), "second");
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        let result = RequestBuilder::get("https://api.example.com/v1/ping")
            .header("bad header", "x")
            .build();
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn test_build_is_repeatable() {
        let builder = RequestBuilder::post("https://api.example.com/v1/items")
            .query("version", "2024-05-01")
            .header("X-Trace", "t1")
            .json(&serde_json::json!({"hello": "world"}))
            .unwrap();
        let first = builder.build().unwrap();
        let second = builder.build().unwrap();
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn prop_build_idempotent(pairs in proptest::collection::vec((".*", ".*"), 0..5)) {
            let mut builder = RequestBuilder::get("https://api.example.com/v1/ping");
            for (name, value) in &pairs {
                builder = builder.query(name, value);
            }
            let first = builder.build().unwrap();
            let second = builder.build().unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_query_roundtrips_through_encoding(name in ".*", value in ".*") {
            let request = RequestBuilder::get("https://api.example.com/v1/ping")
                .query(&name, &value)
                .build()
                .unwrap();
            let url = match request.target() {
                RequestTarget::Absolute(url) => url.clone(),
                RequestTarget::Relative(_) => unreachable!(),
            };
            let decoded: Vec<(String, String)> = url
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            prop_assert_eq!(decoded, vec![(name, value)]);
        }
    }
}
