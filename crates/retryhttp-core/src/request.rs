//! Replayable requests: method, URL, headers and an owned [`Body`].

use std::io;

use url::{form_urlencoded, Url};

use crate::body::Body;
use crate::retry::Error;

/// Ordered header list with case-insensitive lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name`, replacing any existing values for it.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.0.push((name, value.into()));
    }

    /// Adds a value without touching existing ones.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, name: &str) {
        self.0.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Content-Length` parsed as a number, if present and valid.
    pub fn content_length(&self) -> Option<u64> {
        self.get("content-length").and_then(|v| v.trim().parse().ok())
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.append(k, v);
        }
        headers
    }
}

/// A request that can be sent any number of times.
///
/// The body, if any, is owned here for the whole retry loop; transports only
/// ever borrow it through [`OutgoingRequest`].
#[derive(Debug)]
pub struct Request {
    method: String,
    url: Url,
    headers: Headers,
    body: Option<Body>,
}

impl Request {
    /// New request without a body. The method is upper-cased; the URL must parse.
    pub fn new(method: &str, url: &str) -> Result<Self, Error> {
        let parsed = Url::parse(url).map_err(|source| Error::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        Ok(Self::from_url(method, parsed))
    }

    pub fn from_url(method: &str, url: Url) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url,
            headers: Headers::new(),
            body: None,
        }
    }

    /// New request whose body comes from a plain reader; the reader is
    /// buffered immediately (see [`Body::from_reader`]).
    pub fn from_reader<R: io::Read>(method: &str, url: &str, reader: R) -> Result<Self, Error> {
        let body = Body::from_reader(reader)?;
        Ok(Self::new(method, url)?.with_body(body))
    }

    /// Request carrying `fields` as an `application/x-www-form-urlencoded` body.
    pub fn form<K, V>(method: &str, url: &str, fields: &[(K, V)]) -> Result<Self, Error>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut form = form_urlencoded::Serializer::new(String::new());
        for (k, v) in fields {
            form.append_pair(k.as_ref(), v.as_ref());
        }
        Ok(Self::new(method, url)?
            .header("Content-Type", "application/x-www-form-urlencoded")
            .with_body(form.finish()))
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Length to announce as `Content-Length`: the body's own length, else an
    /// explicit header set by the caller.
    pub fn content_length(&self) -> Option<u64> {
        match &self.body {
            Some(body) => body.len().or_else(|| self.headers.content_length()),
            None => None,
        }
    }

    pub(crate) fn rewind_body(&mut self) -> io::Result<()> {
        match self.body.as_mut() {
            Some(body) => body.rewind(),
            None => Ok(()),
        }
    }

    /// Read-only view for a transport, with mutable access to the body reader only.
    pub(crate) fn outgoing(&mut self) -> OutgoingRequest<'_> {
        let content_length = self.content_length();
        OutgoingRequest {
            method: &self.method,
            url: &self.url,
            headers: &self.headers,
            content_length,
            body: self.body.as_mut(),
        }
    }
}

/// What a [`Transport`](crate::transport::Transport) gets to see for one attempt.
///
/// Everything except the body reader is shared, so a transport cannot rewrite
/// the request, and since the body is only borrowed it cannot close it either.
#[derive(Debug)]
pub struct OutgoingRequest<'a> {
    pub method: &'a str,
    pub url: &'a Url,
    pub headers: &'a Headers,
    pub content_length: Option<u64>,
    pub body: Option<&'a mut Body>,
}
