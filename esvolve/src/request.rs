use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Head,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Head => "HEAD",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound call against the document store: method, relative path
/// (no host), headers and an append-only body buffer. Pure data, no I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRequest {
    http_method: HttpMethod,
    path: Option<String>,
    headers: HashMap<String, String>,
    body: String,
}

impl ScriptRequest {
    pub fn new(http_method: HttpMethod) -> Self {
        Self {
            http_method,
            path: None,
            headers: HashMap::new(),
            body: String::new(),
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Headers form a mapping, not a multi-map: re-adding a name
    /// overwrites its prior value.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Replaces any previously accumulated body.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Appends a fragment to the accumulated body.
    pub fn add_to_body(mut self, fragment: impl AsRef<str>) -> Self {
        self.body.push_str(fragment.as_ref());
        self
    }

    pub fn http_method(&self) -> HttpMethod {
        self.http_method
    }

    pub fn get_path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn get_body(&self) -> &str {
        &self.body
    }

    /// True iff zero characters have been accumulated, no matter how many
    /// empty appends happened.
    pub fn is_body_empty(&self) -> bool {
        self.body.is_empty()
    }
}
