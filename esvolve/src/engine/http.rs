use async_trait::async_trait;
use reqwest::Client;

use crate::{
    engine::{Engine, Response},
    error::Result,
    request::{HttpMethod, ScriptRequest},
};

/// Engine backed by a real cluster endpoint.
#[derive(Debug, Clone)]
pub struct HttpEngine {
    client: Client,
    base_url: String,
}

impl HttpEngine {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }
}

#[async_trait]
impl Engine for HttpEngine {
    async fn perform(&self, request: &ScriptRequest) -> Result<Response> {
        let url = format!("{}{}", self.base_url, request.get_path().unwrap_or("/"));
        let method = match request.http_method() {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, url);

        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }

        if !request.is_body_empty() {
            builder = builder.body(request.get_body().to_owned());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(Response { status, body })
    }
}
