use async_trait::async_trait;
use dyn_clone::DynClone;

use crate::{error::Result, request::ScriptRequest};

#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "memory")]
pub use memory::*;

#[cfg(feature = "http")]
mod http;
#[cfg(feature = "http")]
pub use http::*;

/// A raw response from the document store. Any delivered response is `Ok`,
/// whatever the status code; `Err` is reserved for transport failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_2xx(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}

#[async_trait]
pub trait Engine: DynClone + Send + Sync {
    async fn perform(&self, request: &ScriptRequest) -> Result<Response>;
}

dyn_clone::clone_trait_object!(Engine);
