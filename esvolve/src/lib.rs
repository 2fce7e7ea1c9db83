#![forbid(unsafe_code)]

mod engine;
mod error;
mod protocol;
mod repository;
mod request;

pub use engine::*;
pub use error::*;
pub use protocol::*;
pub use repository::*;
pub use request::*;
