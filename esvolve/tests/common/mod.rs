#![allow(dead_code)]

use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use esvolve::{Engine, MigrationError, Response, Result, ScriptRequest};
use parking_lot::Mutex;

enum Reply {
    Respond(u16, String),
    Fail(String),
}

/// Engine replaying a fixed queue of canned replies, one per call.
#[derive(Clone, Default)]
pub struct StubEngine {
    replies: Arc<Mutex<VecDeque<Reply>>>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: impl Into<String>) -> Self {
        self.replies
            .lock()
            .push_back(Reply::Respond(status, body.into()));
        self
    }

    pub fn fail(self, message: impl Into<String>) -> Self {
        self.replies.lock().push_back(Reply::Fail(message.into()));
        self
    }
}

#[async_trait]
impl Engine for StubEngine {
    async fn perform(&self, _request: &ScriptRequest) -> Result<Response> {
        match self.replies.lock().pop_front() {
            Some(Reply::Respond(status, body)) => Ok(Response::new(status, body)),
            Some(Reply::Fail(message)) => {
                Err(MigrationError::Transport(anyhow::anyhow!(message)))
            }
            None => Err(MigrationError::Transport(anyhow::anyhow!(
                "no canned reply left"
            ))),
        }
    }
}
