//! Scripted `rbd` replies for testing the collector without a Ceph cluster.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::time::Instant;

use super::{FetchError, StatusFetcher};

/// What the mock answers for one argument list.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Successful exit with this stdout.
    Output(Vec<u8>),
    /// Non-zero exit with this stderr.
    Fail { code: i32, stderr: String },
    /// The scrape deadline elapses during this call.
    Timeout,
}

/// In-memory fetcher keyed by the exact argument list.
///
/// Unscripted argument lists fail as if the binary could not be started.
/// Every call is recorded so tests can assert on invocation order.
#[derive(Debug, Default)]
pub struct MockFetcher {
    replies: HashMap<Vec<String>, MockReply>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a reply for `args`.
    pub fn reply<I, S>(mut self, args: I, reply: MockReply) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replies
            .insert(args.into_iter().map(Into::into).collect(), reply);
        self
    }

    /// Scripts a successful JSON reply for `args`.
    pub fn json<I, S>(self, args: I, body: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reply(args, MockReply::Output(body.as_bytes().to_vec()))
    }

    /// Argument lists received so far, in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        match self.calls.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, args: &[String]) {
        let mut calls = match self.calls.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        calls.push(args.to_vec());
    }
}

impl StatusFetcher for MockFetcher {
    async fn fetch(&self, _deadline: Instant, args: &[String]) -> Result<Vec<u8>, FetchError> {
        self.record(args);
        match self.replies.get(args) {
            Some(MockReply::Output(out)) => Ok(out.clone()),
            Some(MockReply::Fail { code, stderr }) => Err(FetchError::Exit {
                code: Some(*code),
                stderr: stderr.clone(),
            }),
            Some(MockReply::Timeout) => Err(FetchError::Timeout),
            None => Err(FetchError::Spawn(format!(
                "no scripted reply for `rbd {}`",
                args.join(" ")
            ))),
        }
    }
}
