//! Mock basecaller for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::basecaller::{BasecallSession, Basecaller, CalledRead, SessionError};
use crate::run_file::ReadRecord;

/// Mock implementation of the Basecaller trait.
///
/// Sessions default to answering every submitted read, in submission order,
/// with a fixed sequence. Tests take control through:
/// - `set_call_order`: emit results in an explicit order; reads missing
///   from the order are never answered, ids present but never submitted
///   are answered from their override (modelling a misbehaving peer)
/// - `set_called`: replace the result payload for one read id
/// - `set_open_error` / `set_collect_error` / `set_close_error`: fail the
///   next matching operation, consumed once
///
/// Open and close counts are tracked across sessions so tests can assert
/// the session lifecycle ran exactly once.
///
/// # Example
///
/// ```rust,ignore
/// let basecaller = MockBasecaller::new();
///
/// // Results come back in reverse submission order
/// basecaller.set_call_order(vec!["r-3", "r-2", "r-1"]).await;
///
/// // ... run the code under test ...
///
/// assert_eq!(basecaller.close_count().await, 1);
/// ```
#[derive(Debug)]
pub struct MockBasecaller {
    /// If set, the next open_session fails with this error.
    open_error: Arc<RwLock<Option<SessionError>>>,
    /// If set, the next collect fails with this error.
    collect_error: Arc<RwLock<Option<SessionError>>>,
    /// If set, the next close fails with this error.
    close_error: Arc<RwLock<Option<SessionError>>>,
    /// Explicit emission order; None emits in submission order.
    call_order: Arc<RwLock<Option<Vec<String>>>>,
    /// Result payload overrides by read id.
    overrides: Arc<RwLock<HashMap<String, CalledRead>>>,
    /// Read ids submitted across all sessions, in call order.
    submitted: Arc<RwLock<Vec<String>>>,
    opened: Arc<RwLock<u32>>,
    closed: Arc<RwLock<u32>>,
    /// How long an empty collect waits before reporting nothing.
    poll_delay: Arc<RwLock<Duration>>,
}

impl Default for MockBasecaller {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBasecaller {
    /// Create a new mock basecaller.
    pub fn new() -> Self {
        Self {
            open_error: Arc::new(RwLock::new(None)),
            collect_error: Arc::new(RwLock::new(None)),
            close_error: Arc::new(RwLock::new(None)),
            call_order: Arc::new(RwLock::new(None)),
            overrides: Arc::new(RwLock::new(HashMap::new())),
            submitted: Arc::new(RwLock::new(Vec::new())),
            opened: Arc::new(RwLock::new(0)),
            closed: Arc::new(RwLock::new(0)),
            poll_delay: Arc::new(RwLock::new(Duration::from_millis(10))),
        }
    }

    /// Emit results in this exact order instead of submission order.
    ///
    /// Submitted ids absent from the order are withheld forever; ids in
    /// the order that were never submitted emit their override if one
    /// exists.
    pub async fn set_call_order(&self, order: Vec<&str>) {
        *self.call_order.write().await = Some(order.into_iter().map(String::from).collect());
    }

    /// Replace the result payload for one read id.
    pub async fn set_called(&self, called: CalledRead) {
        self.overrides
            .write()
            .await
            .insert(called.read_id.clone(), called);
    }

    /// Configure the next open_session to fail with the given error.
    pub async fn set_open_error(&self, error: SessionError) {
        *self.open_error.write().await = Some(error);
    }

    /// Configure the next collect to fail with the given error.
    pub async fn set_collect_error(&self, error: SessionError) {
        *self.collect_error.write().await = Some(error);
    }

    /// Configure the next close to fail with the given error.
    pub async fn set_close_error(&self, error: SessionError) {
        *self.close_error.write().await = Some(error);
    }

    /// Set how long an empty collect waits before reporting nothing.
    pub async fn set_poll_delay(&self, delay: Duration) {
        *self.poll_delay.write().await = delay;
    }

    /// Read ids submitted across all sessions, in call order.
    pub async fn submitted_reads(&self) -> Vec<String> {
        self.submitted.read().await.clone()
    }

    /// Number of sessions successfully opened.
    pub async fn open_count(&self) -> u32 {
        *self.opened.read().await
    }

    /// Number of close calls made across all sessions.
    pub async fn close_count(&self) -> u32 {
        *self.closed.read().await
    }
}

#[async_trait]
impl Basecaller for MockBasecaller {
    fn name(&self) -> &str {
        "mock"
    }

    async fn open_session(&self) -> Result<Box<dyn BasecallSession>, SessionError> {
        if let Some(err) = self.open_error.write().await.take() {
            return Err(err);
        }

        *self.opened.write().await += 1;

        Ok(Box::new(MockBasecallSession {
            order: self.call_order.read().await.clone(),
            overrides: Arc::clone(&self.overrides),
            collect_error: Arc::clone(&self.collect_error),
            close_error: Arc::clone(&self.close_error),
            shared_submitted: Arc::clone(&self.submitted),
            closed_counter: Arc::clone(&self.closed),
            poll_delay: *self.poll_delay.read().await,
            reads: HashMap::new(),
            submission_order: Vec::new(),
            emitted: 0,
            closed: false,
        }))
    }
}

struct MockBasecallSession {
    /// Emission order snapshot taken at open; None means submission order.
    order: Option<Vec<String>>,
    overrides: Arc<RwLock<HashMap<String, CalledRead>>>,
    collect_error: Arc<RwLock<Option<SessionError>>>,
    close_error: Arc<RwLock<Option<SessionError>>>,
    shared_submitted: Arc<RwLock<Vec<String>>>,
    closed_counter: Arc<RwLock<u32>>,
    poll_delay: Duration,
    reads: HashMap<String, ReadRecord>,
    submission_order: Vec<String>,
    /// Results emitted so far, indexing into the active order.
    emitted: usize,
    closed: bool,
}

impl MockBasecallSession {
    async fn make_called(&self, read_id: &str) -> Option<CalledRead> {
        if let Some(called) = self.overrides.read().await.get(read_id) {
            return Some(called.clone());
        }
        self.reads.get(read_id).map(|_| CalledRead {
            read_id: read_id.to_string(),
            sequence: "ACGTACGT".to_string(),
            qstring: "IIIIIIII".to_string(),
            trimmed_samples: 0,
        })
    }

    async fn next_emission(&mut self) -> Option<CalledRead> {
        let next_id = match &self.order {
            Some(order) => order.get(self.emitted).cloned(),
            None => self.submission_order.get(self.emitted).cloned(),
        }?;

        let called = self.make_called(&next_id).await?;
        self.emitted += 1;
        Some(called)
    }
}

#[async_trait]
impl BasecallSession for MockBasecallSession {
    async fn submit(&mut self, read: &ReadRecord) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }

        self.shared_submitted.write().await.push(read.read_id.clone());
        self.submission_order.push(read.read_id.clone());
        self.reads.insert(read.read_id.clone(), read.clone());
        Ok(())
    }

    async fn collect(&mut self) -> Result<Option<CalledRead>, SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        if let Some(err) = self.collect_error.write().await.take() {
            return Err(err);
        }

        match self.next_emission().await {
            Some(called) => Ok(Some(called)),
            None => {
                tokio::time::sleep(self.poll_delay).await;
                Ok(None)
            }
        }
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }

        self.closed = true;
        *self.closed_counter.write().await += 1;

        match self.close_error.write().await.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
