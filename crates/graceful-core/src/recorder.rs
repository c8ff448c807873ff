//! Records the most recent normalized context per request.
//!
//! [`ContextRecorder`] is an [`Observer`]: attach it to retry sessions and it
//! keeps the latest response (or transport failure) seen, plus the latest
//! one per [`ErrorKey`]. Consumers poll it instead of threading a callback
//! through every call site.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::normalize::{NormalizedContext, TransportKind};
use crate::retry::{Failure, LifecycleEvent, Observer};

/// Lower-cased `url-method-body` identity of a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ErrorKey(String);

impl ErrorKey {
    /// `body` is the request payload, if any; it is rendered as compact JSON.
    pub fn new(url: &str, method: &str, body: Option<&Value>) -> Self {
        let body = body.map(Value::to_string).unwrap_or_default();
        ErrorKey(format!("{}-{}-{}", url, method, body).to_lowercase())
    }

    pub fn from_context(ctx: &NormalizedContext) -> Self {
        Self::new(&ctx.url, &ctx.method, None)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ErrorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default)]
struct Recorded {
    latest: Option<Arc<NormalizedContext>>,
    by_key: HashMap<ErrorKey, Arc<NormalizedContext>>,
}

#[derive(Debug, Default)]
pub struct ContextRecorder {
    /// When non-empty, only these exact URLs are recorded.
    urls: HashSet<String>,
    state: Mutex<Recorded>,
}

impl ContextRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict recording to the given URLs (exact match).
    pub fn with_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn latest(&self) -> Option<Arc<NormalizedContext>> {
        self.lock().latest.clone()
    }

    pub fn get(&self, key: &ErrorKey) -> Option<Arc<NormalizedContext>> {
        self.lock().by_key.get(key).cloned()
    }

    /// Number of distinct request keys recorded.
    pub fn len(&self) -> usize {
        self.lock().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().by_key.is_empty()
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.latest = None;
        state.by_key.clear();
    }

    /// Store `ctx` unless it is filtered out or identical to the latest one.
    pub fn record(&self, ctx: NormalizedContext) {
        if !self.urls.is_empty() && !self.urls.contains(&ctx.url) {
            return;
        }
        let mut state = self.lock();
        if state.latest.as_deref() == Some(&ctx) {
            return;
        }
        let ctx = Arc::new(ctx);
        state.by_key.insert(ErrorKey::from_context(&ctx), Arc::clone(&ctx));
        state.latest = Some(ctx);
    }

    // Every write leaves the state consistent, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Observer for ContextRecorder {
    fn on_event(&self, event: &LifecycleEvent<'_>) {
        if let Some(ctx) = event.context {
            self.record(ctx.clone());
        } else if let Some(resp) = event.response {
            self.record(crate::normalize::normalize(resp));
        } else if let Some(Failure::Transport(err)) = event.error {
            self.record(transport_failure_context(&err.to_string()));
        }
    }
}

/// Synthetic context for a failure that produced no response.
fn transport_failure_context(message: &str) -> NormalizedContext {
    NormalizedContext {
        kind: TransportKind::Streamed,
        url: String::new(),
        method: String::new(),
        status: 0,
        headers: HashMap::new(),
        body: Arc::new(serde_json::json!({ "message": message })),
        is_error: true,
    }
}
