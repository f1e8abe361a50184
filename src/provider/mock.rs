//! Scripted provider for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::GeocodeProvider;
use crate::error_handling::ProviderError;
use crate::models::Coordinates;

type Responder = Box<dyn Fn(&str) -> Result<Option<Coordinates>, ProviderError> + Send + Sync>;

/// Answers each query through a closure and records what was asked.
pub struct ScriptedProvider {
    respond: Responder,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&str) -> Result<Option<Coordinates>, ProviderError> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Never matches anything.
    pub fn empty() -> Self {
        Self::new(|_| Ok(None))
    }

    /// Matches queries starting with `prefix` (case-insensitive) at `coords`.
    pub fn matching(prefix: &'static str, coords: Coordinates) -> Self {
        Self::new(move |q| {
            Ok(q.to_lowercase()
                .starts_with(&prefix.to_lowercase())
                .then_some(coords))
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().expect("queries lock").clone()
    }
}

#[async_trait]
impl GeocodeProvider for ScriptedProvider {
    async fn lookup(
        &self,
        query: &str,
        _country_code: &str,
    ) -> Result<Option<Coordinates>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries
            .lock()
            .expect("queries lock")
            .push(query.to_string());
        (self.respond)(query)
    }
}
