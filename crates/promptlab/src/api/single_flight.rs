//! Deduplicate concurrent requests for the same resource.
//!
//! While a request for a key is in flight, later callers for that key await
//! the same shared future instead of starting another one. The entry is
//! removed once the request settles, so the next call after that starts a
//! fresh request.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

use super::ApiError;

type Flight<T> = Shared<BoxFuture<'static, Result<T, ApiError>>>;

pub struct SingleFlight<T> {
    in_flight: Mutex<HashMap<String, Flight<T>>>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> SingleFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `start()` for `key`, or join the request already running for it.
    pub async fn run<M, F>(&self, key: &str, start: M) -> Result<T, ApiError>
    where
        M: FnOnce() -> F,
        F: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let flight = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            match in_flight.get(key) {
                Some(existing) => {
                    debug!(key, "joining in-flight request");
                    existing.clone()
                }
                None => {
                    let flight = start().boxed().shared();
                    in_flight.insert(key.to_string(), flight.clone());
                    flight
                }
            }
        };

        let result = flight.clone().await;

        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if in_flight
            .get(key)
            .is_some_and(|current| Shared::ptr_eq(current, &flight))
        {
            in_flight.remove(key);
        }
        result
    }

    /// Number of keys with a request in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
