//! Backends and data generators for exercising read channels in tests.

use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use rand::prelude::*;

use crate::codec::StorageObject;
use crate::error::TransportError;
use crate::interface::{FetchResult, StorageBackend};
use crate::options::ReadOptions;

/// Deterministic pseudo-random bytes.
pub fn random_data(size: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; size];
    rng.fill_bytes(&mut data);
    data
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// A single in-memory object whose content can be replaced, bumping its etag.
#[derive(Debug)]
pub struct MemoryBackend {
    state: Mutex<(Bytes, u64)>,
}

impl MemoryBackend {
    pub fn new(data: impl Into<Bytes>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new((data.into(), 1)),
        })
    }

    pub fn replace_content(&self, data: impl Into<Bytes>) {
        let mut state = lock(&self.state);
        state.0 = data.into();
        state.1 += 1;
    }

    pub fn etag(&self) -> String {
        format!("mem-{}", lock(&self.state).1)
    }
}

impl StorageBackend for MemoryBackend {
    fn fetch_range(
        &self,
        _object: &StorageObject,
        _options: &ReadOptions,
        offset: u64,
        length: u64,
    ) -> Result<FetchResult, TransportError> {
        let state = lock(&self.state);
        let data = &state.0;
        let start = (offset.min(data.len() as u64)) as usize;
        let end = (start as u64).saturating_add(length).min(data.len() as u64) as usize;
        Ok(FetchResult::new(format!("mem-{}", state.1), data.slice(start..end)))
    }
}

type FailureFn = Box<dyn Fn() -> TransportError + Send + Sync>;

struct FaultState {
    remaining_failures: usize,
    failure: FailureFn,
    etag_override: Option<String>,
    requests: Vec<(u64, u64)>,
}

/// Wraps another backend, recording every physical request and failing a scripted number of them.
pub struct FaultInjectingBackend {
    inner: Arc<dyn StorageBackend>,
    state: Mutex<FaultState>,
}

impl FaultInjectingBackend {
    pub fn new(inner: Arc<dyn StorageBackend>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            state: Mutex::new(FaultState {
                remaining_failures: 0,
                failure: Box::new(|| TransportError::Transient("injected failure".to_owned())),
                etag_override: None,
                requests: Vec::new(),
            }),
        })
    }

    /// The next `n` requests fail with a transient error.  Replaces any previous script.
    pub fn fail_next_transient(&self, n: usize) {
        self.fail_next_with(n, || TransportError::Transient("503 Service Unavailable (injected)".to_owned()));
    }

    /// The next `n` requests fail with the error produced by `failure`.
    pub fn fail_next_with(&self, n: usize, failure: impl Fn() -> TransportError + Send + Sync + 'static) {
        let mut state = lock(&self.state);
        state.remaining_failures = n;
        state.failure = Box::new(failure);
    }

    /// Reports `etag` on every successful response instead of the inner backend's etag.
    pub fn override_etag(&self, etag: Option<String>) {
        lock(&self.state).etag_override = etag;
    }

    /// Every `(offset, length)` requested so far, failed attempts included.
    pub fn requests(&self) -> Vec<(u64, u64)> {
        lock(&self.state).requests.clone()
    }

    pub fn attempts(&self) -> usize {
        lock(&self.state).requests.len()
    }
}

impl StorageBackend for FaultInjectingBackend {
    fn fetch_range(
        &self,
        object: &StorageObject,
        options: &ReadOptions,
        offset: u64,
        length: u64,
    ) -> Result<FetchResult, TransportError> {
        let etag_override = {
            let mut state = lock(&self.state);
            state.requests.push((offset, length));
            if state.remaining_failures > 0 {
                state.remaining_failures -= 1;
                return Err((state.failure)());
            }
            state.etag_override.clone()
        };

        let mut result = self.inner.fetch_range(object, options, offset, length)?;
        if let Some(etag) = etag_override {
            result.etag = etag;
        }
        Ok(result)
    }
}
