//! Persistence port and its sled adapter
//!
//! Every record the engine touches lives under a single key, and every
//! decision that must be race free is expressed as one `compare_and_swap`
//! against that key. Adapters must make that call linearizable per key.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::error::EngineError;

/// Point in time after which persistence calls are refused.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now().checked_add(timeout))
    }
    pub fn none() -> Self {
        Self(None)
    }
    pub fn expired() -> Self {
        Self(Some(Instant::now()))
    }
    pub fn has_passed(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }

    /// Errors with `StoreUnavailable` once the deadline has passed.
    pub fn check(&self, operation: &str) -> Result<(), EngineError> {
        if self.has_passed() {
            warn!(operation, "store deadline exceeded");
            return Err(EngineError::StoreUnavailable(format!(
                "deadline exceeded before {operation}"
            )));
        }
        Ok(())
    }
}

/// Outcome of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Swap {
    Applied,
    /// The stored value did not match; `current` is what is stored now.
    Rejected { current: Option<Vec<u8>> },
}

pub trait RecordPort: Send + Sync {
    fn get(&self, key: &str, deadline: &Deadline) -> Result<Option<Vec<u8>>, EngineError>;

    /// Replace the value at `key` with `new` only if it currently equals `expected`
    /// (`None` meaning absent). Atomic per key.
    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Option<Vec<u8>>,
        deadline: &Deadline,
    ) -> Result<Swap, EngineError>;

    /// All records whose key starts with `prefix`, in key order.
    fn scan_prefix(
        &self,
        prefix: &str,
        deadline: &Deadline,
    ) -> Result<Vec<(String, Vec<u8>)>, EngineError>;

    fn insert_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        deadline: &Deadline,
    ) -> Result<Swap, EngineError> {
        self.compare_and_swap(key, None, Some(value), deadline)
    }
}

pub struct SledPort {
    instance: Arc<sled::Db>,
}

impl SledPort {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self { instance }
    }
}

impl RecordPort for SledPort {
    fn get(&self, key: &str, deadline: &Deadline) -> Result<Option<Vec<u8>>, EngineError> {
        deadline.check("get")?;
        Ok(self.instance.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Option<Vec<u8>>,
        deadline: &Deadline,
    ) -> Result<Swap, EngineError> {
        deadline.check("compare_and_swap")?;
        match self.instance.compare_and_swap(key.as_bytes(), expected, new)? {
            Ok(()) => Ok(Swap::Applied),
            Err(err) => Ok(Swap::Rejected {
                current: err.current.map(|v| v.to_vec()),
            }),
        }
    }

    fn scan_prefix(
        &self,
        prefix: &str,
        deadline: &Deadline,
    ) -> Result<Vec<(String, Vec<u8>)>, EngineError> {
        deadline.check("scan_prefix")?;
        let mut records = vec![];
        for entry in self.instance.scan_prefix(prefix.as_bytes()) {
            let (key, value) = entry?;
            let key = String::from_utf8(key.to_vec())
                .map_err(|e| EngineError::Corrupt(e.to_string()))?;
            records.push((key, value.to_vec()));
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port() -> SledPort {
        let db = sled::Config::new().temporary(true).open().unwrap();
        SledPort::new(Arc::new(db))
    }

    #[test]
    fn insert_if_absent_only_once() {
        let port = port();
        let deadline = Deadline::none();

        assert_eq!(
            port.insert_if_absent("k", b"one".to_vec(), &deadline).unwrap(),
            Swap::Applied
        );
        assert_eq!(
            port.insert_if_absent("k", b"two".to_vec(), &deadline).unwrap(),
            Swap::Rejected {
                current: Some(b"one".to_vec())
            }
        );
        assert_eq!(port.get("k", &deadline).unwrap(), Some(b"one".to_vec()));
    }

    #[test]
    fn expired_deadline_touches_nothing() {
        let port = port();

        let err = port
            .insert_if_absent("k", b"one".to_vec(), &Deadline::expired())
            .unwrap_err();
        assert!(matches!(err, EngineError::StoreUnavailable(_)));
        assert_eq!(port.get("k", &Deadline::none()).unwrap(), None);
    }
}
