//! Scripted [`DkimRecordFetcher`] for tests.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::Utc;
use hickory_resolver::error::ResolveError;

use super::fetcher::{dkim_dns_name, DkimDnsRecord, DkimRecordFetcher, FetchError};

#[derive(Debug, Clone)]
enum Answer {
    Key(String),
    Fail(String),
}

/// Answers lookups from a map instead of DNS.
/// Names without an answer resolve to nothing. Every lookup is logged.
#[derive(Debug, Default)]
pub struct StaticDkimFetcher {
    answers: Mutex<HashMap<(String, String), Answer>>,
    lookups: Mutex<Vec<(String, String)>>,
}

impl StaticDkimFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `value` for the pair.
    pub fn publish(&self, domain: &str, selector: &str, value: &str) {
        lock(&self.answers).insert(
            (domain.to_string(), selector.to_string()),
            Answer::Key(value.to_string()),
        );
    }

    /// Make lookups of the pair fail with a resolver error.
    pub fn fail(&self, domain: &str, selector: &str, reason: &str) {
        lock(&self.answers).insert(
            (domain.to_string(), selector.to_string()),
            Answer::Fail(reason.to_string()),
        );
    }

    /// All lookups so far, in call order.
    pub fn lookups(&self) -> Vec<(String, String)> {
        lock(&self.lookups).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl DkimRecordFetcher for StaticDkimFetcher {
    async fn fetch(
        &self,
        domain: &str,
        selector: &str,
    ) -> Result<Option<DkimDnsRecord>, FetchError> {
        let name = dkim_dns_name(domain, selector)?;
        let key = (domain.to_string(), selector.to_string());
        lock(&self.lookups).push(key.clone());
        let answer = lock(&self.answers).get(&key).cloned();
        match answer {
            None => Ok(None),
            Some(Answer::Key(value)) => Ok(Some(DkimDnsRecord {
                value,
                timestamp: Utc::now(),
            })),
            Some(Answer::Fail(reason)) => Err(FetchError::Resolve {
                name,
                source: ResolveError::from(reason),
            }),
        }
    }
}
