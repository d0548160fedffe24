//! # Mock OTA Provider
//!
//! Scriptable in-process provider for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::ota::provider::{ChannelBooking, Provider, ProviderError, PushScope, RoomListing};

/// A provider whose push/pull responses are scripted up front.
pub struct MockProvider {
    name: String,
    pushes: Mutex<VecDeque<Result<usize, ProviderError>>>,
    pulls: Mutex<VecDeque<Result<Vec<ChannelBooking>, ProviderError>>>,
    pushed_listings: Mutex<Vec<RoomListing>>,
    last_since: Mutex<Option<Option<DateTime<Utc>>>>,
    push_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        MockProvider {
            name: name.into(),
            pushes: Mutex::new(VecDeque::new()),
            pulls: Mutex::new(VecDeque::new()),
            pushed_listings: Mutex::new(Vec::new()),
            last_since: Mutex::new(None),
            push_calls: AtomicUsize::new(0),
        }
    }

    pub fn script_push(&self, response: Result<usize, ProviderError>) {
        self.pushes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
    }

    pub fn script_pull(&self, response: Result<Vec<ChannelBooking>, ProviderError>) {
        self.pulls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
    }

    /// Listings sent by the most recent push.
    pub fn last_pushed(&self) -> Vec<RoomListing> {
        self.pushed_listings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn push_calls(&self) -> usize {
        self.push_calls.load(Ordering::SeqCst)
    }

    /// The `since` watermark the most recent pull was asked for, or
    /// `None` if pull was never called.
    pub fn last_since(&self) -> Option<Option<DateTime<Utc>>> {
        *self.last_since.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn push(
        &self,
        listings: &[RoomListing],
        _scope: PushScope,
    ) -> Result<usize, ProviderError> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        *self
            .pushed_listings
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = listings.to_vec();

        self.pushes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(Ok(listings.len()))
    }

    async fn pull(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ChannelBooking>, ProviderError> {
        *self.last_since.lock().unwrap_or_else(|e| e.into_inner()) = Some(since);

        self.pulls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(Ok(Vec::new()))
    }
}
