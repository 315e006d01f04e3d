//! Scriptable in-process remote for sync tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::models::{CollectionName, PhotoUpload, Record};
use crate::remote::{PhotoReceipt, RemoteError, RemoteResult, RemoteService};

use super::ConnectivityState;

/// A call the remote received, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RemoteCall {
    Fetch(String),
    Update { sheet: String, data: Record },
    Upload { site_id: String, caption: String, bytes: Vec<u8> },
    Ping,
}

#[derive(Default)]
struct MockState {
    collections: HashMap<String, Vec<Record>>,
    failing_fetches: HashSet<String>,
    write_outcomes: VecDeque<bool>,
    fail_all_writes: bool,
    reachable: bool,
    drop_connection: Option<(usize, ConnectivityState)>,
    calls: Vec<RemoteCall>,
}

#[derive(Default)]
pub(crate) struct MockRemote {
    state: Mutex<MockState>,
    fetch_delay: Mutex<Duration>,
    write_delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockRemote {
    pub(crate) fn new() -> Self {
        let remote = Self::default();
        remote.lock().reachable = true;
        remote
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn serve(&self, collection: &str, records: Vec<Record>) {
        self.lock().collections.insert(collection.to_string(), records);
    }

    /// Fetches of this collection answer HTTP 500.
    pub(crate) fn fail_fetch(&self, collection: &str) {
        self.lock().failing_fetches.insert(collection.to_string());
    }

    /// Outcomes for the next writes, in order; `false` fails the write.
    pub(crate) fn script_writes(&self, outcomes: &[bool]) {
        self.lock().write_outcomes.extend(outcomes.iter().copied());
    }

    pub(crate) fn fail_all_writes(&self, fail: bool) {
        self.lock().fail_all_writes = fail;
    }

    pub(crate) fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Flip `state` offline once `writes` writes have been received.
    pub(crate) fn drop_connection_after(&self, writes: usize, state: ConnectivityState) {
        self.lock().drop_connection = Some((writes, state));
    }

    pub(crate) fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = delay;
    }

    pub(crate) fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock().unwrap() = delay;
    }

    pub(crate) fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    pub(crate) fn updates(&self) -> Vec<Record> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::Update { data, .. } => Some(data),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn max_concurrent_fetches(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn record_write(&self, call: RemoteCall) -> RemoteResult<()> {
        let delay = *self.write_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        state.calls.push(call);

        let writes = state
            .calls
            .iter()
            .filter(|call| matches!(call, RemoteCall::Update { .. } | RemoteCall::Upload { .. }))
            .count();
        if let Some((after, connectivity)) = &state.drop_connection {
            if writes >= *after {
                connectivity.set_online(false);
            }
        }

        let succeeds = state.write_outcomes.pop_front().unwrap_or(true) && !state.fail_all_writes;
        if succeeds {
            Ok(())
        } else {
            Err(RemoteError::Status {
                status: 503,
                body: "scripted failure".to_string(),
            })
        }
    }
}

impl RemoteService for MockRemote {
    async fn fetch(
        &self,
        collection: &CollectionName,
        _params: &[(String, String)],
    ) -> RemoteResult<Vec<Record>> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = *self.fetch_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = {
            let mut state = self.lock();
            state.calls.push(RemoteCall::Fetch(collection.to_string()));
            if state.failing_fetches.contains(collection.as_str()) {
                Err(RemoteError::Status {
                    status: 500,
                    body: "scripted failure".to_string(),
                })
            } else {
                Ok(state
                    .collections
                    .get(collection.as_str())
                    .cloned()
                    .unwrap_or_default())
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn update(
        &self,
        collection: &CollectionName,
        record: &Record,
        _timestamp: &str,
    ) -> RemoteResult<()> {
        self.record_write(RemoteCall::Update {
            sheet: collection.to_string(),
            data: record.clone(),
        })
        .await
    }

    async fn upload_photo(
        &self,
        site_id: &str,
        caption: &str,
        photo: &PhotoUpload,
    ) -> RemoteResult<PhotoReceipt> {
        self.record_write(RemoteCall::Upload {
            site_id: site_id.to_string(),
            caption: caption.to_string(),
            bytes: photo.bytes.clone(),
        })
        .await?;
        Ok(PhotoReceipt {
            url: Some(format!("https://drive.example/{}", photo.file_name)),
        })
    }

    async fn ping(&self) -> RemoteResult<()> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Ping);
        if state.reachable {
            Ok(())
        } else {
            Err(RemoteError::Api("unreachable".to_string()))
        }
    }
}
