//! Single worker thread with a 1-slot, replace-latest query mailbox (§4.8).
//!
//! Users type quickly; a query that hasn't started running by the time the
//! next one arrives is stale and will never be delivered. The mailbox
//! enforces "at most one in-flight query, at most one queued query":
//! `submit` evicts (and cancels) whatever was waiting, and also raises the
//! cancellation flag of whatever is currently running. This replaces the
//! original's global queue-plus-terminate-flag singleton with an owned
//! actor whose shutdown is just `Drop` (§9 "Global-state query
//! coordinator").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::cancel::{CancellationHandle, CancellationToken};
use crate::query::QueryEngine;
use crate::types::{Query, SearchResult};

const MAILBOX_TIMEOUT: Duration = Duration::from_millis(500);

struct PendingQuery {
    query: Query,
    cancel: CancellationToken,
    handle: CancellationHandle,
}

struct Mailbox {
    slot: Mutex<Option<PendingQuery>>,
    wakeup: Condvar,
    running_cancel: Mutex<Option<CancellationHandle>>,
    shutdown: AtomicBool,
}

/// Owns the query engine and its dedicated worker thread.
pub struct Coordinator {
    mailbox: Arc<Mailbox>,
    worker: Option<JoinHandle<()>>,
}

impl Coordinator {
    pub fn new() -> Self {
        let mailbox = Arc::new(Mailbox {
            slot: Mutex::new(None),
            wakeup: Condvar::new(),
            running_cancel: Mutex::new(None),
            shutdown: AtomicBool::new(false),
        });
        let worker_mailbox = mailbox.clone();
        let worker = thread::Builder::new()
            .name("fsearch-coordinator".into())
            .spawn(move || worker_loop(worker_mailbox))
            .expect("failed to spawn query coordinator thread");
        Self {
            mailbox,
            worker: Some(worker),
        }
    }

    /// Deposits `query` in the mailbox. Any previously queued, not-yet-run
    /// query is immediately cancelled; the currently running query (if any)
    /// has its cancellation flag raised so it stops as soon as its workers
    /// next check it.
    pub fn submit(&self, query: Query) {
        let (cancel, handle) = CancellationToken::new();
        let pending = PendingQuery { query, cancel, handle };

        let evicted = {
            let mut slot = self.mailbox.slot.lock().unwrap();
            slot.replace(pending)
        };
        if let Some(evicted) = evicted {
            evicted.query.observer.on_cancelled();
        }
        if let Some(running) = self.mailbox.running_cancel.lock().unwrap().as_ref() {
            running.cancel();
        }
        self.mailbox.wakeup.notify_one();
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.mailbox.shutdown.store(true, Ordering::Release);
        self.mailbox.wakeup.notify_one();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop(mailbox: Arc<Mailbox>) {
    let engine = QueryEngine::new();
    loop {
        let pending = match take_next(&mailbox) {
            Some(p) => p,
            None => return,
        };

        *mailbox.running_cancel.lock().unwrap() = Some(pending.handle.clone());
        let snapshot = pending.query.database.snapshot();
        let outcome = engine.run(
            &pending.query.text,
            pending.query.flags,
            pending.query.filter.as_ref(),
            pending.query.max_results,
            &snapshot,
            &pending.cancel,
        );
        *mailbox.running_cancel.lock().unwrap() = None;

        deliver(pending.query, outcome);
    }
}

fn deliver(query: Query, outcome: crate::error::Result<Option<SearchResult>>) {
    match outcome {
        Ok(Some(result)) => query.observer.on_result(result),
        Ok(None) => query.observer.on_cancelled(),
        Err(err) => {
            // §7: query compile failures never surface as errors to the
            // caller; they resolve to a query that matches nothing.
            log::warn!("query failed to compile: {err}");
            query.observer.on_result(SearchResult::default());
        }
    }
}

/// Blocks (with a 500ms timeout) until a query is available or shutdown is
/// requested.
fn take_next(mailbox: &Arc<Mailbox>) -> Option<PendingQuery> {
    let mut slot = mailbox.slot.lock().unwrap();
    loop {
        if let Some(pending) = slot.take() {
            return Some(pending);
        }
        if mailbox.shutdown.load(Ordering::Acquire) {
            return None;
        }
        let (guard, timeout) = mailbox.wakeup.wait_timeout(slot, MAILBOX_TIMEOUT).unwrap();
        slot = guard;
        if timeout.timed_out() && slot.is_none() && mailbox.shutdown.load(Ordering::Acquire) {
            return None;
        }
    }
}
