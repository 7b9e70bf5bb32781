//! Transaction loading state: a best-effort progress side channel for an
//! action running non-interactively.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;

/// `{ title?, description?, itemsInQueue?, itemsCompleted? }`. Monotone:
/// once `itemsInQueue` is set, `itemsCompleted` starts at 0 unless already
/// defined; `completeOne` only increments.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_in_queue: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_completed: Option<u64>,
}

/// Options accepted by `start`/`update`.
#[derive(Debug, Clone, Default)]
pub struct LoadingOpts {
    pub title: Option<String>,
    pub description: Option<String>,
    pub items_in_queue: Option<u64>,
}

type Transmit = Arc<dyn Fn(LoadingState) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send>> + Send + Sync>;

/// Side channel for reporting progress while an action runs. All transmit
/// failures are logged, never surfaced as an error: loading updates are
/// best-effort.
pub struct TransactionLoadingState {
    transmit: Transmit,
    state: Mutex<Option<LoadingState>>,
}

impl TransactionLoadingState {
    #[must_use]
    pub fn new(transmit: Transmit) -> Self {
        Self { transmit, state: Mutex::new(None) }
    }

    /// Establish a fresh loading state, initializing `itemsCompleted = 0`
    /// when `itemsInQueue` is given.
    pub async fn start(&self, opts: LoadingOpts) {
        let state = LoadingState {
            title: opts.title,
            description: opts.description,
            items_in_queue: opts.items_in_queue,
            items_completed: opts.items_in_queue.map(|_| 0),
        };
        *self.state.lock() = Some(state.clone());
        self.send(state).await;
    }

    /// Merge fields into the existing state. If `start` was never called,
    /// warns and redirects to `start`.
    pub async fn update(&self, opts: LoadingOpts) {
        let existing = self.state.lock().clone();
        let Some(mut current) = existing else {
            warn!("TransactionLoadingState::update called before start; redirecting");
            self.start(opts).await;
            return;
        };

        if opts.title.is_some() {
            current.title = opts.title;
        }
        if opts.description.is_some() {
            current.description = opts.description;
        }
        if opts.items_in_queue.is_some() {
            current.items_in_queue = opts.items_in_queue;
            if current.items_completed.is_none() {
                current.items_completed = Some(0);
            }
        }

        *self.state.lock() = Some(current.clone());
        self.send(current).await;
    }

    /// Increment `itemsCompleted` by one. Only meaningful once
    /// `itemsInQueue` is set; otherwise warns and does not send.
    pub async fn complete_one(&self) {
        let mut current = self.state.lock().clone();
        let Some(state) = &mut current else {
            warn!("TransactionLoadingState::complete_one called before start");
            return;
        };
        if state.items_in_queue.is_none() {
            warn!("TransactionLoadingState::complete_one called without itemsInQueue");
            return;
        }
        state.items_completed = Some(state.items_completed.unwrap_or(0) + 1);
        *self.state.lock() = current.clone();
        self.send(current.unwrap()).await;
    }

    async fn send(&self, state: LoadingState) {
        if let Err(err) = (self.transmit)(state).await {
            warn!(error = %err, "failed to transmit loading state update");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_transmit() -> (Transmit, Arc<Mutex<Vec<LoadingState>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sent2 = sent.clone();
        let transmit: Transmit = Arc::new(move |state: LoadingState| {
            let sent = sent2.clone();
            Box::pin(async move {
                sent.lock().push(state);
                Ok(())
            })
        });
        (transmit, sent)
    }

    #[tokio::test]
    async fn start_with_queue_initializes_completed_to_zero() {
        let (transmit, sent) = recording_transmit();
        let loading = TransactionLoadingState::new(transmit);
        loading.start(LoadingOpts { items_in_queue: Some(5), ..Default::default() }).await;
        assert_eq!(sent.lock().last().unwrap().items_completed, Some(0));
    }

    #[tokio::test]
    async fn complete_one_is_monotone() {
        let (transmit, sent) = recording_transmit();
        let loading = TransactionLoadingState::new(transmit);
        loading.start(LoadingOpts { items_in_queue: Some(3), ..Default::default() }).await;
        loading.complete_one().await;
        loading.complete_one().await;
        assert_eq!(sent.lock().last().unwrap().items_completed, Some(2));
    }

    #[tokio::test]
    async fn complete_one_without_queue_is_a_no_op() {
        let (transmit, sent) = recording_transmit();
        let loading = TransactionLoadingState::new(transmit);
        loading.start(LoadingOpts::default()).await;
        let before = sent.lock().len();
        loading.complete_one().await;
        assert_eq!(sent.lock().len(), before, "no additional transmit should occur");
    }

    #[tokio::test]
    async fn update_before_start_redirects_to_start() {
        let (transmit, sent) = recording_transmit();
        let loading = TransactionLoadingState::new(transmit);
        loading.update(LoadingOpts { title: Some("hi".into()), ..Default::default() }).await;
        assert_eq!(sent.lock().last().unwrap().title.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn counts_never_decrease_across_updates() {
        let (transmit, sent) = recording_transmit();
        let loading = TransactionLoadingState::new(transmit);
        loading.start(LoadingOpts { items_in_queue: Some(10), ..Default::default() }).await;
        loading.complete_one().await;
        let after_one = sent.lock().last().unwrap().items_completed;
        loading.update(LoadingOpts { title: Some("still going".into()), ..Default::default() }).await;
        let after_update = sent.lock().last().unwrap().items_completed;
        assert_eq!(after_one, after_update);
    }
}
