//! A live transaction: one action invocation's IO client and loading state.

use std::sync::Arc;

use host_protocol::io_client::IoClient;
use host_protocol::loading::TransactionLoadingState;
use uuid::Uuid;

/// Created on `START_TRANSACTION`, destroyed after `MARK_TRANSACTION_COMPLETE`
/// or a terminal cancel. The Host keeps at most one live `Transaction` per
/// `tx_id`.
pub struct Transaction {
    pub tx_id: Uuid,
    pub action_name: String,
    pub io_client: Arc<IoClient>,
    pub loading: Arc<TransactionLoadingState>,
}

impl Transaction {
    #[must_use]
    pub fn new(
        tx_id: Uuid,
        action_name: String,
        io_client: Arc<IoClient>,
        loading: Arc<TransactionLoadingState>,
    ) -> Self {
        Self { tx_id, action_name, io_client, loading }
    }
}
