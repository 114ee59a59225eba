//! Builders to construct a client/dispatcher pair from configuration.

use std::sync::Arc;

use crate::config::QueueConfig;
use crate::core::{Client, Dispatcher, JobStore, Processor, QueueError};

/// Build a queue from `cfg`, returning the client and the dispatcher that
/// share one job store.
///
/// # Errors
///
/// Returns `QueueError::InvalidConfiguration` if `cfg` fails validation.
pub fn build_queue<P: Processor>(
    cfg: QueueConfig,
    processor: P,
) -> Result<(Client, Dispatcher<P>), QueueError> {
    cfg.validate()
        .map_err(|e| QueueError::InvalidConfiguration(format!("config invalid: {e}")))?;

    let store = Arc::new(JobStore::new());
    let client = Client::new(Arc::clone(&store));
    let dispatcher = Dispatcher::new(store, processor, cfg);
    Ok((client, dispatcher))
}
