//! Storage reset before each fixture

use crate::chain::{AccountId, Bytes, Call, Chain};
use crate::common::Result;

use super::poll::{PollPolicy, Poller};

/// Hint for `system.kill_prefix`: how many keys the prefix may cover
const KILL_PREFIX_SUBKEYS: u32 = 10_000;

/// Build the sudo call that wipes the previous run's queue state
pub fn reset_call<C: Chain + ?Sized>(chain: &C) -> Result<Call> {
    let layout = chain.layout();
    Ok(Call::Batch {
        calls: vec![
            Call::KillStorage {
                keys: vec![
                    layout.dequeue_limit_key()?.into(),
                    layout.queue_head_key()?.into(),
                    layout.messages_processed_key()?.into(),
                ],
            },
            Call::KillPrefix {
                prefix: Bytes(layout.prefix_key()?),
                subkeys: KILL_PREFIX_SUBKEYS,
            },
        ],
    }
    .sudo())
}

/// Clear queue and program state, then wait until the queue head is gone
pub async fn reset_storage<C: Chain>(chain: &mut C, sudo: &AccountId, policy: PollPolicy) -> Result<()> {
    let call = reset_call(&*chain)?;
    chain.submit(sudo, call).await?;

    let head = chain.layout().queue_head_key()?;
    let mut poller = Poller::new(policy, "message queue head to be cleared");
    while chain.storage(&head).await?.is_some() {
        poller.wait().await?;
    }

    tracing::info!(attempts = poller.attempts(), "Storage reset");
    Ok(())
}
