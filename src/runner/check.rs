//! Step-driven expectation checks
//!
//! For every expectation the checker pins the dequeue limit to the
//! target step, waits for the processed counter to reach it, then
//! compares the queue and memory against the expected values. Findings
//! are collected as [`CheckError`]s; only chain failures abort.

use thiserror::Error;

use crate::chain::scale::Decode;
use crate::chain::{AccountId, Chain, MessageId, ProgramId, QueueNode, QueuedMessage};
use crate::common::{encode_hex, Error, Result};
use crate::fixture::{
    ExpectedMessage, Expectation, Fixture, MemoryRegion, ProgramMap, SHARED_MEMORY_BASE,
};

use super::poll::{PollPolicy, Poller};
use super::send::set_dequeue_limit_call;

/// A reported expectation failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckError {
    #[error("Step {step}: unable to get a message queue")]
    QueueUnavailable { step: u32 },

    #[error("Step {step}: expected {expected} messages in queue, found {actual}")]
    CountMismatch {
        step: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Step {step}, message #{index}: payload mismatch: expected {expected}, got {actual}")]
    PayloadMismatch {
        step: u32,
        index: usize,
        expected: String,
        actual: String,
    },

    #[error("Step {step}, message #{index}: destination mismatch: expected {expected}, got {actual}")]
    DestinationMismatch {
        step: u32,
        index: usize,
        expected: ProgramId,
        actual: ProgramId,
    },

    #[error("Step {step}, message #{index}: gas limit mismatch: expected {expected}, got {actual}")]
    GasLimitMismatch {
        step: u32,
        index: usize,
        expected: u64,
        actual: u64,
    },

    #[error("Step {step}: memory doesn't match at {at:#x}")]
    MemoryMismatch { step: u32, at: u64 },
}

/// Settings the checker needs
#[derive(Debug, Clone, Copy)]
pub struct CheckSettings {
    pub poll: PollPolicy,
    /// Maximum queue nodes read in one walk
    pub max_queue_len: usize,
}

/// Run every expectation of `fixture` in order
pub async fn check_expectations<C: Chain>(
    chain: &mut C,
    sudo: &AccountId,
    fixture: &Fixture,
    programs: &ProgramMap,
    settings: CheckSettings,
) -> Result<Vec<CheckError>> {
    let mut errors = Vec::new();
    for expectation in &fixture.expected {
        let step = expectation.step.ok_or_else(|| {
            Error::Config(format!("fixture '{}': expectation has no step", fixture.title))
        })?;
        errors.extend(check_step(chain, sudo, step, expectation, programs, settings).await?);
    }
    Ok(errors)
}

async fn check_step<C: Chain>(
    chain: &mut C,
    sudo: &AccountId,
    step: u32,
    expectation: &Expectation,
    programs: &ProgramMap,
    settings: CheckSettings,
) -> Result<Vec<CheckError>> {
    await_limit(chain, sudo, step, settings.poll).await?;
    await_step(chain, step, settings.poll).await?;
    tracing::debug!(step, "Step reached");

    let mut errors = Vec::new();

    if let Some(expected) = &expectation.messages {
        match read_queue(chain, settings.max_queue_len).await? {
            None => {
                errors.push(CheckError::QueueUnavailable { step });
                return Ok(errors);
            }
            Some(actual) => errors.extend(compare_messages(step, expected, &actual, programs)?),
        }
    }

    if let Some(snapshots) = &expectation.memory {
        for snapshot in snapshots {
            let region = snapshot.region()?;
            let memory = read_shared_memory(chain).await?;
            if !region_matches(memory.as_deref().unwrap_or_default(), &region) {
                errors.push(CheckError::MemoryMismatch {
                    step,
                    at: region.at,
                });
            }
        }
    }

    Ok(errors)
}

/// Wait until the dequeue limit equals `step`, writing it once if it differs
async fn await_limit<C: Chain>(chain: &mut C, sudo: &AccountId, step: u32, policy: PollPolicy) -> Result<()> {
    let what = format!("dequeue limit {}", step);
    let mut poller = Poller::new(policy, &what);
    let mut written = false;
    loop {
        match chain.dequeue_limit().await? {
            Some(limit) if limit == step => return Ok(()),
            Some(limit) if !written => {
                tracing::debug!(limit, step, "Adjusting dequeue limit");
                let call = set_dequeue_limit_call(&*chain, step)?;
                chain.submit(sudo, call).await?;
                written = true;
            }
            _ => {}
        }
        poller.wait().await?;
    }
}

/// Wait until exactly `step` messages have been processed
async fn await_step<C: Chain>(chain: &mut C, step: u32, policy: PollPolicy) -> Result<()> {
    let what = format!("step {}", step);
    let mut poller = Poller::new(policy, &what);
    let mut warned = false;
    loop {
        let processed = chain.messages_processed().await?.unwrap_or(0);
        if processed == step {
            return Ok(());
        }
        if processed > step && !warned {
            tracing::warn!(processed, step, "Chain processed past the target step");
            warned = true;
        }
        poller.wait().await?;
    }
}

/// Walk the on-chain queue from its head
///
/// Returns `None` when there is no head pointer.
pub async fn read_queue<C: Chain>(chain: &mut C, max_len: usize) -> Result<Option<Vec<QueuedMessage>>> {
    let layout = chain.layout().clone();
    let Some(raw_head) = chain.storage(&layout.queue_head_key()?).await? else {
        return Ok(None);
    };

    let mut messages = Vec::new();
    let mut cursor = Some(MessageId::decode("queue head", &raw_head)?);
    while let Some(id) = cursor {
        if messages.len() >= max_len {
            return Err(Error::QueueTooLong(max_len));
        }
        let raw = chain
            .storage(&layout.queue_node_key(id.as_bytes())?)
            .await?
            .ok_or_else(|| Error::decode("queue node", format!("missing node for {}", id)))?;
        let node = QueueNode::decode("queue node", &raw)?;
        cursor = node.next;
        messages.push(node.value);
    }
    Ok(Some(messages))
}

async fn read_shared_memory<C: Chain>(chain: &mut C) -> Result<Option<Vec<u8>>> {
    let key = chain.layout().shared_memory_key()?;
    chain
        .storage(&key)
        .await?
        .map(|raw| Vec::<u8>::decode("shared memory", &raw))
        .transpose()
}

/// Compare queue contents index by index
///
/// A count mismatch is reported alone; otherwise every field mismatch of
/// every message is reported.
pub fn compare_messages(
    step: u32,
    expected: &[ExpectedMessage],
    actual: &[QueuedMessage],
    programs: &ProgramMap,
) -> Result<Vec<CheckError>> {
    if expected.len() != actual.len() {
        return Ok(vec![CheckError::CountMismatch {
            step,
            expected: expected.len(),
            actual: actual.len(),
        }]);
    }

    let mut errors = Vec::new();
    for (index, (exp, act)) in expected.iter().zip(actual).enumerate() {
        if let Some(payload) = &exp.payload {
            let bytes = payload.encode(programs)?;
            if bytes != act.payload {
                errors.push(CheckError::PayloadMismatch {
                    step,
                    index,
                    expected: encode_hex(&bytes),
                    actual: encode_hex(&act.payload),
                });
            }
        }

        let destination = *programs
            .get(&exp.destination)
            .ok_or(Error::UnknownProgram(exp.destination))?;
        if destination != act.destination {
            errors.push(CheckError::DestinationMismatch {
                step,
                index,
                expected: destination,
                actual: act.destination,
            });
        }

        if let Some(gas_limit) = exp.gas_limit {
            if gas_limit != act.gas_limit {
                errors.push(CheckError::GasLimitMismatch {
                    step,
                    index,
                    expected: gas_limit,
                    actual: act.gas_limit,
                });
            }
        }
    }
    Ok(errors)
}

/// Whether `memory` holds `region.bytes` at `region.at`
///
/// Addresses are absolute; the snapshot starts at [`SHARED_MEMORY_BASE`].
/// Only bytes inside the region are read.
pub fn region_matches(memory: &[u8], region: &MemoryRegion) -> bool {
    let Some(offset) = region
        .at
        .checked_sub(SHARED_MEMORY_BASE)
        .and_then(|o| usize::try_from(o).ok())
    else {
        return false;
    };
    let Some(end) = offset.checked_add(region.bytes.len()) else {
        return false;
    };
    match memory.get(offset..end) {
        Some(live) => live == region.bytes.as_slice(),
        None => false,
    }
}
