//! Sending a fixture's messages

use crate::chain::scale::Encode;
use crate::chain::{AccountId, Bytes, Call, Chain, StorageItem};
use crate::common::config::GasConfig;
use crate::common::{Error, Result};
use crate::fixture::{Fixture, ProgramMap};

/// Sudo write of the dequeue limit
pub fn set_dequeue_limit_call<C: Chain + ?Sized>(chain: &C, limit: u32) -> Result<Call> {
    Ok(Call::SetStorage {
        items: vec![StorageItem {
            key: Bytes(chain.layout().dequeue_limit_key()?),
            value: Bytes(limit.encode()),
        }],
    }
    .sudo())
}

/// Build the batch of `send_message` calls for `fixture`
pub fn messages_call(fixture: &Fixture, programs: &ProgramMap, gas: &GasConfig) -> Result<Option<Call>> {
    if fixture.messages.is_empty() {
        return Ok(None);
    }

    let calls = fixture
        .messages
        .iter()
        .map(|message| {
            let destination = *programs
                .get(&message.destination)
                .ok_or(Error::UnknownProgram(message.destination))?;
            Ok(Call::SendMessage {
                destination,
                payload: Bytes(message.payload.encode(programs)?),
                gas_limit: gas.message_gas_limit,
                value: 0,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(Call::Batch { calls }))
}

/// Pin the dequeue limit to the first step, then send all messages in one batch
pub async fn send_messages<C: Chain>(
    chain: &mut C,
    signer: &AccountId,
    fixture: &Fixture,
    programs: &ProgramMap,
    gas: &GasConfig,
) -> Result<()> {
    let batch = messages_call(fixture, programs, gas)?;

    if let Some(step) = fixture.expected.first().and_then(|e| e.step) {
        let call = set_dequeue_limit_call(&*chain, step)?;
        chain.submit(signer, call).await?;
        tracing::debug!(step, "Dequeue limit set");
    }

    if let Some(batch) = batch {
        chain.submit(signer, batch).await?;
        tracing::info!(count = fixture.messages.len(), "Messages sent");
    }
    Ok(())
}
