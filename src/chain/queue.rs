//! On-chain message queue entries

use super::scale::{Decode, Encode, Input};
use super::{MessageId, ProgramId};
use crate::common::Result;

/// A message waiting in the node's queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub id: MessageId,
    pub source: ProgramId,
    pub destination: ProgramId,
    pub payload: Vec<u8>,
    pub gas_limit: u64,
    pub value: u128,
}

/// One link of the singly-linked queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueNode {
    pub value: QueuedMessage,
    pub next: Option<MessageId>,
}

impl Encode for QueuedMessage {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.id.encode_to(out);
        self.source.encode_to(out);
        self.destination.encode_to(out);
        self.payload.encode_to(out);
        self.gas_limit.encode_to(out);
        self.value.encode_to(out);
    }
}

impl Decode for QueuedMessage {
    fn decode_from(input: &mut Input<'_>) -> Result<Self> {
        Ok(Self {
            id: MessageId::decode_from(input)?,
            source: ProgramId::decode_from(input)?,
            destination: ProgramId::decode_from(input)?,
            payload: Vec::<u8>::decode_from(input)?,
            gas_limit: u64::decode_from(input)?,
            value: u128::decode_from(input)?,
        })
    }
}

impl Encode for QueueNode {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.value.encode_to(out);
        self.next.encode_to(out);
    }
}

impl Decode for QueueNode {
    fn decode_from(input: &mut Input<'_>) -> Result<Self> {
        Ok(Self {
            value: QueuedMessage::decode_from(input)?,
            next: Option::<MessageId>::decode_from(input)?,
        })
    }
}
