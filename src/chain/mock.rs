//! In-process mock node
//!
//! Implements [`Chain`] over an in-memory storage map laid out the same
//! way as the real node: a linked message queue, a dequeue limit, a
//! processed counter, a shared-memory slot and the sudo key. Queued
//! messages are processed lazily, each time the processed counter is
//! read, up to the dequeue limit. Processing pops the head of the queue
//! and produces no outgoing messages.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::common::config::StorageLayout;
use crate::common::{Error, Result};

use super::queue::{QueueNode, QueuedMessage};
use super::scale::{Decode, Encode};
use super::{AccountId, Call, Chain, MessageId, ProgramId};

/// Test double for a live node
pub struct MockNode {
    layout: StorageLayout,
    storage: BTreeMap<Vec<u8>, Vec<u8>>,
    sudo: AccountId,
    submitted: Vec<(AccountId, Call)>,
    programs: Vec<ProgramId>,
    nonce: u64,
    paused: bool,
}

impl MockNode {
    /// Create a node with an empty state and `sudo` as the privileged account
    pub fn new(layout: StorageLayout, sudo: AccountId) -> Result<Self> {
        let mut storage = BTreeMap::new();
        storage.insert(layout.sudo_key_key()?, sudo.encode());
        Ok(Self {
            layout,
            storage,
            sudo,
            submitted: Vec::new(),
            programs: Vec::new(),
            nonce: 0,
            paused: false,
        })
    }

    /// Every call submitted so far, in order
    pub fn submitted(&self) -> &[(AccountId, Call)] {
        &self.submitted
    }

    /// Programs deployed so far, in order
    pub fn programs(&self) -> &[ProgramId] {
        &self.programs
    }

    /// Number of submitted storage writes touching `key`, including nested ones
    pub fn storage_writes(&self, key: &[u8]) -> usize {
        fn count(call: &Call, key: &[u8]) -> usize {
            match call {
                Call::SetStorage { items } => items.iter().filter(|i| i.key.0 == key).count(),
                Call::Batch { calls } => calls.iter().map(|c| count(c, key)).sum(),
                Call::Sudo { call } => count(call, key),
                _ => 0,
            }
        }
        self.submitted.iter().map(|(_, c)| count(c, key)).sum()
    }

    /// Stop (or resume) processing queued messages
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Replace the shared-memory snapshot
    pub fn set_shared_memory(&mut self, memory: Vec<u8>) -> Result<()> {
        let key = self.layout.shared_memory_key()?;
        self.storage.insert(key, memory.encode());
        Ok(())
    }

    /// Write a raw storage value directly
    pub fn put_raw(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.storage.insert(key, value);
    }

    /// Messages currently queued, head first
    pub fn queued(&self) -> Result<Vec<QueuedMessage>> {
        let mut out = Vec::new();
        let mut cursor = self.read::<MessageId>(&self.layout.queue_head_key()?, "queue head")?;
        while let Some(id) = cursor {
            let node: QueueNode = self
                .read(&self.layout.queue_node_key(id.as_bytes())?, "queue node")?
                .ok_or_else(|| Error::decode("queue node", format!("dangling link {}", id)))?;
            cursor = node.next;
            out.push(node.value);
        }
        Ok(out)
    }

    fn read<T: Decode>(&self, key: &[u8], what: &str) -> Result<Option<T>> {
        self.storage
            .get(key)
            .map(|raw| T::decode(what, raw))
            .transpose()
    }

    fn next_message_id(&mut self) -> MessageId {
        self.nonce += 1;
        MessageId(ProgramId::generate(b"mock-message", &self.nonce.to_le_bytes()).0)
    }

    fn enqueue(&mut self, source: ProgramId, destination: ProgramId, payload: Vec<u8>, gas_limit: u64) -> Result<()> {
        let id = self.next_message_id();
        let node = QueueNode {
            value: QueuedMessage {
                id,
                source,
                destination,
                payload,
                gas_limit,
                value: 0,
            },
            next: None,
        };
        self.storage
            .insert(self.layout.queue_node_key(id.as_bytes())?, node.encode());

        let head_key = self.layout.queue_head_key()?;
        let Some(mut cursor) = self.read::<MessageId>(&head_key, "queue head")? else {
            self.storage.insert(head_key, id.encode());
            return Ok(());
        };

        loop {
            let key = self.layout.queue_node_key(cursor.as_bytes())?;
            let mut tail: QueueNode = self
                .read(&key, "queue node")?
                .ok_or_else(|| Error::decode("queue node", format!("dangling link {}", cursor)))?;
            match tail.next {
                Some(next) => cursor = next,
                None => {
                    tail.next = Some(id);
                    self.storage.insert(key, tail.encode());
                    return Ok(());
                }
            }
        }
    }

    /// Process queued messages up to the dequeue limit
    fn process(&mut self) -> Result<()> {
        if self.paused {
            return Ok(());
        }

        let processed_key = self.layout.messages_processed_key()?;
        let head_key = self.layout.queue_head_key()?;
        let limit = self.read::<u32>(&self.layout.dequeue_limit_key()?, "dequeue limit")?;
        let mut processed = self
            .read::<u32>(&processed_key, "messages processed")?
            .unwrap_or(0);

        while limit.map_or(true, |l| processed < l) {
            let Some(head) = self.read::<MessageId>(&head_key, "queue head")? else {
                break;
            };
            let node_key = self.layout.queue_node_key(head.as_bytes())?;
            let node: Option<QueueNode> = self.read(&node_key, "queue node")?;
            self.storage.remove(&node_key);
            match node.and_then(|n| n.next) {
                Some(next) => {
                    self.storage.insert(head_key.clone(), next.encode());
                }
                None => {
                    self.storage.remove(&head_key);
                }
            }
            processed += 1;
            self.storage.insert(processed_key.clone(), processed.encode());
        }
        Ok(())
    }

    fn apply(&mut self, signer: &AccountId, call: &Call, privileged: bool) -> Result<()> {
        match call {
            Call::SubmitProgram {
                code,
                salt,
                init_payload,
                gas_limit,
                ..
            } => {
                let id = ProgramId::generate(&code.0, &salt.0);
                self.programs.push(id);
                self.enqueue(ProgramId(signer.0), id, init_payload.0.clone(), *gas_limit)
            }
            Call::SendMessage {
                destination,
                payload,
                gas_limit,
                ..
            } => self.enqueue(ProgramId(signer.0), *destination, payload.0.clone(), *gas_limit),
            Call::Batch { calls } => {
                for inner in calls {
                    self.apply(signer, inner, privileged)?;
                }
                Ok(())
            }
            Call::Sudo { call } => {
                if *signer != self.sudo {
                    return Err(Error::rpc("author_submitExtrinsic", "sudo: RequireSudo"));
                }
                self.apply(signer, call, true)
            }
            _ if !privileged => Err(Error::rpc(
                "author_submitExtrinsic",
                format!("{}: BadOrigin", call.name()),
            )),
            Call::SetStorage { items } => {
                for item in items {
                    self.storage.insert(item.key.0.clone(), item.value.0.clone());
                }
                Ok(())
            }
            Call::KillStorage { keys } => {
                for key in keys {
                    self.storage.remove(&key.0);
                }
                Ok(())
            }
            Call::KillPrefix { prefix, .. } => {
                let sudo_key = self.layout.sudo_key_key()?;
                self.storage
                    .retain(|k, _| !k.starts_with(&prefix.0) || *k == sudo_key);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Chain for MockNode {
    fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    async fn submit(&mut self, signer: &AccountId, call: Call) -> Result<()> {
        tracing::debug!(call = call.name(), "Mock node received call");
        self.submitted.push((*signer, call.clone()));
        self.apply(signer, &call, false)
    }

    async fn storage(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.storage.get(key).cloned())
    }

    async fn messages_processed(&mut self) -> Result<Option<u32>> {
        self.process()?;
        let key = self.layout.messages_processed_key()?;
        self.read(&key, "messages processed")
    }
}
