//! Node client abstraction
//!
//! [`Chain`] is the contract the runner relies on: submit signed calls,
//! read raw storage and a couple of named state values. [`RpcChain`]
//! implements it over JSON-RPC; [`MockNode`] is an in-process stand-in
//! used by the tests.

pub mod mock;
pub mod queue;
pub mod rpc;
pub mod scale;
pub mod signer;

use std::fmt;

use async_trait::async_trait;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Serialize, Serializer};

use crate::common::config::StorageLayout;
use crate::common::{encode_hex, Error, Result};

pub use mock::MockNode;
pub use queue::{QueueNode, QueuedMessage};
pub use rpc::RpcChain;
use scale::Decode;

type Blake2b256 = Blake2b<U32>;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// Lowercase hex without the `0x` prefix
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl scale::Encode for $name {
            fn encode_to(&self, out: &mut Vec<u8>) {
                scale::Encode::encode_to(&self.0, out);
            }
        }

        impl scale::Decode for $name {
            fn decode_from(input: &mut scale::Input<'_>) -> Result<Self> {
                Ok(Self(<[u8; 32] as scale::Decode>::decode_from(input)?))
            }
        }
    };
}

id_type!(
    /// Content-addressed program identifier
    ProgramId
);
id_type!(
    /// Identifier of a queued message
    MessageId
);
id_type!(
    /// Account that signs submitted calls
    AccountId
);

impl ProgramId {
    /// Derive the program id the node assigns to `code` deployed with `salt`
    ///
    /// BLAKE2b-256 over `code ++ salt`.
    pub fn generate(code: &[u8], salt: &[u8]) -> Self {
        let mut hasher = Blake2b256::new();
        hasher.update(code);
        hasher.update(salt);
        Self(hasher.finalize().into())
    }
}

/// Byte string serialized as `0x`-prefixed hex
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Bytes(pub Vec<u8>);

impl fmt::Debug for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_hex(&self.0))
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(v: Vec<u8>) -> Self {
        Self(v)
    }
}

impl From<&[u8]> for Bytes {
    fn from(v: &[u8]) -> Self {
        Self(v.to_vec())
    }
}

impl Serialize for Bytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode_hex(&self.0))
    }
}

/// A raw storage write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageItem {
    pub key: Bytes,
    pub value: Bytes,
}

/// A runtime call, before signing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Call {
    /// `gear.submit_program`
    SubmitProgram {
        code: Bytes,
        salt: Bytes,
        init_payload: Bytes,
        gas_limit: u64,
        value: u128,
    },
    /// `gear.send_message`
    SendMessage {
        destination: ProgramId,
        payload: Bytes,
        gas_limit: u64,
        value: u128,
    },
    /// `system.set_storage`
    SetStorage { items: Vec<StorageItem> },
    /// `system.kill_storage`
    KillStorage { keys: Vec<Bytes> },
    /// `system.kill_prefix`
    KillPrefix { prefix: Bytes, subkeys: u32 },
    /// `utility.batch`
    Batch { calls: Vec<Call> },
    /// `sudo.sudo`
    Sudo { call: Box<Call> },
}

impl Call {
    /// Wrap this call in `sudo.sudo`
    pub fn sudo(self) -> Self {
        Call::Sudo {
            call: Box::new(self),
        }
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Call::SubmitProgram { .. } => "gear.submit_program",
            Call::SendMessage { .. } => "gear.send_message",
            Call::SetStorage { .. } => "system.set_storage",
            Call::KillStorage { .. } => "system.kill_storage",
            Call::KillPrefix { .. } => "system.kill_prefix",
            Call::Batch { .. } => "utility.batch",
            Call::Sudo { .. } => "sudo.sudo",
        }
    }
}

/// Remote collaborator contract of the node under test
#[async_trait]
pub trait Chain: Send {
    /// Storage layout the node uses
    fn layout(&self) -> &StorageLayout;

    /// Sign `call` as `signer` and submit it
    ///
    /// Returns once the node has accepted the extrinsic; in-block
    /// execution is not awaited.
    async fn submit(&mut self, signer: &AccountId, call: Call) -> Result<()>;

    /// Read a raw storage value
    async fn storage(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Current dequeue limit, if set
    async fn dequeue_limit(&mut self) -> Result<Option<u32>> {
        let key = self.layout().dequeue_limit_key()?;
        self.storage(&key)
            .await?
            .map(|raw| u32::decode("dequeue limit", &raw))
            .transpose()
    }

    /// Number of messages processed so far, if set
    async fn messages_processed(&mut self) -> Result<Option<u32>> {
        let key = self.layout().messages_processed_key()?;
        self.storage(&key)
            .await?
            .map(|raw| u32::decode("messages processed", &raw))
            .transpose()
    }

    /// The privileged account recorded in chain state
    async fn sudo_account(&mut self) -> Result<AccountId> {
        let key = self.layout().sudo_key_key()?;
        let raw = self.storage(&key).await?.ok_or(Error::SudoKeyMissing)?;
        AccountId::decode("sudo key", &raw)
    }
}
