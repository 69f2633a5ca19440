//! Fixture file data model
//!
//! Defines the data structures for deserializing fixture files and the
//! checks a test must pass before it is run.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Deserialize;

use crate::common::{decode_hex, Error, Result};

use super::payload::Payload;

/// Base address of shared memory: 256 wasm pages of 64 KiB
pub const SHARED_MEMORY_BASE: u64 = 256 * 65536;

/// A complete test loaded from one fixture file
#[derive(Deserialize, Debug)]
pub struct Test {
    /// Programs deployed at the start of every fixture
    #[serde(default)]
    pub programs: Vec<Program>,
    /// Scenarios run in order
    pub fixtures: Vec<Fixture>,
    /// File the test was loaded from
    #[serde(skip)]
    pub source: PathBuf,
}

/// A program to deploy
#[derive(Deserialize, Debug)]
pub struct Program {
    /// Fixture-local id referenced by messages and placeholders
    pub id: u64,
    /// Path to the code blob, relative to the fixture file
    pub path: PathBuf,
    /// Initialization payload (empty when absent)
    #[serde(default)]
    pub init_message: Option<Payload>,
}

/// One scenario: messages to send and what the chain should look like afterwards
#[derive(Deserialize, Debug)]
pub struct Fixture {
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub expected: Vec<Expectation>,
}

/// A message sent to a deployed program
#[derive(Deserialize, Debug)]
pub struct Message {
    /// Program id of the recipient
    pub destination: u64,
    pub payload: Payload,
}

/// Expected chain state once `step` messages have been processed
#[derive(Deserialize, Debug, Default)]
pub struct Expectation {
    pub step: Option<u32>,
    /// Exact queue contents, head first
    pub messages: Option<Vec<ExpectedMessage>>,
    /// Memory regions to compare
    pub memory: Option<Vec<MemorySnapshot>>,
}

/// Expected queued message
#[derive(Deserialize, Debug)]
pub struct ExpectedMessage {
    /// Program id of the recipient
    pub destination: u64,
    pub payload: Option<Payload>,
    pub gas_limit: Option<u64>,
}

/// Expected memory contents
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MemorySnapshot {
    /// Region of the shared memory snapshot
    Shared {
        /// Absolute address, hex
        at: String,
        /// Expected bytes, hex
        bytes: String,
    },
}

/// A memory snapshot with its fields decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub at: u64,
    pub bytes: Vec<u8>,
}

impl MemorySnapshot {
    pub fn region(&self) -> Result<MemoryRegion> {
        match self {
            MemorySnapshot::Shared { at, bytes } => {
                let digits = at.strip_prefix("0x").unwrap_or(at);
                let at = u64::from_str_radix(digits, 16).map_err(|e| Error::InvalidHex {
                    what: "memory address".to_string(),
                    error: e.to_string(),
                })?;
                Ok(MemoryRegion {
                    at,
                    bytes: decode_hex("memory bytes", bytes)?,
                })
            }
        }
    }
}

impl Test {
    /// Check that the test is runnable before touching the chain
    pub fn validate(&self) -> Result<()> {
        let mut declared = BTreeSet::new();
        for program in &self.programs {
            if !declared.insert(program.id) {
                return Err(Error::Config(format!(
                    "program id {} is declared more than once",
                    program.id
                )));
            }
        }

        let check_id = |id: u64, context: &dyn Fn() -> String| -> Result<()> {
            if declared.contains(&id) {
                Ok(())
            } else {
                Err(Error::Config(format!(
                    "{} refers to undeclared program {}",
                    context(),
                    id
                )))
            }
        };

        for program in &self.programs {
            if let Some(init) = &program.init_message {
                for id in init.placeholders() {
                    check_id(id, &|| format!("init message of program {}", program.id))?;
                }
            }
        }

        for fixture in &self.fixtures {
            let title = &fixture.title;
            for (i, message) in fixture.messages.iter().enumerate() {
                let context = || format!("fixture '{}': message #{}", title, i + 1);
                check_id(message.destination, &context)?;
                for id in message.payload.placeholders() {
                    check_id(id, &context)?;
                }
            }

            for (i, expectation) in fixture.expected.iter().enumerate() {
                let context = || format!("fixture '{}': expectation #{}", title, i + 1);
                if expectation.step.is_none() {
                    return Err(Error::Config(format!("{} has no step", context())));
                }
                for expected in expectation.messages.iter().flatten() {
                    check_id(expected.destination, &context)?;
                    for id in expected.payload.iter().flat_map(Payload::placeholders) {
                        check_id(id, &context)?;
                    }
                }
                for snapshot in expectation.memory.iter().flatten() {
                    snapshot.region()?;
                }
            }
        }

        Ok(())
    }
}
