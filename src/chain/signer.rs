//! External extrinsic signer
//!
//! Extrinsic encoding and signing are delegated to a separate command.
//! It receives one JSON sign request on stdin and must print the
//! hex-encoded signed extrinsic on stdout.

use std::path::PathBuf;
use std::process::Stdio;

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::common::config::SignerConfig;
use crate::common::{decode_hex, Error, Result};

use super::{AccountId, Call};

/// What the signer command reads on stdin
#[derive(Debug, Serialize)]
pub struct SignRequest<'a> {
    pub signer: &'a AccountId,
    pub call: &'a Call,
}

/// Signer backed by an external executable
#[derive(Debug, Clone)]
pub struct ExternalSigner {
    program: PathBuf,
    args: Vec<String>,
}

impl ExternalSigner {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &SignerConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    /// Check the signer executable can be found
    pub fn locate(&self) -> Result<PathBuf> {
        which::which(&self.program)
            .map_err(|_| Error::ToolNotFound(self.program.display().to_string()))
    }

    /// Sign `call` on behalf of `signer`, returning the `0x` extrinsic
    pub async fn sign(&self, signer: &AccountId, call: &Call) -> Result<String> {
        let request = serde_json::to_vec(&SignRequest { signer, call })?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::Signer(format!(
                    "Failed to start {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Signer("Failed to get signer stdin".to_string()))?;
        let writer = tokio::spawn(async move {
            stdin.write_all(&request).await?;
            stdin.shutdown().await
        });

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(Error::Signer(format!(
                "{} exited with {:?}: {}",
                self.program.display(),
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(Error::Signer(format!("Failed to write sign request: {}", e))),
            Err(e) => return Err(Error::Signer(format!("Sign request writer failed: {}", e))),
        }

        let extrinsic = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !extrinsic.starts_with("0x") {
            return Err(Error::Signer(format!(
                "expected a 0x-prefixed extrinsic, got '{}'",
                extrinsic
            )));
        }
        decode_hex("signed extrinsic", &extrinsic)?;

        tracing::debug!(call = call.name(), len = extrinsic.len(), "Call signed");
        Ok(extrinsic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Bytes;

    fn kill_call() -> Call {
        Call::KillStorage {
            keys: vec![Bytes(b"g::msg::head".to_vec())],
        }
        .sudo()
    }

    #[test]
    fn test_sign_request_shape() {
        let signer = AccountId([0xd4; 32]);
        let call = kill_call();
        let json = serde_json::to_value(SignRequest {
            signer: &signer,
            call: &call,
        })
        .unwrap();
        assert_eq!(json["signer"], format!("0x{}", "d4".repeat(32)));
        assert_eq!(json["call"]["type"], "sudo");
        assert_eq!(json["call"]["call"]["type"], "kill_storage");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sign_reads_stdout() {
        let signer = ExternalSigner::new(
            "sh",
            vec!["-c".to_string(), "cat > /dev/null; echo 0xdeadbeef".to_string()],
        );
        let extrinsic = signer.sign(&AccountId::default(), &kill_call()).await.unwrap();
        assert_eq!(extrinsic, "0xdeadbeef");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sign_failure_reports_stderr() {
        let signer = ExternalSigner::new(
            "sh",
            vec![
                "-c".to_string(),
                "cat > /dev/null; echo 'unknown account' >&2; exit 3".to_string(),
            ],
        );
        let err = signer.sign(&AccountId::default(), &kill_call()).await.unwrap_err();
        match err {
            Error::Signer(msg) => assert!(msg.contains("unknown account")),
            other => panic!("Expected Signer error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sign_rejects_non_hex_output() {
        let signer = ExternalSigner::new(
            "sh",
            vec!["-c".to_string(), "cat > /dev/null; echo signed".to_string()],
        );
        assert!(signer.sign(&AccountId::default(), &kill_call()).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_early_exit_keeps_signer_stderr() {
        let signer = ExternalSigner::new(
            "sh",
            vec!["-c".to_string(), "echo 'no such key' >&2; exit 2".to_string()],
        );
        let call = Call::SubmitProgram {
            code: Bytes(vec![0u8; 1 << 20]),
            salt: Bytes(b"salt".to_vec()),
            init_payload: Bytes::default(),
            gas_limit: 1,
            value: 0,
        };
        let err = signer.sign(&AccountId::default(), &call).await.unwrap_err();
        match err {
            Error::Signer(msg) => assert!(msg.contains("no such key"), "{}", msg),
            other => panic!("Expected Signer error, got {:?}", other),
        }
    }
}
