//! Program deployment

use std::collections::BTreeMap;

use rand::distributions::{Alphanumeric, DistString};

use crate::chain::{AccountId, Bytes, Call, Chain, ProgramId};
use crate::common::config::GasConfig;
use crate::common::paths::resolve_relative;
use crate::common::{Error, Result};
use crate::fixture::{ProgramMap, Test};

/// Length of the random salt attached to each deployment
const SALT_LEN: usize = 16;

/// Programs deployed for one fixture
#[derive(Debug, Default)]
pub struct Deployment {
    /// Program address by fixture-local id
    pub programs: ProgramMap,
    /// Salt used for each program
    pub salts: BTreeMap<u64, String>,
}

/// A fresh random salt
pub fn generate_salt() -> String {
    Alphanumeric.sample_string(&mut rand::thread_rng(), SALT_LEN)
}

/// Build the deployment batch for all of `test`'s programs
///
/// Every program id is derived before any init payload is encoded, so
/// init payloads may reference any program of the test.
pub fn deployment_call(test: &Test, gas: &GasConfig) -> Result<(Deployment, Option<Call>)> {
    let mut deployment = Deployment::default();
    let mut codes = Vec::with_capacity(test.programs.len());

    for program in &test.programs {
        let path = resolve_relative(&test.source, &program.path);
        let code = std::fs::read(&path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        let salt = generate_salt();
        let id = ProgramId::generate(&code, salt.as_bytes());

        tracing::debug!(program = program.id, %id, path = %path.display(), "Program id derived");
        deployment.programs.insert(program.id, id);
        deployment.salts.insert(program.id, salt);
        codes.push(code);
    }

    if codes.is_empty() {
        return Ok((deployment, None));
    }

    let mut calls = Vec::with_capacity(codes.len());
    for (program, code) in test.programs.iter().zip(codes) {
        let init_payload = match &program.init_message {
            Some(payload) => payload.encode(&deployment.programs)?,
            None => Vec::new(),
        };
        calls.push(Call::SubmitProgram {
            code: Bytes(code),
            salt: Bytes(deployment.salts[&program.id].as_bytes().to_vec()),
            init_payload: Bytes(init_payload),
            gas_limit: gas.deploy_gas_limit,
            value: 0,
        });
    }

    Ok((deployment, Some(Call::Batch { calls })))
}

/// Deploy every program of `test` in one batch
pub async fn deploy_programs<C: Chain>(
    chain: &mut C,
    signer: &AccountId,
    test: &Test,
    gas: &GasConfig,
) -> Result<Deployment> {
    let (deployment, call) = deployment_call(test, gas)?;
    if let Some(call) = call {
        chain.submit(signer, call).await?;
        tracing::info!(count = deployment.programs.len(), "Programs deployed");
    }
    Ok(deployment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::parse_test;
    use std::path::Path;

    fn test_with_code(dir: &Path, json: &str) -> Test {
        std::fs::write(dir.join("a.wasm"), b"\0asm-a").unwrap();
        std::fs::write(dir.join("b.wasm"), b"\0asm-b").unwrap();
        let source = dir.join("test.json");
        let mut test = parse_test(&source, json).unwrap();
        test.source = source;
        test
    }

    #[test]
    fn test_salts_are_random_alphanumeric() {
        let a = generate_salt();
        let b = generate_salt();
        assert_eq!(a.len(), SALT_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_init_payload_can_reference_later_program() {
        let dir = tempfile::tempdir().unwrap();
        let test = test_with_code(
            dir.path(),
            r#"{
                "programs": [
                    {"id": 0, "path": "a.wasm", "init_message": {"kind": "utf-8", "value": "{1}"}},
                    {"id": 1, "path": "b.wasm"}
                ],
                "fixtures": []
            }"#,
        );
        let (deployment, call) = deployment_call(&test, &GasConfig::default()).unwrap();
        let Some(Call::Batch { calls }) = call else {
            panic!("expected a batch");
        };
        assert_eq!(calls.len(), 2);
        let Call::SubmitProgram {
            init_payload, salt, code, ..
        } = &calls[0]
        else {
            panic!("expected submit_program");
        };
        assert_eq!(init_payload.0, deployment.programs[&1].to_hex().into_bytes());
        assert_eq!(
            deployment.programs[&0],
            ProgramId::generate(&code.0, &salt.0)
        );
    }

    #[test]
    fn test_missing_code_is_file_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("test.json");
        let mut test = parse_test(
            &source,
            r#"{"programs": [{"id": 0, "path": "missing.wasm"}], "fixtures": []}"#,
        )
        .unwrap();
        test.source = source;
        assert!(matches!(
            deployment_call(&test, &GasConfig::default()),
            Err(Error::FileRead { .. })
        ));
    }

    #[test]
    fn test_no_programs_no_call() {
        let test = parse_test(Path::new("t.json"), r#"{"fixtures": []}"#).unwrap();
        let (deployment, call) = deployment_call(&test, &GasConfig::default()).unwrap();
        assert!(call.is_none());
        assert!(deployment.programs.is_empty());
    }
}
