//! Fixture files
//!
//! A fixture file holds one test: the programs to deploy and the
//! scenarios to replay against the node. JSON and YAML are both
//! accepted; the format is picked by file extension.

mod model;
mod payload;

use std::path::Path;

pub use model::*;
pub use payload::{substitute_placeholders, Payload, ProgramMap};

use crate::common::{Error, Result};

/// Load and validate a test from a fixture file
pub fn load_test(path: &Path) -> Result<Test> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;

    let mut test = parse_test(path, &content)?;
    test.source = path.to_path_buf();
    test.validate()?;
    Ok(test)
}

/// Parse a test from fixture text, picking the format from `path`'s extension
pub fn parse_test(path: &Path, content: &str) -> Result<Test> {
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );

    let parsed = if is_yaml {
        serde_yaml::from_str(content).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(content).map_err(|e| e.to_string())
    };

    parsed.map_err(|message| Error::FixtureParse {
        path: path.display().to_string(),
        message,
    })
}
