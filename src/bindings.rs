//! Client binding generator
//!
//! Starts a node container, scrapes its version from the logs, runs the
//! code generator against it and writes the formatted result. The
//! container is killed whether or not generation succeeds.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use semver::Version;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use crate::common::config::BindingsConfig;
use crate::common::{Error, Result};

/// Executables the generator needs
#[derive(Debug)]
struct Tools {
    docker: PathBuf,
    codegen: PathBuf,
    formatter: PathBuf,
}

impl Tools {
    fn locate(config: &BindingsConfig) -> Result<Self> {
        Ok(Self {
            docker: locate("docker")?,
            codegen: locate(program(&config.codegen, "codegen")?)?,
            formatter: locate(program(&config.formatter, "formatter")?)?,
        })
    }
}

fn locate(name: &str) -> Result<PathBuf> {
    which::which(name).map_err(|_| Error::ToolNotFound(name.to_string()))
}

fn program<'a>(command: &'a [String], what: &str) -> Result<&'a str> {
    command
        .first()
        .map(String::as_str)
        .ok_or_else(|| Error::Config(format!("bindings.{} command is empty", what)))
}

/// Replace `{url}` in every argument
pub fn substitute_url(args: &[String], url: &str) -> Vec<String> {
    args.iter().map(|a| a.replace("{url}", url)).collect()
}

/// Extract the node version from a log line
///
/// Takes the token after `marker` and parses its `MAJOR.MINOR.PATCH`
/// core, ignoring any `-commit-target` suffix.
pub fn parse_version(line: &str, marker: &str) -> Option<Version> {
    let (_, rest) = line.split_once(marker)?;
    let token = rest.split_whitespace().next()?;
    let token = token.trim_start_matches('v');
    let core = token.split('-').next()?;
    Version::parse(core).ok()
}

/// Header written above the generated code
pub fn header(version: &Version) -> String {
    format!("// Generated by `gear-fixtures bindings` from node {}. Do not edit.\n", version)
}

/// Generate bindings, writing them to `output` or the configured path
pub async fn generate(config: &BindingsConfig, output: Option<&Path>) -> Result<PathBuf> {
    let tools = Tools::locate(config)?;
    let output = output.map(Path::to_path_buf).unwrap_or_else(|| config.output.clone());

    tracing::info!(image = %config.image, "Pulling node image");
    run(&tools.docker, &["pull".to_string(), config.image.clone()]).await?;

    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--rm".to_string(),
        "--name".to_string(),
        config.container_name.clone(),
        "-p".to_string(),
        format!("{0}:{0}", config.port),
        config.image.clone(),
    ];
    args.extend(config.node_args.iter().cloned());
    run(&tools.docker, &args).await?;
    tracing::info!(container = %config.container_name, "Node container started");

    let result = generate_with_node(&tools, config, &output).await;

    let kill = run(
        &tools.docker,
        &["kill".to_string(), config.container_name.clone()],
    )
    .await;
    if let Err(e) = kill {
        tracing::warn!(error = %e, container = %config.container_name, "Failed to kill node container");
    }

    result.map(|()| output)
}

async fn generate_with_node(tools: &Tools, config: &BindingsConfig, output: &Path) -> Result<()> {
    let version = wait_for_version(&tools.docker, config).await?;
    tracing::info!(%version, "Node is up");

    let url = format!("ws://127.0.0.1:{}", config.port);
    let codegen_args = substitute_url(&config.codegen[1..], &url);
    let code = run(&tools.codegen, &codegen_args).await?;

    let formatted = pipe_through(&tools.formatter, &config.formatter[1..], code).await?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut content = header(&version).into_bytes();
    content.extend(formatted);
    std::fs::write(output, content)?;

    tracing::info!(path = %output.display(), "Bindings written");
    Ok(())
}

/// Follow the container logs until the version line shows up
async fn wait_for_version(docker: &Path, config: &BindingsConfig) -> Result<Version> {
    let mut child = Command::new(docker)
        .args(["logs", "-f", &config.container_name])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::command_failed("docker logs", e.to_string()))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::command_failed("docker logs", "stdout not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::command_failed("docker logs", "stderr not captured"))?;

    // The node logs to stderr, but scan both streams
    let mut out_lines = BufReader::new(stdout).lines();
    let mut err_lines = BufReader::new(stderr).lines();
    let marker = config.version_marker.as_str();

    let scan = async {
        let (mut out_open, mut err_open) = (true, true);
        while out_open || err_open {
            let line = tokio::select! {
                line = out_lines.next_line(), if out_open => {
                    let line = line?;
                    out_open = line.is_some();
                    line
                }
                line = err_lines.next_line(), if err_open => {
                    let line = line?;
                    err_open = line.is_some();
                    line
                }
            };
            if let Some(version) = line.as_deref().and_then(|l| parse_version(l, marker)) {
                return Ok(version);
            }
        }
        Err(Error::VersionNotFound(marker.to_string()))
    };

    let result = match timeout(Duration::from_secs(config.startup_timeout_secs), scan).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(config.startup_timeout_secs)),
    };
    let _ = child.kill().await;
    result
}

/// Run a command to completion and return its stdout
async fn run(program: &Path, args: &[String]) -> Result<Vec<u8>> {
    let name = program.display().to_string();
    tracing::debug!(command = %name, ?args, "Running");

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| Error::command_failed(&name, e.to_string()))?;

    if !output.status.success() {
        return Err(Error::command_failed(
            &name,
            format!(
                "exit code {}: {}",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }
    Ok(output.stdout)
}

/// Feed `input` to a command's stdin and return its stdout
async fn pipe_through(program: &Path, args: &[String], input: Vec<u8>) -> Result<Vec<u8>> {
    let name = program.display().to_string();
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::command_failed(&name, e.to_string()))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| Error::command_failed(&name, "stdin not captured"))?;
    let writer = tokio::spawn(async move {
        stdin.write_all(&input).await?;
        stdin.shutdown().await
    });

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| Error::command_failed(&name, e.to_string()))?;
    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(Error::command_failed(&name, e.to_string())),
        Err(e) => return Err(Error::command_failed(&name, e.to_string())),
    }

    if !output.status.success() {
        return Err(Error::command_failed(
            &name,
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(output.stdout)
}
