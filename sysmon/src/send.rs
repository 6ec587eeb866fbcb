//! One-shot file push to the configured host through the system `sftp`
//! client in batch mode.

use std::path::{Component, Path, PathBuf};
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use sysmon_core::Console;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::SftpConfig;

pub const FILE_PROMPT: &str = "Enter the name of the file you want to upload:";

/// Program and arguments for one batch session. The batch script is fed on
/// stdin (`-b -`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SftpInvocation {
    pub program: String,
    pub args: Vec<String>,
    /// Password passed to `sshpass -e` through `SSHPASS`.
    pub password: Option<String>,
}

impl SftpInvocation {
    pub fn new(cfg: &SftpConfig, sshpass: bool) -> Self {
        let mut args = Vec::new();
        let password = match (&cfg.password, sshpass) {
            (Some(pw), true) => {
                args.extend(["-e".to_string(), "sftp".to_string()]);
                Some(pw.clone())
            }
            (pw, _) => {
                if pw.is_some() {
                    warn!("sshpass not found; falling back to key authentication");
                }
                args.extend(["-o".to_string(), "BatchMode=yes".to_string()]);
                None
            }
        };
        args.extend([
            "-P".to_string(),
            cfg.port.to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-b".to_string(),
            "-".to_string(),
            format!("{}@{}", cfg.username, cfg.host),
        ]);
        let program = if password.is_some() { "sshpass" } else { "sftp" };
        Self {
            program: program.to_string(),
            args,
            password,
        }
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Batch script copying `local` to `<remote_dir>/<name>`.
pub fn upload_script(local: &Path, remote_dir: &str, name: &str) -> String {
    let remote = format!("{}/{}", remote_dir.trim_end_matches('/'), name);
    format!("put {} {}\n", quote(&local.to_string_lossy()), quote(&remote))
}

/// Entry names in `dir`, sorted.
pub fn list_local(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = std::fs::read_dir(dir)?
        .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<std::io::Result<Vec<_>>>()?;
    names.sort();
    Ok(names)
}

/// A single path component that stays inside the listed directory.
fn is_plain_name(name: &str) -> bool {
    let mut parts = Path::new(name).components();
    matches!(
        (parts.next(), parts.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn on_path(program: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|p| p.join(program).is_file()))
        .unwrap_or(false)
}

/// List `dir`, ask for a file name on `input` and push that file. Returns the
/// number of bytes sent.
pub async fn run<R>(cfg: &SftpConfig, dir: &Path, console: &Console, input: &mut R) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let names = list_local(dir).with_context(|| format!("listing {}", dir.display()))?;
    console.line("Local Files:");
    for name in &names {
        console.line(name);
    }
    console.line(FILE_PROMPT);

    let mut line = String::new();
    input.read_line(&mut line).await.context("reading file name")?;
    let name = line.trim();
    if name.is_empty() {
        bail!("no file name given");
    }
    if !is_plain_name(name) {
        bail!("{name:?} is not a file in {}", dir.display());
    }

    let local: PathBuf = dir.join(name);
    let meta = tokio::fs::metadata(&local)
        .await
        .with_context(|| format!("opening {}", local.display()))?;
    if !meta.is_file() {
        bail!("{} is not a regular file", local.display());
    }

    let inv = SftpInvocation::new(cfg, on_path("sshpass"));
    let script = upload_script(&local, &cfg.remote_dir, name);
    debug!(program = %inv.program, args = ?inv.args, "starting sftp");

    let mut cmd = Command::new(&inv.program);
    cmd.args(&inv.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    if let Some(pw) = &inv.password {
        cmd.env("SSHPASS", pw);
    }
    let mut child = cmd
        .spawn()
        .with_context(|| format!("starting {}", inv.program))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(script.as_bytes()).await.context("writing sftp batch")?;
    }
    let output = child.wait_with_output().await.context("waiting for sftp")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("sftp to {}:{} failed ({}): {}", cfg.host, cfg.port, output.status, stderr.trim());
    }

    info!(file = %local.display(), bytes = meta.len(), host = %cfg.host, "file uploaded");
    console.line(format!(
        "File uploaded successfully. {} bytes transferred.",
        meta.len()
    ));
    Ok(meta.len())
}
