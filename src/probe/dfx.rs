//! `dfx` command transport and typed reply parsing.
//!
//! Replies are parsed as Candid text values instead of being sliced
//! around quote characters, so stray `WARN` lines, multi-line formatting
//! and escaped characters cannot corrupt the evidence.

use super::Prober;
use crate::core::{CandidateId, ProbeFailure, ProbeOutcome};
use crate::error::{ResearchError, Result};
use crate::timeout::{with_timeout, TimeoutConfig};
use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Stdio;
use std::time::Duration;
use tracing::trace;

/// A single-text tuple reply: `("ckBTC")`, optionally with a trailing comma.
static RE_TEXT_REPLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)^\(\s*"((?:[^"\\]|\\.)*)"\s*,?\s*\)$"#).expect("valid text reply regex")
});

/// A principal anywhere in a reply: `(principal "ryjl3-tyaaa-aaaaa-aaaba-cai")`.
static RE_PRINCIPAL_REPLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"principal\s+"([a-z0-9]+(?:-[a-z0-9]+)*)""#).expect("valid principal regex")
});

/// Rejections meaning "this canister does not expose that", not a failed call.
const ABSENT_MARKERS: &[&str] = &[
    "has no query method",
    "has no update method",
    "method not found",
    "IC0302",
    "IC0536",
    "does not have metadata",
    "Failed to read `candid:service` metadata",
];

/// Captured result of one `dfx` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs `dfx canister --network <network> ...` subcommands.
#[derive(Debug, Clone)]
pub struct DfxClient {
    binary: String,
    network: String,
}

impl DfxClient {
    pub fn new(binary: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            network: network.into(),
        }
    }

    /// Run a `dfx canister` subcommand, killing the child if it overruns.
    pub async fn run(&self, args: &[&str], limit: Duration, operation: &str) -> Result<CommandOutput> {
        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.arg("canister")
            .arg("--network")
            .arg(&self.network)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        trace!(binary = %self.binary, ?args, "spawning dfx");
        with_timeout(TimeoutConfig::from_duration(limit, operation).quiet(), async {
            let out = cmd
                .output()
                .await
                .map_err(|e| ResearchError::Transport(format!("cannot run {}: {e}", self.binary)))?;
            Ok(CommandOutput {
                success: out.status.success(),
                stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            })
        })
        .await
    }

    /// `dfx canister call <canister> <method> '<args>'`
    pub async fn call(
        &self,
        canister: &str,
        method: &str,
        candid_args: &str,
        limit: Duration,
    ) -> Result<CommandOutput> {
        self.run(&["call", canister, method, candid_args], limit, method)
            .await
    }
}

/// Reply payload with `WARN` noise and blank lines removed.
pub fn reply_body(stdout: &str) -> String {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("WARN"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse a single-text Candid reply, decoding escapes.
pub fn parse_text_reply(stdout: &str) -> std::result::Result<String, String> {
    let body = reply_body(stdout);
    let caps = RE_TEXT_REPLY
        .captures(&body)
        .ok_or_else(|| format!("not a text reply: {}", preview(&body)))?;
    decode_candid_escapes(&caps[1])
}

/// Extract the principal from a reply such as `(principal "...")`.
pub fn parse_principal_reply(stdout: &str) -> std::result::Result<CandidateId, String> {
    let body = reply_body(stdout);
    RE_PRINCIPAL_REPLY
        .captures(&body)
        .map(|c| CandidateId::new(&c[1]))
        .ok_or_else(|| format!("no principal in reply: {}", preview(&body)))
}

/// Decode Candid text escapes: `\n \t \r \" \' \\`, `\u{..}` and `\XX` bytes.
pub fn decode_candid_escapes(raw: &str) -> std::result::Result<String, String> {
    let mut bytes = Vec::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => bytes.push(b'\n'),
            Some('t') => bytes.push(b'\t'),
            Some('r') => bytes.push(b'\r'),
            Some('"') => bytes.push(b'"'),
            Some('\'') => bytes.push(b'\''),
            Some('\\') => bytes.push(b'\\'),
            Some('u') => {
                if chars.next() != Some('{') {
                    return Err("malformed \\u escape".into());
                }
                let hex: String = chars.by_ref().take_while(|&c| c != '}').collect();
                let ch = u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| format!("bad unicode escape \\u{{{hex}}}"))?;
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
            Some(hi) if hi.is_ascii_hexdigit() => {
                let lo = chars
                    .next()
                    .filter(char::is_ascii_hexdigit)
                    .ok_or("truncated byte escape")?;
                let byte = u8::from_str_radix(&format!("{hi}{lo}"), 16)
                    .map_err(|e| e.to_string())?;
                bytes.push(byte);
            }
            other => return Err(format!("unknown escape {other:?}")),
        }
    }

    String::from_utf8(bytes).map_err(|e| format!("reply is not UTF-8: {e}"))
}

fn preview(text: &str) -> String {
    crate::core::evidence::truncate_chars(text, 80)
}

/// Map a failed invocation to `Empty` (method or metadata absent) or `Failure`.
pub fn rejection_outcome<T>(output: &CommandOutput) -> ProbeOutcome<T> {
    let text = format!("{}\n{}", output.stderr, output.stdout);
    if ABSENT_MARKERS.iter().any(|m| text.contains(m)) {
        return ProbeOutcome::Empty;
    }
    let last = reply_body(&output.stderr)
        .lines()
        .last()
        .unwrap_or("non-zero exit")
        .to_string();
    ProbeOutcome::Failure(ProbeFailure::Transport(last))
}

fn transport_outcome<T>(err: ResearchError) -> ProbeOutcome<T> {
    match err {
        ResearchError::Timeout { seconds } => ProbeOutcome::Failure(ProbeFailure::Timeout { seconds }),
        other => ProbeOutcome::Failure(ProbeFailure::Transport(other.to_string())),
    }
}

/// [`Prober`] backed by the `dfx` command line.
#[derive(Debug, Clone)]
pub struct DfxProber {
    client: DfxClient,
    timeout: Duration,
}

impl DfxProber {
    pub fn new(client: DfxClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn text_query(&self, id: &CandidateId, method: &str) -> ProbeOutcome<String> {
        match self.client.call(id.as_str(), method, "()", self.timeout).await {
            Ok(out) if out.success => match parse_text_reply(&out.stdout) {
                Ok(text) => ProbeOutcome::Success(text).non_blank(),
                Err(msg) => ProbeOutcome::Failure(ProbeFailure::Malformed(msg)),
            },
            Ok(out) => rejection_outcome(&out),
            Err(e) => transport_outcome(e),
        }
    }
}

impl Prober for DfxProber {
    async fn descriptor(&self, id: &CandidateId) -> ProbeOutcome<String> {
        let args = ["metadata", id.as_str(), "candid:service"];
        match self.client.run(&args, self.timeout, "candid:service").await {
            Ok(out) if out.success => ProbeOutcome::Success(out.stdout).non_blank(),
            Ok(out) => rejection_outcome(&out),
            Err(e) => transport_outcome(e),
        }
    }

    async fn token_name(&self, id: &CandidateId) -> ProbeOutcome<String> {
        self.text_query(id, "icrc1_name").await
    }

    async fn token_symbol(&self, id: &CandidateId) -> ProbeOutcome<String> {
        self.text_query(id, "icrc1_symbol").await
    }

    async fn ledger_reference(&self, id: &CandidateId) -> ProbeOutcome<CandidateId> {
        match self.client.call(id.as_str(), "ledger_id", "()", self.timeout).await {
            Ok(out) if out.success => match parse_principal_reply(&out.stdout) {
                Ok(ledger) => ProbeOutcome::Success(ledger),
                Err(msg) => ProbeOutcome::Failure(ProbeFailure::Malformed(msg)),
            },
            Ok(out) => rejection_outcome(&out),
            Err(e) => transport_outcome(e),
        }
    }
}
