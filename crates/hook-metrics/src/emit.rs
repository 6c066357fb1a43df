//! Spool-and-push emission.

use crate::ilp::{now_ns, to_ilp, FieldValue};
use hook_common::ScratchDir;
use std::fs::OpenOptions;
use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

/// Default ILP ingestion endpoint.
const DEFAULT_ADDR: &str = "127.0.0.1:9009";
/// Spool file under the scratch directory.
const SPOOL_FILE: &str = "metrics.ilp";
/// Connect/write budget for the opportunistic push.
const PUSH_TIMEOUT: Duration = Duration::from_millis(500);

/// Collects records for one hook invocation and flushes them at the end.
#[derive(Debug)]
pub struct Emitter {
    scratch: ScratchDir,
    addr: Option<SocketAddr>,
    lines: Vec<String>,
}

impl Emitter {
    /// Endpoint from `TSDB_ADDR`, default `127.0.0.1:9009`.
    pub fn new(scratch: ScratchDir) -> Self {
        let addr = std::env::var("TSDB_ADDR")
            .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
            .parse()
            .ok();
        Self {
            scratch,
            addr,
            lines: Vec::new(),
        }
    }

    /// Emitter that only spools (tests, air-gapped runs).
    pub fn spool_only(scratch: ScratchDir) -> Self {
        Self {
            scratch,
            addr: None,
            lines: Vec::new(),
        }
    }

    /// Queue one record, timestamped now.
    pub fn record(&mut self, table: &str, tags: &[(&str, &str)], fields: &[(&str, FieldValue)]) {
        if let Some(line) = to_ilp(table, tags, fields, now_ns()) {
            self.lines.push(line);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Append everything to the spool file and push it over TCP.
    /// Both halves are best-effort; the hook result does not depend on
    /// either.
    pub fn flush(self) {
        if self.lines.is_empty() {
            return;
        }
        let body = self.lines.join("\n") + "\n";

        let spool = self.scratch.path(SPOOL_FILE);
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(spool) {
            let _ = file.write_all(body.as_bytes());
        }

        if let Some(addr) = self.addr {
            if let Ok(mut stream) = TcpStream::connect_timeout(&addr, PUSH_TIMEOUT) {
                let _ = stream.set_write_timeout(Some(PUSH_TIMEOUT));
                let _ = stream.write_all(body.as_bytes());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn flush_appends_to_spool() {
        let dir = tempdir().unwrap();
        let scratch = ScratchDir::at(dir.path());

        let mut emitter = Emitter::spool_only(scratch.clone());
        emitter.record(
            "claude_trajectories",
            &[("project", "demo")],
            &[("steps", FieldValue::Int(2))],
        );
        emitter.record(
            "claude_mcp_system",
            &[],
            &[("active_claims", FieldValue::Int(1))],
        );
        assert!(!emitter.is_empty());
        emitter.flush();

        let content = std::fs::read_to_string(scratch.path(SPOOL_FILE)).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("claude_trajectories,project=demo steps=2i"));
    }

    #[test]
    fn empty_emitter_writes_nothing() {
        let dir = tempdir().unwrap();
        let scratch = ScratchDir::at(dir.path());

        let emitter = Emitter::spool_only(scratch.clone());
        assert!(emitter.is_empty());
        emitter.flush();
        assert!(!scratch.exists(SPOOL_FILE));
    }
}
