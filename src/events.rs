//! Append-only JSONL log of portal events for one run.
//!
//! Passwords, tokens and reset messages are never written here.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct EventLog {
    pub path: Option<PathBuf>,
    run_id: String,
    file: Option<File>,
}

#[derive(Serialize)]
struct Event<'a> {
    ts: DateTime<Utc>,
    run_id: &'a str,
    #[serde(rename = "type")]
    event_type: &'a str,
    #[serde(flatten)]
    data: serde_json::Value,
}

impl EventLog {
    /// Open `<dir>/<run_id>.jsonl`, creating `dir` if needed
    pub fn open(dir: &Path, run_id: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.jsonl", run_id));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path: Some(path),
            run_id: run_id.to_string(),
            file: Some(file),
        })
    }

    /// A log that accepts events and writes nothing
    pub fn disabled() -> Self {
        Self {
            path: None,
            run_id: String::new(),
            file: None,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn log(&mut self, event_type: &str, data: serde_json::Value) -> Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        let event = Event {
            ts: Utc::now(),
            run_id: &self.run_id,
            event_type,
            data,
        };
        let line = serde_json::to_string(&event)?;
        writeln!(file, "{}", line)?;
        file.flush()?;
        Ok(())
    }

    pub fn login_attempt(&mut self, username: &str) -> Result<()> {
        self.log("login_attempt", json!({ "username": username }))
    }

    pub fn login_ok(&mut self, username: &str, role: &str) -> Result<()> {
        self.log("login_ok", json!({ "username": username, "role": role }))
    }

    pub fn login_err(&mut self, username: &str, kind: &str) -> Result<()> {
        self.log("login_err", json!({ "username": username, "kind": kind }))
    }

    pub fn logout(&mut self, username: &str) -> Result<()> {
        self.log("logout", json!({ "username": username }))
    }

    /// Session ended by the backend rejecting a request
    pub fn forced_logout(&mut self, username: &str, during: &str) -> Result<()> {
        self.log(
            "forced_logout",
            json!({ "username": username, "during": during }),
        )
    }

    pub fn navigate(&mut self, requested: &str, resolved: Option<&str>, outcome: &str) -> Result<()> {
        self.log(
            "navigate",
            json!({
                "requested": requested,
                "resolved": resolved,
                "outcome": outcome,
            }),
        )
    }

    pub fn reset_request(&mut self) -> Result<()> {
        self.log("reset_request", json!({}))
    }

    pub fn reset_ok(&mut self, username: &str) -> Result<()> {
        self.log("reset_ok", json!({ "username": username }))
    }

    pub fn reset_err(&mut self, kind: &str) -> Result<()> {
        self.log("reset_err", json!({ "kind": kind }))
    }

    pub fn page_err(&mut self, route: &str, kind: &str) -> Result<()> {
        self.log("page_err", json!({ "route": route, "kind": kind }))
    }

    /// A completion arrived for a request nobody is waiting on any more
    pub fn stale_response(&mut self, kind: &str, ticket: u64) -> Result<()> {
        self.log(
            "stale_response",
            json!({ "kind": kind, "ticket": ticket }),
        )
    }

    /// A request failed inside the client before it could report an outcome
    pub fn aborted(&mut self, kind: &str, ticket: u64) -> Result<()> {
        self.log("aborted", json!({ "kind": kind, "ticket": ticket }))
    }

    pub fn duplicate_submit(&mut self, form: &str) -> Result<()> {
        self.log("duplicate_submit", json!({ "form": form }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_are_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = EventLog::open(&dir.path().join("events"), "run-1").unwrap();
        log.login_attempt("maria").unwrap();
        log.navigate("/users", Some("/dashboard"), "denied").unwrap();

        let content = std::fs::read_to_string(log.path.as_ref().unwrap()).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "login_attempt");
        assert_eq!(lines[0]["run_id"], "run-1");
        assert_eq!(lines[0]["username"], "maria");
        assert_eq!(lines[1]["outcome"], "denied");
        assert_eq!(lines[1]["resolved"], "/dashboard");
        assert!(lines[1]["ts"].is_string());
    }

    #[test]
    fn test_disabled_log_writes_nothing() {
        let mut log = EventLog::disabled();
        assert!(log.logout("maria").is_ok());
        assert!(log.path.is_none());
    }
}
