use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use tracing::warn;

use shipshape_common::outcome::ActionOutcome;

/// Append-only JSONL record of every outcome in a run.
///
/// Write failures are logged and swallowed: a broken run log must not fail
/// actions that already happened.
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn append(&self, outcome: &ActionOutcome) {
        if let Err(error) = self.try_append(outcome) {
            warn!(path = %self.path.display(), error = %error, "failed to write run log line");
        }
    }

    fn try_append(&self, outcome: &ActionOutcome) -> Result<(), std::io::Error> {
        // One write per line so concurrent workers cannot interleave output.
        let mut line = serde_json::to_vec(outcome).map_err(std::io::Error::other)?;
        line.push(b'\n');
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(&line)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use shipshape_common::outcome::ActionKind;

    use super::*;

    #[test]
    fn outcomes_append_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        let log = RunLog::new(path.clone());

        log.append(&ActionOutcome::simulated("app:v1", ActionKind::DeleteTag));
        log.append(&ActionOutcome::failed(
            "web-1/nginx",
            ActionKind::RestartService,
            "restart refused",
        ));

        let raw = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["target"], "app:v1");
        assert_eq!(first["action"], "delete_tag");
        assert_eq!(first["status"], "simulated");

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["status"], "failed");
        assert_eq!(second["error"], "restart refused");
    }

    #[test]
    fn unwritable_path_is_swallowed() {
        let log = RunLog::new(PathBuf::from("/nonexistent/dir/run.jsonl"));
        log.append(&ActionOutcome::completed("app:v1", ActionKind::DeleteTag));
    }
}
