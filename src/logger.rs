use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::types::Snapshot;

/// How much of each snapshot fetch ends up in the NDJSON log.
pub enum CommandLogMode {
    /// Every snapshot in full.
    Full,
    /// First snapshot per device in full, then only changed fields.
    Diffed,
}

pub(crate) struct CommandLogger {
    mode: CommandLogMode,
    file: File,
    previous: HashMap<String, Map<String, Value>>,
}

impl CommandLogger {
    pub fn new(mode: CommandLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            previous: HashMap::new(),
        })
    }

    pub fn log_command(&mut self, action: &str, data_key: &str, body: &Value) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "cmd",
            "action": action,
            "dataKey": data_key,
            "body": body,
        });
        self.write_line(&entry);
    }

    pub fn log_snapshot(&mut self, device_id: &str, snapshot: &Snapshot) {
        let fields = snapshot.fields();
        match self.mode {
            CommandLogMode::Full => {
                let entry = json!({
                    "ts": Utc::now().to_rfc3339(),
                    "dir": "snapshot",
                    "device": device_id,
                    "fields": fields,
                });
                self.write_line(&entry);
            }
            CommandLogMode::Diffed => {
                match self.previous.get(device_id) {
                    None => {
                        let entry = json!({
                            "ts": Utc::now().to_rfc3339(),
                            "dir": "snapshot",
                            "device": device_id,
                            "full": true,
                            "fields": fields,
                        });
                        self.write_line(&entry);
                    }
                    Some(prev) => {
                        let changes = diff_fields(prev, fields);
                        let entry = json!({
                            "ts": Utc::now().to_rfc3339(),
                            "dir": "snapshot",
                            "device": device_id,
                            "changes": changes,
                        });
                        self.write_line(&entry);
                    }
                }
                self.previous.insert(device_id.to_string(), fields.clone());
            }
        }
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}

/// Field-level diff of two flat snapshots.
fn diff_fields(previous: &Map<String, Value>, current: &Map<String, Value>) -> Vec<Value> {
    let mut changes = Vec::new();
    for (key, new_val) in current {
        let old_val = previous.get(key);
        if old_val != Some(new_val) {
            changes.push(json!({
                "key": key,
                "old": old_val,
                "new": new_val,
            }));
        }
    }
    for key in previous.keys() {
        if !current.contains_key(key) {
            changes.push(json!({
                "key": key,
                "old": previous[key],
                "new": Value::Null,
            }));
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::NamedTempFile;

    fn snapshot_with(pairs: &[(&str, Value)]) -> Snapshot {
        let mut snap = Snapshot::new();
        for (k, v) in pairs {
            snap.insert(*k, v.clone());
        }
        snap
    }

    fn read_lines(path: &str) -> Vec<Value> {
        let mut contents = String::new();
        std::fs::File::open(path)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn log_command_writes_ndjson() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = CommandLogger::new(CommandLogMode::Full, path).unwrap();
        logger.log_command("command", "airState.opMode", &json!({"dataValue": 0}));

        let lines = read_lines(path);
        assert_eq!(lines[0]["dir"], "cmd");
        assert_eq!(lines[0]["dataKey"], "airState.opMode");
        assert!(lines[0]["ts"].as_str().is_some());
    }

    #[test]
    fn diffed_mode_logs_full_first_then_changes() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = CommandLogger::new(CommandLogMode::Diffed, path).unwrap();

        logger.log_snapshot("dev-1", &snapshot_with(&[("airState.operation", json!(1))]));
        logger.log_snapshot("dev-1", &snapshot_with(&[("airState.operation", json!(0))]));

        let lines = read_lines(path);
        assert_eq!(lines[0]["full"], true);
        let changes = lines[1]["changes"].as_array().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0]["key"], "airState.operation");
        assert_eq!(changes[0]["new"], 0);
    }

    #[test]
    fn diffed_mode_no_changes_logs_empty_array() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = CommandLogger::new(CommandLogMode::Diffed, path).unwrap();

        let snap = snapshot_with(&[("airState.tempState.current", json!(23.5))]);
        logger.log_snapshot("dev-1", &snap);
        logger.log_snapshot("dev-1", &snap);

        let lines = read_lines(path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["changes"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn diffed_mode_tracks_devices_independently() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = CommandLogger::new(CommandLogMode::Diffed, path).unwrap();

        logger.log_snapshot("dev-1", &snapshot_with(&[("a", json!(1))]));
        logger.log_snapshot("dev-2", &snapshot_with(&[("a", json!(1))]));

        let lines = read_lines(path);
        assert_eq!(lines[0]["full"], true);
        assert_eq!(lines[1]["full"], true);
    }
}
