use serde_json::{Map, Value, json};

use crate::types::{CommandVerb, Snapshot};

/// Field-path translation between the current protocol vocabulary and the
/// legacy (v1) one, `(v2 key, v1 key)`.
const TRANSLATION: &[(&str, &str)] = &[
    ("airState.windStrength", "WindStrength"),
    ("airState.tempState.current", "TempCur"),
    ("airState.tempState.target", "TempCfg"),
    ("airState.opMode", "OpMode"),
    ("airState.operation", "Operation"),
    ("airState.wDir.vStep", "WDirVStep"),
];

pub fn v1_key(v2_key: &str) -> Option<&'static str> {
    TRANSLATION
        .iter()
        .find(|(v2, _)| *v2 == v2_key)
        .map(|(_, v1)| *v1)
}

/// Rewrite a v2 command into the legacy value shape.
///
/// A boolean Operation write becomes the literal strings `"Start"`/`"Stop"`;
/// every other field wraps the value in a single-key record keyed by the v1
/// field name. Returns `None` for keys the legacy protocol does not carry.
pub fn translate_command(data_key: &str, verb: CommandVerb, api_value: f64) -> Option<Value> {
    let key = v1_key(data_key)?;
    if verb == CommandVerb::Operation && data_key == "airState.operation" {
        let literal = if api_value as i64 == 0 { "Stop" } else { "Start" };
        return Some(Value::String(literal.to_string()));
    }
    Some(json!({ key: api_value }))
}

/// Reconstruct a v2-keyed pseudo-snapshot from a legacy device record so
/// controllers can run their normal decode path against it. Numeric-looking
/// values are coerced to numbers; anything else is retained as-is.
pub fn pseudo_snapshot(record: &Map<String, Value>) -> Snapshot {
    let mut snapshot = Snapshot::new();
    for (v2_key, v1_key) in TRANSLATION {
        let Some(value) = record.get(*v1_key) else {
            continue;
        };
        let translated = match value {
            Value::String(s) => match s.parse::<f64>() {
                Ok(n) => json!(n),
                Err(_) => value.clone(),
            },
            other => other.clone(),
        };
        snapshot.insert(*v2_key, translated);
    }
    snapshot
}
