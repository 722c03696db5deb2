//! Preference store: the concrete type behind the session's `name -> value`
//! map, defaulted the way the external GUI collaborator defaults it and
//! persisted to a flat JSON file.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value as Json;
use tracing::warn;

use crate::error::{ProxyError, Result};

/// The shapes a recognised preference value actually takes.
#[derive(Debug, Clone, PartialEq)]
pub enum PreferenceValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Text(String),
    Json(Json),
}

impl PreferenceValue {
    #[must_use]
    pub fn as_bool(&self) -> bool {
        matches!(self, PreferenceValue::Bool(true))
    }

    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            PreferenceValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            PreferenceValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PreferenceValue::Text(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&Json> {
        match self {
            PreferenceValue::Json(v) => Some(v),
            _ => None,
        }
    }

    fn to_json(&self) -> Json {
        match self {
            PreferenceValue::Bool(v) => Json::Bool(*v),
            PreferenceValue::Int(v) => Json::from(*v),
            PreferenceValue::Float(v) => Json::from(*v),
            PreferenceValue::Text(v) => Json::String(v.clone()),
            PreferenceValue::Json(v) => v.clone(),
        }
    }

    fn from_json_like(name: &str, value: &Json) -> Self {
        match default_value(name) {
            PreferenceValue::Bool(_) => PreferenceValue::Bool(value.as_bool().unwrap_or(false)),
            PreferenceValue::Int(_) => {
                PreferenceValue::Int(value.as_i64().unwrap_or_default() as i32)
            }
            PreferenceValue::Float(_) => {
                PreferenceValue::Float(value.as_f64().unwrap_or_default() as f32)
            }
            PreferenceValue::Text(_) => {
                PreferenceValue::Text(value.as_str().unwrap_or_default().to_string())
            }
            PreferenceValue::Json(_) => PreferenceValue::Json(value.clone()),
        }
    }
}

/// Every name the external GUI collaborator recognises, with the default
/// each one is initialised to before the pipeline starts.
pub const RECOGNIZED_NAMES: &[&str] = &[
    "clientIP",
    "clientPort",
    "serverIP",
    "serverPort",
    "CustomMOTD",
    "CustomHeader",
    "EnableFakename",
    "FakenameInput",
    "EnableFlying",
    "movementSpeed",
    "BuildingRadio",
    "DropSteering",
    "DropEntityMovement",
    "giants",
];

fn default_value(name: &str) -> PreferenceValue {
    match name {
        "clientIP" => PreferenceValue::Text("0.0.0.0".to_string()),
        "clientPort" | "serverPort" => PreferenceValue::Int(25565),
        "serverIP" => PreferenceValue::Text("127.0.0.1".to_string()),
        "FakenameInput" => PreferenceValue::Text("Pr0xyUser".to_string()),
        "movementSpeed" => PreferenceValue::Float(0.7),
        "BuildingRadio" => PreferenceValue::Int(0),
        "Camera" => PreferenceValue::Json(serde_json::json!({})),
        _ => PreferenceValue::Bool(false),
    }
}

/// The session's preference map. `FakenameInput` rejects values of length
/// ≤ 1 (an empty or single-character fake name is not accepted); every
/// other setter accepts any value of the declared shape. `get` fails if the
/// name has never been set, matching the "defaults installed up front"
/// contract the pipeline relies on.
#[derive(Debug, Clone, Default)]
pub struct Preferences {
    values: HashMap<String, PreferenceValue>,
}

impl Preferences {
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut values = HashMap::new();
        for &name in RECOGNIZED_NAMES {
            values.insert(name.to_string(), default_value(name));
        }
        Preferences { values }
    }

    pub fn get(&self, name: &str) -> Result<&PreferenceValue> {
        self.values
            .get(name)
            .ok_or_else(|| ProxyError::Validation(format!("preference {name} is not set")))
    }

    pub fn get_or(&self, name: &str, fallback: PreferenceValue) -> PreferenceValue {
        self.values.get(name).cloned().unwrap_or(fallback)
    }

    pub fn set(&mut self, name: &str, value: PreferenceValue) -> Result<()> {
        if name == "FakenameInput" {
            let text = match &value {
                PreferenceValue::Text(t) => t.as_str(),
                _ => "",
            };
            if text.len() <= 1 {
                return Err(ProxyError::Validation(
                    "FakenameInput must be longer than one character".to_string(),
                ));
            }
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Loads a flat JSON object, ignoring keys the GUI does not recognise —
    /// unrecognised keys in the file are kept but never consulted by any
    /// handler. Missing file is not an error: defaults stand.
    pub fn load_from_file(path: &Path) -> Self {
        let mut prefs = Preferences::with_defaults();
        let Ok(contents) = std::fs::read_to_string(path) else {
            return prefs;
        };
        let Ok(Json::Object(map)) = serde_json::from_str::<Json>(&contents) else {
            warn!(path = %path.display(), "preferences file is not a JSON object, ignoring");
            return prefs;
        };
        for name in RECOGNIZED_NAMES {
            if let Some(value) = map.get(*name) {
                let _ = prefs.set(name, PreferenceValue::from_json_like(name, value));
            }
        }
        prefs
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let mut map = serde_json::Map::new();
        for &name in RECOGNIZED_NAMES {
            if let Some(value) = self.values.get(name) {
                map.insert(name.to_string(), value.to_json());
            }
        }
        let contents = serde_json::to_string(&Json::Object(map))
            .map_err(mc_protocol::ProtocolError::from)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_recognized_name() {
        let prefs = Preferences::with_defaults();
        for &name in RECOGNIZED_NAMES {
            assert!(prefs.get(name).is_ok(), "missing default for {name}");
        }
    }

    #[test]
    fn fakename_rejects_short_values() {
        let mut prefs = Preferences::with_defaults();
        assert!(
            prefs
                .set("FakenameInput", PreferenceValue::Text("B".to_string()))
                .is_err()
        );
        assert!(
            prefs
                .set("FakenameInput", PreferenceValue::Text(String::new()))
                .is_err()
        );
        assert!(
            prefs
                .set("FakenameInput", PreferenceValue::Text("Bob".to_string()))
                .is_ok()
        );
    }

    #[test]
    fn get_unset_name_fails() {
        let prefs = Preferences::default();
        assert!(prefs.get("_Abilities").is_err());
    }

    #[test]
    fn save_then_load_round_trips_and_ignores_unknown_keys() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("mc-proxy-test-prefs-{:p}.json", &dir));
        let mut prefs = Preferences::with_defaults();
        prefs
            .set("movementSpeed", PreferenceValue::Float(1.25))
            .unwrap();
        prefs.save_to_file(&path).unwrap();

        // tack an unrecognised key on, matching the original's `if item_name
        // in self._local_preferences.keys()` load guard
        let mut raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        raw["notARealPreference"] = serde_json::json!(true);
        std::fs::write(&path, raw.to_string()).unwrap();

        let loaded = Preferences::load_from_file(&path);
        assert_eq!(loaded.get("movementSpeed").unwrap().as_f32(), Some(1.25));
        let _ = std::fs::remove_file(&path);
    }
}
