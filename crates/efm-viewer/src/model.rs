//! Strip configuration model and loading.
//!
//! Accepts the flat shape (`{"id", "strips": [{ "startHour", ..., "scans": [{"url"}] }]}`)
//! as well as the exported envelope
//! (`{"configData": {"strips": {"strip": [{ "_startHour", ..., "scans": {"scan": [{"_url"}]}}]}}}`).
//! Exported files carry numbers as strings and collapse one-element lists to
//! objects, so both are tolerated.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{Result, ViewerError};
use crate::time::{StripTimes, hms_to_milliseconds};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    Ok(match Option::<NumberOrText>::deserialize(deserializer)? {
        Some(NumberOrText::Number(value)) => value,
        Some(NumberOrText::Text(text)) => text.trim().parse().unwrap_or(0.0),
        None => 0.0,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(value) => value.to_string(),
        NumberOrText::Text(text) => text,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScanList {
    Wrapped { scan: OneOrMany<Scan> },
    Flat(OneOrMany<Scan>),
}

fn scan_list<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<Scan>, D::Error> {
    Ok(match Option::<ScanList>::deserialize(deserializer)? {
        Some(ScanList::Wrapped { scan }) | Some(ScanList::Flat(scan)) => scan.into_vec(),
        None => Vec::new(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StripList {
    Wrapped { strip: OneOrMany<Strip> },
    Flat(OneOrMany<Strip>),
}

fn strip_list<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<Strip>, D::Error> {
    Ok(match Option::<StripList>::deserialize(deserializer)? {
        Some(StripList::Wrapped { strip }) | Some(StripList::Flat(strip)) => strip.into_vec(),
        None => Vec::new(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    #[serde(alias = "_url")]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strip {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "_startHour", deserialize_with = "lenient_number")]
    pub start_hour: f64,
    #[serde(
        default,
        alias = "startMinute",
        alias = "_startMinute",
        deserialize_with = "lenient_number"
    )]
    pub start_min: f64,
    #[serde(
        default,
        alias = "startSecond",
        alias = "_startSecond",
        deserialize_with = "lenient_number"
    )]
    pub start_sec: f64,
    #[serde(default, alias = "_endHour", deserialize_with = "lenient_number")]
    pub end_hour: f64,
    #[serde(
        default,
        alias = "endMinute",
        alias = "_endMinute",
        deserialize_with = "lenient_number"
    )]
    pub end_min: f64,
    #[serde(
        default,
        alias = "endSecond",
        alias = "_endSecond",
        deserialize_with = "lenient_number"
    )]
    pub end_sec: f64,
    #[serde(default, deserialize_with = "scan_list")]
    pub scans: Vec<Scan>,
}

impl Strip {
    /// Millisecond range of the strip; the end must come after the start.
    pub fn times(&self) -> Result<StripTimes> {
        let times = StripTimes {
            media_start_time: hms_to_milliseconds(self.start_hour, self.start_min, self.start_sec),
            media_end_time: hms_to_milliseconds(self.end_hour, self.end_min, self.end_sec),
        };
        if times.media_end_time <= times.media_start_time {
            return Err(ViewerError::InvalidStrip {
                id: self.id.clone(),
                reason: format!(
                    "end {}ms is not after start {}ms",
                    times.media_end_time, times.media_start_time
                ),
            });
        }
        Ok(times)
    }

    pub fn scan_urls(&self) -> Vec<String> {
        self.scans.iter().map(|scan| scan.url.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfigData {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "strip_list")]
    pub strips: Vec<Strip>,
}

impl ConfigData {
    pub fn from_value(value: Value) -> Result<Self> {
        let inner = match value {
            Value::Object(mut map) if map.contains_key("configData") => {
                map.remove("configData").unwrap_or(Value::Null)
            }
            other => other,
        };
        let config: ConfigData = serde_json::from_value(inner)?;
        for strip in &config.strips {
            if let Err(error) = strip.times() {
                warn!(%error, "strip has an unusable time range");
            }
        }
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Strip by id; an empty id selects the first strip.
    pub fn strip(&self, id: &str) -> Option<&Strip> {
        if id.is_empty() {
            self.strips.first()
        } else {
            self.strips.iter().find(|strip| strip.id == id)
        }
    }
}

/// Source of strip configuration.
pub trait ConfigLoader {
    fn load_config(&self) -> Result<ConfigData>;
}

/// Reads configuration from a JSON file.
#[derive(Debug, Clone)]
pub struct FileConfigLoader {
    path: PathBuf,
}

impl FileConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigLoader for FileConfigLoader {
    fn load_config(&self) -> Result<ConfigData> {
        ConfigData::from_path(&self.path)
    }
}

impl ConfigLoader for ConfigData {
    fn load_config(&self) -> Result<ConfigData> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const ENVELOPE: &str = r#"{
        "configData": {
            "id": 7,
            "strips": {
                "strip": [
                    {
                        "id": "3978fs",
                        "title": "Strip A",
                        "_startHour": "0", "_startMinute": "10", "_startSecond": "0",
                        "_endHour": "0", "_endMinute": "12", "_endSecond": "0",
                        "scans": { "scan": [ { "_url": "a1.jpg" }, { "_url": "a2.jpg" } ] }
                    },
                    {
                        "id": 42,
                        "title": "Strip B",
                        "_startHour": 1, "_startMinute": 0, "_startSecond": 0,
                        "_endHour": 1, "_endMinute": 30, "_endSecond": 0,
                        "scans": { "scan": { "_url": "b1.jpg" } }
                    }
                ]
            }
        }
    }"#;

    #[test]
    fn test_parses_exported_envelope() {
        let config = ConfigData::from_json_str(ENVELOPE).unwrap();
        assert_eq!(config.id, "7");
        assert_eq!(config.strips.len(), 2);
        let a = &config.strips[0];
        assert_eq!(a.scan_urls(), ["a1.jpg", "a2.jpg"]);
        let times = a.times().unwrap();
        assert_eq!(times.media_start_time, 600_000);
        assert_eq!(times.media_end_time, 720_000);
        let b = config.strip("42").unwrap();
        assert_eq!(b.scans.len(), 1);
        assert_eq!(b.times().unwrap().span_ms(), 1_800_000);
    }

    #[test]
    fn test_parses_flat_shape() {
        let config = ConfigData::from_json_str(
            r#"{"strips": [{"id": "s", "title": "S", "startMin": 1, "endMin": 2, "scans": [{"url": "x.jpg"}]}]}"#,
        )
        .unwrap();
        assert_eq!(config.strips[0].times().unwrap().span_ms(), 60_000);
        assert_eq!(config.strips[0].scans[0].url, "x.jpg");
    }

    #[test]
    fn test_strip_lookup_defaults_to_first() {
        let config = ConfigData::from_json_str(ENVELOPE).unwrap();
        assert_eq!(config.strip("").map(|s| s.id.as_str()), Some("3978fs"));
        assert!(config.strip("nope").is_none());
    }

    #[test]
    fn test_rejects_inverted_times() {
        let config = ConfigData::from_json_str(
            r#"{"strips": [{"id": "bad", "startMin": 5, "endMin": 5}]}"#,
        )
        .unwrap();
        assert!(matches!(
            config.strips[0].times(),
            Err(ViewerError::InvalidStrip { .. })
        ));
    }

    #[test]
    fn test_file_loader() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{ENVELOPE}").unwrap();
        let config = FileConfigLoader::new(file.path()).load_config().unwrap();
        assert_eq!(config.strips.len(), 2);
        assert!(FileConfigLoader::new("/no/such/strips.json").load_config().is_err());
    }
}
