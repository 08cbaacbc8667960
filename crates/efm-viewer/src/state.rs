//! Viewer store: typed state sections, getters and setters.
//!
//! The store holds one JSON graph with the sections below. Templates read the
//! escaped snapshot; everything else goes through the named setters so the
//! runtime can coalesce renders.
//!
//! | section      | owner setters                                   |
//! |--------------|-------------------------------------------------|
//! | `config`     | `loadConfig`                                    |
//! | `viewer`     | `setViewerState`, `setSpeed`                    |
//! | `strip`      | `setStrip`, `setSpeed`                          |
//! | `menuBar`    | `setStrip`, `toggleMenu`                        |
//! | `timer`      | `setStrip`, `setTimer`                          |
//! | `controlBar` | `setControlState`                               |

use efm_config::EfmConfig;
use efm_reactive::{Draft, Store};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{Result, ViewerError};
use crate::machine::{StateMachine, TOGGLE};
use crate::model::{ConfigData, Strip};
use crate::time::StripTimes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoadState {
    #[default]
    #[serde(rename = "is-loading")]
    Loading,
    #[serde(rename = "is-ready")]
    Ready,
}

impl LoadState {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadState::Loading => "is-loading",
            LoadState::Ready => "is-ready",
        }
    }
}

/// Icon class of the play/pause button. Playing shows the pause glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayIcon {
    #[serde(rename = "mdi-pause")]
    Playing,
    #[default]
    #[serde(rename = "mdi-play")]
    Paused,
}

impl PlayIcon {
    pub fn as_str(self) -> &'static str {
        match self {
            PlayIcon::Playing => "mdi-pause",
            PlayIcon::Paused => "mdi-play",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerSection {
    pub has_state: LoadState,
    pub speed: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StripSection {
    pub duration: f64,
    pub id: Option<String>,
    pub times: Option<StripTimes>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuBarSection {
    pub title: String,
    pub machine: StateMachine,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSection {
    pub timer_current: String,
    pub timer_total: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlBarSection {
    /// Play button selector; the template uses it without the leading dot.
    pub play_pause_button_selector: String,
    pub has_state: PlayIcon,
    /// Minutes carried on the skip buttons as `data-offset`.
    pub skip_offset: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreState {
    pub config: ConfigData,
    pub viewer: ViewerSection,
    pub strip: StripSection,
    pub menu_bar: MenuBarSection,
    pub timer: TimerSection,
    pub control_bar: ControlBarSection,
}

impl StoreState {
    pub fn new(config: ConfigData, settings: &EfmConfig) -> Self {
        Self {
            config,
            viewer: ViewerSection {
                has_state: LoadState::Loading,
                speed: settings.viewer.speed,
            },
            strip: StripSection::default(),
            menu_bar: MenuBarSection {
                title: String::new(),
                machine: StateMachine::menu_bar(),
            },
            timer: TimerSection {
                timer_current: "00:00".to_string(),
                timer_total: "00:00".to_string(),
            },
            control_bar: ControlBarSection {
                play_pause_button_selector: settings.selectors.play_button.clone(),
                has_state: PlayIcon::Paused,
                skip_offset: settings.viewer.skip_offset_minutes,
            },
        }
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Reads one typed section out of a store graph.
pub fn section<T: DeserializeOwned>(data: &Value, key: &str) -> Option<T> {
    data.get(key)
        .and_then(|value| serde_json::from_value(value.clone()).ok())
}

/// The configured strip whose id matches `strip.id`.
pub fn current_strip(data: &Value) -> Option<&Value> {
    let id = data["strip"]["id"].as_str()?;
    data["config"]["strips"]
        .as_array()?
        .iter()
        .find(|strip| strip["id"].as_str() == Some(id))
}

fn strip_by_id(data: &Value, id: &str) -> Option<Strip> {
    let strips = data["config"]["strips"].as_array()?;
    let found = if id.is_empty() {
        strips.first()
    } else {
        strips.iter().find(|strip| strip["id"].as_str() == Some(id))
    }?;
    serde_json::from_value(found.clone()).ok()
}

fn speed(data: &Value) -> f64 {
    data["viewer"]["speed"]
        .as_f64()
        .filter(|speed| *speed > 0.0)
        .unwrap_or(1.0)
}

fn strip_times(data: &Value) -> Option<StripTimes> {
    section::<StripSection>(data, "strip").and_then(|strip| strip.times)
}

fn refresh_duration(draft: &mut Draft<'_>) {
    if let Some(times) = strip_times(draft.data()) {
        let duration = times.duration_ms(speed(draft.data()));
        draft.set("strip.duration", duration);
    }
}

fn set_strip(draft: &mut Draft<'_>, args: &[Value]) {
    let requested = args.first().and_then(Value::as_str).unwrap_or_default();
    let Some(strip) = strip_by_id(draft.data(), requested) else {
        warn!(strip = requested, "no such strip configured");
        return;
    };
    let times = match strip.times() {
        Ok(times) => times,
        Err(error) => {
            warn!(%error, "strip cannot be selected");
            return;
        }
    };
    let Ok(times_value) = serde_json::to_value(times) else {
        return;
    };
    let duration = times.duration_ms(speed(draft.data()));
    draft.set("strip.id", strip.id.clone());
    draft.set("strip.title", strip.title.clone());
    draft.set("strip.times", times_value);
    draft.set("strip.duration", duration);
    draft.set("menuBar.title", strip.title);
    draft.set("timer.timerCurrent", times.clock_at(0.0));
    draft.set("timer.timerTotal", times.total_label());
}

fn toggle_menu(draft: &mut Draft<'_>, args: &[Value]) {
    let event = args.first().and_then(Value::as_str).unwrap_or(TOGGLE);
    let Some(mut machine) = draft
        .get("menuBar.machine")
        .and_then(|value| serde_json::from_value::<StateMachine>(value.clone()).ok())
    else {
        warn!("menu state machine missing from store");
        return;
    };
    machine.fire(event);
    if let Ok(value) = serde_json::to_value(&machine) {
        draft.set("menuBar.machine", value);
    }
}

/// Builds the viewer store over `state`.
pub fn build_store(state: &StoreState) -> Result<Store> {
    let store = Store::builder(state.to_value()?)
        .getter("configData", |data| data["config"].clone())
        .getter("stripData", |data| data["config"]["strips"].clone())
        .getter("strip", |data| data["strip"].clone())
        .getter("stripID", |data| data["strip"]["id"].clone())
        .getter("viewerData", |data| data["viewer"].clone())
        .getter("menuBar", |data| data["menuBar"].clone())
        .getter("timer", |data| data["timer"].clone())
        .getter("controlBar", |data| data["controlBar"].clone())
        .getter("currentStrip", |data| {
            current_strip(data).cloned().unwrap_or(Value::Null)
        })
        .setter("loadConfig", |draft, args| {
            let Some(raw) = args.first() else {
                return;
            };
            match ConfigData::from_value(raw.clone()).and_then(|config| {
                serde_json::to_value(config).map_err(ViewerError::from)
            }) {
                Ok(config) => {
                    draft.set("config", config);
                }
                Err(error) => warn!(%error, "configuration not loaded"),
            }
        })
        .setter("setStrip", set_strip)
        .setter("setTimer", |draft, args| {
            let current = args.first().and_then(Value::as_f64).unwrap_or(0.0);
            if let Some(times) = strip_times(draft.data()) {
                draft.set("timer.timerCurrent", times.clock_at(current));
                draft.set("timer.timerTotal", times.total_label());
            }
        })
        .setter("setControlState", |draft, args| {
            match args.first().cloned().map(serde_json::from_value::<PlayIcon>) {
                Some(Ok(icon)) => {
                    draft.set("controlBar.hasState", icon.as_str());
                }
                _ => warn!(?args, "unknown play button state"),
            }
        })
        .setter("setViewerState", |draft, args| {
            match args.first().cloned().map(serde_json::from_value::<LoadState>) {
                Some(Ok(state)) => {
                    draft.set("viewer.hasState", state.as_str());
                }
                _ => warn!(?args, "unknown viewer state"),
            }
        })
        .setter("setSpeed", |draft, args| {
            match args.first().and_then(Value::as_f64) {
                Some(speed) if speed.is_finite() && speed > 0.0 => {
                    draft.set("viewer.speed", speed);
                    refresh_duration(draft);
                }
                _ => warn!(?args, "playback speed must be positive"),
            }
        })
        .setter("toggleMenu", toggle_menu)
        .build();
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ConfigData {
        ConfigData::from_json_str(
            r#"{"id": "cfg", "strips": [
                {"id": "a", "title": "Strip <A>", "startMin": 10, "endMin": 12, "scans": [{"url": "a.jpg"}]},
                {"id": "b", "title": "Strip B", "startHour": 1, "endHour": 2, "scans": []}
            ]}"#,
        )
        .unwrap()
    }

    fn store() -> Store {
        build_store(&StoreState::new(sample(), &EfmConfig::default())).unwrap()
    }

    #[test]
    fn test_initial_sections() {
        let store = store();
        assert_eq!(store.get("viewerData").unwrap(), json!({"hasState": "is-loading", "speed": 1.0}));
        assert_eq!(store.get("stripID").unwrap(), Value::Null);
        assert_eq!(store.get("controlBar").unwrap()["hasState"], "mdi-play");
        assert_eq!(store.get("menuBar").unwrap()["machine"]["currentState"], "inactive");
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_set_strip_fills_dependent_sections() {
        let mut store = store();
        assert!(store.dispatch("setStrip", &[json!("")]).unwrap());
        let strip: StripSection = section(store.raw(), "strip").unwrap();
        assert_eq!(strip.id.as_deref(), Some("a"));
        assert_eq!(strip.duration, 120_000.0);
        assert_eq!(
            strip.times,
            Some(StripTimes {
                media_start_time: 600_000,
                media_end_time: 720_000
            })
        );
        let timer: TimerSection = section(store.raw(), "timer").unwrap();
        assert_eq!(timer.timer_current, "10:00");
        assert_eq!(timer.timer_total, "12:00");
        assert_eq!(store.get("currentStrip").unwrap()["scans"][0]["url"], "a.jpg");
        // Templates see escaped text.
        assert_eq!(store.data()["menuBar"]["title"], "Strip &lt;A&gt;");

        // Same strip again changes nothing.
        assert!(!store.dispatch("setStrip", &[json!("a")]).unwrap());
        assert!(!store.dispatch("setStrip", &[json!("zzz")]).unwrap());
    }

    #[test]
    fn test_speed_rescales_duration() {
        let mut store = store();
        store.dispatch("setStrip", &[json!("b")]).unwrap();
        assert_eq!(store.get("strip").unwrap()["duration"], 3_600_000.0);
        store.dispatch("setSpeed", &[json!(4)]).unwrap();
        assert_eq!(store.get("strip").unwrap()["duration"], 900_000.0);
        assert!(!store.dispatch("setSpeed", &[json!(-1)]).unwrap());
        // Duration follows setStrip and setSpeed only.
        assert!(matches!(
            store.dispatch("setStripDuration", &[]),
            Err(efm_reactive::ReactiveError::UnknownSetter(_))
        ));
    }

    #[test]
    fn test_timer_and_icon_setters() {
        let mut store = store();
        store.dispatch("setStrip", &[json!("a")]).unwrap();
        store.dispatch("setTimer", &[json!(60_000.0)]).unwrap();
        assert_eq!(store.get("timer").unwrap()["timerCurrent"], "11:00");
        assert!(store.dispatch("setControlState", &[json!("mdi-pause")]).unwrap());
        assert!(!store.dispatch("setControlState", &[json!("mdi-bogus")]).unwrap());
        assert!(store.dispatch("setViewerState", &[json!("is-ready")]).unwrap());
    }

    #[test]
    fn test_toggle_menu_runs_machine() {
        let mut store = store();
        store.dispatch("toggleMenu", &[]).unwrap();
        assert_eq!(store.get("menuBar").unwrap()["machine"]["currentState"], "active");
        assert!(!store.dispatch("toggleMenu", &[json!("NOPE")]).unwrap());
        store.dispatch("toggleMenu", &[]).unwrap();
        assert_eq!(store.get("menuBar").unwrap()["machine"]["currentState"], "inactive");
    }

    #[test]
    fn test_load_config_accepts_envelope() {
        let mut store = store();
        let envelope = json!({"configData": {"id": "x", "strips": {"strip": {"id": "z", "_endMinute": "1"}}}});
        assert!(store.dispatch("loadConfig", &[envelope]).unwrap());
        assert_eq!(store.get("stripData").unwrap()[0]["id"], "z");
        assert!(!store.dispatch("loadConfig", &[json!("not a config")]).unwrap());
    }
}
