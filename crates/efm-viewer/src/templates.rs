//! Markup templates for the viewer components.
//!
//! Each template is a pure function of the escaped store snapshot. Class
//! names match the default `[selectors]` configuration.

use serde_json::Value;

use crate::state::current_strip;

const SPEED_OPTIONS: [f64; 3] = [1.0, 2.0, 4.0];

fn text<'a>(data: &'a Value, pointer: &str) -> &'a str {
    data.pointer(pointer).and_then(Value::as_str).unwrap_or_default()
}

fn number(data: &Value, pointer: &str) -> Option<f64> {
    data.pointer(pointer).and_then(Value::as_f64)
}

/// Root layout; every region is filled by an attached component.
pub fn player(_data: &Value) -> String {
    concat!(
        r#"<div class="efm__media"></div>"#,
        r#"<div class="efm__controls" role="toolbar" aria-label="efm controls">"#,
        r#"<form class="efm__timeline columns is-centered no-margin-bottom"></form>"#,
        r#"<div class="efm__controlBar"></div>"#,
        r#"<div class="efm__menuBar has-text-justified flex-justify"></div>"#,
        r#"</div>"#,
    )
    .to_string()
}

/// The collection node is owned by the scan list component, so it carries no
/// per-strip attributes of its own.
pub fn strip(data: &Value) -> String {
    format!(
        r#"<div class="efm__media-collection"></div><div class="efm__loader" data-state="{}"></div>"#,
        text(data, "/viewer/hasState"),
    )
}

pub fn scan_items(data: &Value) -> String {
    let scans = current_strip(data)
        .and_then(|strip| strip["scans"].as_array())
        .filter(|scans| !scans.is_empty());
    match scans {
        Some(scans) => scans
            .iter()
            .map(|scan| {
                format!(
                    r#"<div class="efm__media-item"><div class="efm__content"><img src="{}" alt=""></div></div>"#,
                    scan["url"].as_str().unwrap_or_default()
                )
            })
            .collect(),
        None => r#"<p class="efm__media-empty">No scans found.</p>"#.to_string(),
    }
}

/// Seek bar. The live `value` and `aria-valuenow` belong to the timeline
/// after creation, so the template only seeds them.
pub fn timeline(_data: &Value) -> String {
    concat!(
        r#"<fieldset class="column is-full">"#,
        r#"<input type="range" class="efm__seek-bar" list="tick-values" min="0" max="100" step="any" "#,
        r#"defaultvalue="0" aria-valuemin="0" aria-valuemax="100" defaultaria-valuenow="0">"#,
        r#"<datalist id="tick-values"><option value="10" label="Low"></option>"#,
        r#"<option value="90" label="High"></option></datalist>"#,
        r#"</fieldset>"#,
    )
    .to_string()
}

pub fn control_bar(data: &Value) -> String {
    let play_class = text(data, "/controlBar/playPauseButtonSelector").trim_start_matches('.');
    let icon = text(data, "/controlBar/hasState");
    let offset = number(data, "/controlBar/skipOffset").unwrap_or(15.0);
    let speed = number(data, "/viewer/speed").unwrap_or(1.0);
    let options: String = SPEED_OPTIONS
        .iter()
        .map(|option| {
            let selected = if *option == speed { " selected" } else { "" };
            format!(
                r#"<option value="{option}" title="Set Playback Speed {option}"{selected}>x{option}</option>"#
            )
        })
        .collect();
    format!(
        concat!(
            r#"<form class="columns no-margin-bottom"><fieldset class="efm__group column is-full">"#,
            r#"<button class="efm__backward" title="Skip Backward" data-offset="{offset}"><i class="mdi mdi-history"></i></button>"#,
            r#"<button class="{play_class}" title="Play/Pause"><i class="mdi {icon}"></i></button>"#,
            r#"<button class="efm__forward" title="Skip Forward" data-offset="{offset}"><i class="mdi mdi-history mdi-flip-h"></i></button>"#,
            r#"<label for="efm__play-speed"></label>"#,
            r#"<div class="select"><select class="efm__play-speed" id="efm__play-speed" title="Select Playback Speed">{options}</select></div>"#,
            r#"<span class="efm__timer"></span>"#,
            r#"</fieldset></form>"#,
        ),
        offset = offset,
        play_class = play_class,
        icon = icon,
        options = options,
    )
}

pub fn timer(data: &Value) -> String {
    format!(
        r#"<span class="efm__timer-current">{}</span> / <span class="efm__timer-total">{}</span>"#,
        text(data, "/timer/timerCurrent"),
        text(data, "/timer/timerTotal"),
    )
}

pub fn loader(_data: &Value) -> String {
    concat!(
        r#"<i class="mdi mdi-48px mdi-spin mdi-loading"></i>"#,
        r#"<svg class="efm__loader--svg" aria-label="Loading scans" preserveAspectRatio="none">"#,
        r#"<rect rx="3" ry="3" width="100%" height="100%"></rect></svg>"#,
    )
    .to_string()
}

pub fn menu_bar(data: &Value) -> String {
    let state = text(data, "/menuBar/machine/currentState");
    let attrs = data
        .pointer("/menuBar/machine/states")
        .and_then(|states| states.get(state))
        .map(|state| &state["attrs"]);
    let attr = |name: &str| {
        attrs
            .and_then(|attrs| attrs[name].as_str())
            .unwrap_or_default()
            .trim()
            .to_string()
    };
    let dropdown_class = match attr("className") {
        class if class.is_empty() => String::new(),
        class => format!(" {class}"),
    };
    let expanded = match attr("ariaExpanded") {
        value if value.is_empty() => "false".to_string(),
        value => value,
    };
    format!(
        concat!(
            r#"<div class="efm__menuBar-dots margin-right-auto"><span></span><span></span><span></span></div>"#,
            r#"<div class="efm__menuBar-strip border-radius-rounded dropdown{dropdown_class}">"#,
            r#"<button class="efm__menuBar-strip--title text-truncate button dropdown-trigger" aria-haspopup="true" aria-expanded="{expanded}" aria-controls="dropdown-menu-strips">"#,
            r#"<span>{title}</span><span class="icon is-large absolute"><i class="mdi mdi-menu-down" aria-hidden="true"></i></span>"#,
            r#"</button>"#,
            r#"<div class="dropdown-menu" id="dropdown-menu-strips" role="menu"><div class="dropdown-content">"#,
            r#"<div class="dropdown-menu__strips"></div>"#,
            r#"</div></div></div>"#,
            r#"<div class="efm__menuBar-media margin-left-auto"></div>"#,
        ),
        dropdown_class = dropdown_class,
        expanded = expanded,
        title = text(data, "/menuBar/title"),
    )
}

pub fn menu_bar_strips(data: &Value) -> String {
    let current = text(data, "/strip/id");
    data.pointer("/config/strips")
        .and_then(Value::as_array)
        .map(|strips| {
            strips
                .iter()
                .map(|strip| {
                    let id = strip["id"].as_str().unwrap_or_default();
                    let active = if id == current { " is-active" } else { "" };
                    format!(
                        r#"<a class="dropdown-item strip-item border-bottom{active}" data-strip-id="{id}">{} - {id}</a>"#,
                        strip["title"].as_str().unwrap_or_default()
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}
