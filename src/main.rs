use anyhow::{Context, Result};
use efm_config::EfmConfig;
use efm_reactive::Document;
use efm_viewer::{ConfigData, ConfigLoader, DragState, FileConfigLoader, UiEvent, Viewer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SAMPLE_STRIPS: &str = include_str!("../demos/strips.json");
const VIEWPORT_WIDTH: f64 = 1024.0;

fn load_strips() -> Result<ConfigData> {
    match std::env::args().nth(1) {
        Some(path) => FileConfigLoader::new(&path)
            .load_config()
            .with_context(|| format!("loading strips from {path}")),
        None => Ok(ConfigData::from_json_str(SAMPLE_STRIPS)?),
    }
}

/// Reports every rendered scan as loaded, with a made-up width per image.
fn load_scans(viewer: &mut Viewer) -> Result<()> {
    for (index, src) in viewer.image_sources().into_iter().enumerate() {
        viewer.image_loaded(&src, 640.0 + 80.0 * index as f64)?;
    }
    Ok(())
}

fn report(viewer: &Viewer, label: &str) {
    let timer = viewer.timer().unwrap_or_default();
    let (strip, progress) = viewer
        .active_timeline()
        .map(|timeline| (timeline.strip_id().to_string(), timeline.progress()))
        .unwrap_or_default();
    info!(
        %strip,
        progress = %format!("{progress:.2}"),
        timer = %format!("{} / {}", timer.timer_current, timer.timer_total),
        "{label}"
    );
}

fn click(viewer: &mut Viewer, selector: &str) -> Result<()> {
    let node = viewer
        .document()
        .select(selector)?
        .with_context(|| format!("{selector} is not rendered"))?;
    viewer.handle_event(UiEvent::click(node))?;
    Ok(())
}

fn main() -> Result<()> {
    let config = EfmConfig::load();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_filter()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let strips = load_strips()?;
    let selectors = config.selectors.clone();
    let frame_ms = config.timeline.frame_interval_ms;

    let document = Document::from_markup(r#"<div data-efm-viewer></div>"#);
    let mut viewer = Viewer::mount(document, config, strips)?;
    viewer.set_viewport_width(VIEWPORT_WIDTH)?;
    load_scans(&mut viewer)?;
    report(&viewer, "ready");

    let mut now = 0.0;
    click(&mut viewer, &selectors.play_button)?;
    for _ in 0..120 {
        viewer.frame(now)?;
        now += frame_ms;
    }
    report(&viewer, "played two seconds");

    let seek_bar = viewer
        .document()
        .select(&selectors.seek_bar)?
        .context("seek bar is not rendered")?;
    viewer.document_mut().set_property(seek_bar, "value", "50")?;
    viewer.handle_event(UiEvent::change(seek_bar))?;
    viewer.frame(now)?;
    report(&viewer, "seeked to the middle");

    click(&mut viewer, &selectors.forward_time_button)?;
    viewer.frame(now)?;
    report(&viewer, "skipped forward");

    let travel = viewer.metrics().map(|metrics| metrics.displacement).unwrap_or_default();
    viewer.on_drag(DragState::at(-travel / 4.0))?;
    viewer.frame(now)?;
    report(&viewer, "dragged to a quarter");

    click(&mut viewer, &selectors.menu_bar_button)?;
    let next = viewer
        .get("stripData")?
        .as_array()
        .and_then(|strips| {
            strips
                .iter()
                .filter_map(|strip| strip["id"].as_str())
                .find(|id| Some(*id) != viewer.current_strip_id().as_deref())
                .map(str::to_string)
        });
    if let Some(id) = next {
        viewer.frame(now)?;
        click(&mut viewer, &format!(r#"[data-strip-id="{id}"]"#))?;
        load_scans(&mut viewer)?;
        report(&viewer, "switched strip");
    }

    viewer.destroy();
    Ok(())
}
