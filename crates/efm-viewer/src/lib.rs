//! EFM strip viewer.
//!
//! A horizontally scrolling row of scans played back against a per-strip
//! timeline. The [`Viewer`] owns a reactive [`efm_reactive::Runtime`] with a
//! single store, the components rendering each region, and a
//! [`TimelineRegistry`] of strip timelines. Hosts drive it by reporting image
//! loads, UI events, drag updates and animation frames.

pub mod coordinator;
pub mod error;
pub mod events;
pub mod gesture;
pub mod machine;
pub mod marquee;
pub mod model;
pub mod registry;
pub mod state;
pub mod templates;
pub mod time;
pub mod timeline;
pub mod viewer;

pub use coordinator::{SeekCoordinator, SeekSource};
pub use error::{Result, ViewerError};
pub use events::{EventBus, UiEvent, UiEventKind, ViewerAction};
pub use gesture::{DragBinding, DragState, Position};
pub use machine::{MachineState, StateMachine, TOGGLE};
pub use marquee::{ImageReadiness, MarqueeMetrics};
pub use model::{ConfigData, ConfigLoader, FileConfigLoader, Scan, Strip};
pub use registry::{TimelineEvent, TimelineRegistry};
pub use state::{LoadState, PlayIcon, StoreState, StripSection, TimerSection, build_store};
pub use time::{StripTimes, hms_to_milliseconds, seconds_to_hms};
pub use timeline::{StripTimeline, TimelineFrame, TimelineState};
pub use viewer::{Viewer, ViewerComponents};
