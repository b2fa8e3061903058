//! Core modules for storypoint

pub mod locator;
pub mod normalizer;
pub mod extract;
pub mod derive;
pub mod writer;
pub mod pipeline;
pub mod session;
pub mod shortcuts;
pub mod triggers;
pub mod controller;
pub mod api;

pub use locator::{raw_value, Located, Locator};
pub use normalizer::{
    combine_durations, parse_complexity, parse_duration, parse_priority, parse_time_summary,
};
pub use extract::Extractor;
pub use derive::{derive, derive_linear};
pub use writer::Writer;
pub use pipeline::{evaluate, score_for, Pipeline};
pub use session::SessionFlag;
pub use shortcuts::{KeyCombo, Shortcuts};
pub use triggers::{spawn_poller, Debouncer};
pub use controller::{
    is_relevant, route_edit, spawn_consumer, Controller, ControllerStatus, EditRoute,
    SharedController,
};
pub use api::{create_router, run_server, AppState};
