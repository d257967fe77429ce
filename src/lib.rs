pub mod backdrop;
pub mod classify;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod halo;
pub mod icon_cache;
pub mod job;
pub mod localization;
pub mod model;
pub mod overrides;
pub mod pipeline;
pub mod projection;
pub mod render;
pub mod session;
pub mod style;
pub mod text;
pub mod text_metrics;

#[cfg(feature = "cli")]
pub use cli::run;
pub use job::render_pattern;
