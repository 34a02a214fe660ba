//! Interactive preview for the kiln compositor.
//!
//! Opens a window with a grid of pickable tiles and labels. The tile under the
//! cursor is resolved from the pick id layer and highlighted; the id is shown
//! in the window title.

mod app;
mod scene;

use anyhow::Result;
use kiln_engine::logging::{init_logging, LoggingConfig};

fn main() -> Result<()> {
    init_logging(LoggingConfig {
        env_filter: std::env::var("RUST_LOG")
            .ok()
            .or_else(|| Some("info,wgpu_core=warn,wgpu_hal=warn".to_string())),
        ..Default::default()
    });

    app::run(app::StudioConfig::default())
}
