//! hero-viewer - rotating glTF model viewer
//!
//! Usage: `hero-viewer [hero | showcase | <config.json>]`

use hero_viewer::config::{ConfigError, ViewerConfig};
use std::path::Path;

fn load_config(arg: Option<String>) -> Result<ViewerConfig, ConfigError> {
    match arg {
        None => Ok(ViewerConfig::hero()),
        Some(arg) => match ViewerConfig::preset(&arg) {
            Some(config) => Ok(config),
            None => ViewerConfig::load(Path::new(&arg)),
        },
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config = load_config(std::env::args().nth(1)).map_err(|e| {
        log::error!("{e}");
        e
    })?;
    hero_viewer::app::run(config)?;
    Ok(())
}
