//! Rotating glTF model viewer component and the desktop host that embeds it.

pub mod app;
pub mod assets;
pub mod config;
pub mod dom;
pub mod render;
pub mod scene;
pub mod signal;
pub mod viewer;

#[cfg(test)]
mod testing;
