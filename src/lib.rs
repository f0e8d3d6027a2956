//! Order-code triggered multi-camera recording engine.
//!
//! Each configured camera is kept connected, its newest frame scanned for a
//! printed order code, and a video named after that code is recorded until
//! the label is scanned again. A timing record is written next to every
//! video, and old artifacts are swept after a retention window.

pub mod app_config;
pub mod camera;
pub mod camera_config;
pub mod common;
pub mod config_loader;
pub mod core;
pub mod errors;
