pub mod archive;
pub mod camera_manager;
pub mod camera_worker;
pub mod capture_source;
pub mod code_scanner;
pub mod connection;
pub mod frame_grabber;
pub mod orchestrator;
pub mod persistence;
pub mod recording;
pub mod recording_writer;
pub mod retention;
pub mod status;
