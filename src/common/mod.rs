pub mod file_utils;
pub mod logging_setup;
pub mod shutdown;
pub mod thread_utils;
pub mod timestamp_utils;
