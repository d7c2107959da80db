pub mod domain;
pub mod frame_loop;
pub mod loop_logger;
pub mod refresh_driver;
