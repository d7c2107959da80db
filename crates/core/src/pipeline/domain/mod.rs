pub mod clock;
pub mod result_sink;
