use crate::shared::frame_result::FrameResult;

/// Receives each normalized result, inline on the loop's thread.
///
/// Called at most once per processed frame, in strictly increasing
/// timestamp order. Implementations must not block.
pub trait ResultSink: Send {
    fn on_frame_result(&mut self, result: &FrameResult);
}

/// Forwards every result to several sinks, in registration order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn ResultSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl ResultSink + 'static) -> Self {
        self.push(Box::new(sink));
        self
    }

    pub fn push(&mut self, sink: Box<dyn ResultSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ResultSink for FanoutSink {
    fn on_frame_result(&mut self, result: &FrameResult) {
        for sink in &mut self.sinks {
            sink.on_frame_result(result);
        }
    }
}
