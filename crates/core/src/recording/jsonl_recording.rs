use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use crate::pipeline::domain::result_sink::ResultSink;
use crate::shared::frame_result::FrameResult;
use crate::state::capture_store::CaptureStore;

#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("recording I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode frame result: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("malformed recording at line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Appends delivered results as JSON lines while the store is capturing.
///
/// Write failures are logged and counted but never reach the loop. The
/// buffered file writer flushes when the sink is dropped.
pub struct RecordingSink<W: Write + Send> {
    writer: W,
    store: CaptureStore,
    frames_written: u64,
    write_errors: u64,
}

impl RecordingSink<BufWriter<File>> {
    pub fn create(path: &Path, store: CaptureStore) -> Result<Self, RecordingError> {
        let file = File::create(path)?;
        log::info!("recording landmarks to {}", path.display());
        Ok(Self::new(BufWriter::new(file), store))
    }
}

impl<W: Write + Send> RecordingSink<W> {
    pub fn new(writer: W, store: CaptureStore) -> Self {
        Self {
            writer,
            store,
            frames_written: 0,
            write_errors: 0,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn write_errors(&self) -> u64 {
        self.write_errors
    }

    pub fn into_inner(mut self) -> W {
        if let Err(e) = self.writer.flush() {
            log::warn!("failed to flush recording: {e}");
        }
        self.writer
    }

    fn append(&mut self, result: &FrameResult) -> Result<(), RecordingError> {
        let line = serde_json::to_string(result).map_err(RecordingError::Encode)?;
        writeln!(self.writer, "{line}")?;
        Ok(())
    }
}

impl<W: Write + Send> ResultSink for RecordingSink<W> {
    fn on_frame_result(&mut self, result: &FrameResult) {
        if !self.store.is_capturing() {
            return;
        }
        match self.append(result) {
            Ok(()) => self.frames_written += 1,
            Err(e) => {
                self.write_errors += 1;
                log::warn!(
                    "dropped frame at {:?} from recording: {e}",
                    result.timestamp()
                );
            }
        }
    }
}

/// Reads a recording written by [`RecordingSink`]. Blank lines are
/// skipped; line numbers in errors are 1-based.
pub fn read_recording(reader: impl BufRead) -> Result<Vec<FrameResult>, RecordingError> {
    let mut results = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let result = serde_json::from_str(&line).map_err(|source| RecordingError::Parse {
            line: idx + 1,
            source,
        })?;
        results.push(result);
    }
    Ok(results)
}

pub fn read_recording_file(path: &Path) -> Result<Vec<FrameResult>, RecordingError> {
    let file = File::open(path)?;
    read_recording(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::landmark::{Landmark, LandmarkSet};
    use std::io::Cursor;
    use std::time::Duration;

    fn result(ms: u64) -> FrameResult {
        FrameResult::new(
            Duration::from_millis(ms),
            LandmarkSet::new(vec![Landmark::new(0.5, 0.25, -0.1)]),
            LandmarkSet::empty(),
            LandmarkSet::empty(),
            LandmarkSet::new(vec![Landmark::new(0.9, 0.8, 0.0)]),
        )
    }

    fn capturing_store() -> CaptureStore {
        let store = CaptureStore::new();
        store.set_capturing(true);
        store
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writes_one_line_per_result_while_capturing() {
        let mut sink = RecordingSink::new(Vec::new(), capturing_store());

        sink.on_frame_result(&result(10));
        sink.on_frame_result(&result(20));

        assert_eq!(sink.frames_written(), 2);
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().next().unwrap().contains("\"timestamp\":10"));
    }

    #[test]
    fn test_skips_results_while_not_capturing() {
        let store = CaptureStore::new();
        let mut sink = RecordingSink::new(Vec::new(), store.clone());

        sink.on_frame_result(&result(10));
        store.toggle_capturing();
        sink.on_frame_result(&result(20));

        assert_eq!(sink.frames_written(), 1);
        let recorded = read_recording(Cursor::new(sink.into_inner())).unwrap();
        assert_eq!(recorded, vec![result(20)]);
    }

    #[test]
    fn test_write_errors_are_counted_not_raised() {
        let mut sink = RecordingSink::new(BrokenWriter, capturing_store());

        sink.on_frame_result(&result(10));
        sink.on_frame_result(&result(20));

        assert_eq!(sink.frames_written(), 0);
        assert_eq!(sink.write_errors(), 2);
    }

    #[test]
    fn test_file_recording_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        {
            let mut sink = RecordingSink::create(&path, capturing_store()).unwrap();
            sink.on_frame_result(&result(0));
            sink.on_frame_result(&result(33));
        }

        let recorded = read_recording_file(&path).unwrap();

        assert_eq!(recorded, vec![result(0), result(33)]);
    }

    #[test]
    fn test_read_skips_blank_lines() {
        let line = serde_json::to_string(&result(5)).unwrap();
        let text = format!("\n{line}\n   \n");
        let recorded = read_recording(Cursor::new(text)).unwrap();
        assert_eq!(recorded.len(), 1);
    }

    #[test]
    fn test_read_reports_line_of_malformed_entry() {
        let good = serde_json::to_string(&result(5)).unwrap();
        let text = format!("{good}\n{{\"timestamp\": \"soon\"}}\n");

        let err = read_recording(Cursor::new(text)).unwrap_err();

        assert!(matches!(err, RecordingError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let err = read_recording_file(Path::new("/nonexistent/session.jsonl")).unwrap_err();
        assert!(matches!(err, RecordingError::Io(_)));
    }
}
