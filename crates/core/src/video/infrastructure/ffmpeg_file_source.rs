use std::path::Path;
use std::time::{Duration, Instant};

use crate::shared::frame::Frame;
use crate::video::domain::video_source::{SourceError, SourceReadiness, VideoSource};

/// Plays a video file in real time via ffmpeg-next.
///
/// Playback starts on the first readiness poll. Each poll decodes ahead
/// until the next frame's presentation timestamp is still in the future, so
/// `current_frame` is always the frame a viewer would be looking at.
pub struct FfmpegFileSource {
    decoding: Option<Decoding>,
    frame_interval: Duration,
    started_at: Option<Instant>,
    current: Option<Frame>,
    queued: Option<Frame>,
    exhausted: bool,
}

struct Decoding {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    video_stream_index: usize,
    time_base: f64,
    width: u32,
    height: u32,
    decoded_count: u64,
    flushing: bool,
}

// Safety: FfmpegFileSource is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegFileSource {}

impl FfmpegFileSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let open_err = |e: ffmpeg_next::Error| SourceError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        ffmpeg_next::init().map_err(open_err)?;
        let ictx = ffmpeg_next::format::input(&path).map_err(open_err)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| SourceError::Open {
                path: path.display().to_string(),
                reason: "no video stream found".to_string(),
            })?;

        let video_stream_index = stream.index();
        let time_base = f64::from(stream.time_base());
        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(open_err)?;
        let decoder = codec_ctx.decoder().video().map_err(open_err)?;
        let width = decoder.width();
        let height = decoder.height();

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(open_err)?;

        let frame_interval = if fps > 0.0 {
            Duration::from_secs_f64(1.0 / fps)
        } else {
            Duration::from_millis(33)
        };

        log::info!(
            "opened {} ({width}x{height}, {fps:.2} fps)",
            path.display()
        );

        Ok(Self {
            decoding: Some(Decoding {
                ictx,
                decoder,
                scaler,
                video_stream_index,
                time_base,
                width,
                height,
                decoded_count: 0,
                flushing: false,
            }),
            frame_interval,
            started_at: None,
            current: None,
            queued: None,
            exhausted: false,
        })
    }

    /// Advances playback to `elapsed` since the first poll.
    fn poll_at(&mut self, elapsed: Duration) -> SourceReadiness {
        if self.decoding.is_none() {
            return SourceReadiness::ended();
        }

        loop {
            if self.queued.is_none() && !self.exhausted {
                self.queued = self.decode_next();
                if self.queued.is_none() {
                    self.exhausted = true;
                }
            }
            let due = self
                .queued
                .as_ref()
                .is_some_and(|next| next.timestamp() <= elapsed);
            if !due {
                break;
            }
            self.current = self.queued.take();
        }

        let last_shown_until = self
            .current
            .as_ref()
            .map(|f| f.timestamp() + self.frame_interval);
        let ended = self.exhausted
            && self.queued.is_none()
            && last_shown_until.map_or(true, |until| elapsed >= until);

        SourceReadiness {
            playing: !ended,
            ended,
            has_enough_data: self.current.is_some(),
        }
    }

    fn decode_next(&mut self) -> Option<Frame> {
        let interval = self.frame_interval;
        let decoding = self.decoding.as_mut()?;
        match decoding.next_frame(interval) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("video decode failed, ending playback: {e}");
                None
            }
        }
    }
}

impl Decoding {
    fn next_frame(&mut self, interval: Duration) -> Result<Option<Frame>, ffmpeg_next::Error> {
        loop {
            if let Some(frame) = self.try_receive(interval)? {
                return Ok(Some(frame));
            }
            if self.flushing {
                return Ok(None);
            }

            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                continue;
            };
            if stream.index() != self.video_stream_index {
                continue;
            }
            if let Err(e) = self.decoder.send_packet(&packet) {
                log::debug!("skipping undecodable packet: {e}");
            }
        }
    }

    fn try_receive(&mut self, interval: Duration) -> Result<Option<Frame>, ffmpeg_next::Error> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&decoded, &mut rgb_frame)?;

        let timestamp = match decoded.timestamp().or_else(|| decoded.pts()) {
            Some(pts) if pts >= 0 => Duration::from_secs_f64(pts as f64 * self.time_base),
            _ => interval * self.decoded_count as u32,
        };
        self.decoded_count += 1;

        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        Ok(Some(Frame::new(pixels, self.width, self.height, 3, timestamp)))
    }
}

impl VideoSource for FfmpegFileSource {
    fn readiness(&mut self) -> SourceReadiness {
        let started_at = *self.started_at.get_or_insert_with(Instant::now);
        self.poll_at(started_at.elapsed())
    }

    fn current_timestamp(&self) -> Duration {
        self.current
            .as_ref()
            .map(Frame::timestamp)
            .unwrap_or_default()
    }

    fn current_frame(&mut self) -> Result<Frame, Box<dyn std::error::Error>> {
        if self.decoding.is_none() {
            return Err(SourceError::Released.into());
        }
        self.current
            .clone()
            .ok_or_else(|| "no frame decoded yet".into())
    }

    fn release(&mut self) {
        if self.decoding.take().is_some() {
            log::debug!("video decoder released");
        }
        self.current = None;
        self.queued = None;
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
/// dropping any per-row stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn create_test_video(path: &Path, num_frames: usize, width: u32, height: u32, fps: i32) {
        ffmpeg_next::init().unwrap();

        let mut octx = ffmpeg_next::format::output(path).unwrap();
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).unwrap();
        let mut ost = octx.add_stream(Some(codec)).unwrap();

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .unwrap();
        encoder_ctx.set_width(width);
        encoder_ctx.set_height(height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let mut encoder = encoder_ctx
            .open_with(ffmpeg_next::Dictionary::new())
            .unwrap();
        ost.set_parameters(&encoder);
        octx.write_header().unwrap();
        let ost_time_base = octx.stream(0).unwrap().time_base();

        let mut scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::format::Pixel::YUV420P,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .unwrap();

        for i in 0..num_frames {
            let mut rgb_frame = ffmpeg_next::util::frame::video::Video::new(
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
            );
            let value = ((i * 40) % 256) as u8;
            rgb_frame.data_mut(0).fill(value);

            let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
            scaler.run(&rgb_frame, &mut yuv_frame).unwrap();
            yuv_frame.set_pts(Some(i as i64));
            encoder.send_frame(&yuv_frame).unwrap();

            let mut encoded = ffmpeg_next::Packet::empty();
            while encoder.receive_packet(&mut encoded).is_ok() {
                encoded.set_stream(0);
                encoded.rescale_ts(ffmpeg_next::Rational(1, fps), ost_time_base);
                encoded.write_interleaved(&mut octx).unwrap();
            }
        }

        encoder.send_eof().unwrap();
        let mut encoded = ffmpeg_next::Packet::empty();
        while encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(0);
            encoded.rescale_ts(ffmpeg_next::Rational(1, fps), ost_time_base);
            encoded.write_interleaved(&mut octx).unwrap();
        }

        octx.write_trailer().unwrap();
    }

    fn test_video(dir: &Path) -> PathBuf {
        let path = dir.join("test.mp4");
        create_test_video(&path, 5, 160, 120, 10);
        path
    }

    #[test]
    fn test_first_frame_is_ready_at_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FfmpegFileSource::open(&test_video(dir.path())).unwrap();

        let readiness = source.poll_at(Duration::ZERO);

        assert!(readiness.is_ready());
        let frame = source.current_frame().unwrap();
        assert_eq!(frame.width(), 160);
        assert_eq!(frame.height(), 120);
        assert_eq!(frame.timestamp(), source.current_timestamp());
    }

    #[test]
    fn test_timestamp_advances_with_playback_clock() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FfmpegFileSource::open(&test_video(dir.path())).unwrap();

        source.poll_at(Duration::ZERO);
        let t0 = source.current_timestamp();
        source.poll_at(Duration::from_millis(250));
        let t1 = source.current_timestamp();

        assert!(t1 > t0);
        assert!(t1 <= Duration::from_millis(250));
    }

    #[test]
    fn test_timestamp_repeats_between_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FfmpegFileSource::open(&test_video(dir.path())).unwrap();

        source.poll_at(Duration::from_millis(100));
        let a = source.current_timestamp();
        source.poll_at(Duration::from_millis(105));
        assert_eq!(source.current_timestamp(), a);
    }

    #[test]
    fn test_ends_after_last_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FfmpegFileSource::open(&test_video(dir.path())).unwrap();

        let readiness = source.poll_at(Duration::from_secs(10));

        assert!(readiness.ended);
        assert!(!readiness.is_ready());
    }

    #[test]
    fn test_open_nonexistent_errors() {
        let result = FfmpegFileSource::open(Path::new("/nonexistent/test.mp4"));
        assert!(matches!(result, Err(SourceError::Open { .. })));
    }

    #[test]
    fn test_release_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FfmpegFileSource::open(&test_video(dir.path())).unwrap();
        source.poll_at(Duration::ZERO);
        source.release();
        source.release();
        assert!(source.readiness().ended);
        assert!(source.current_frame().is_err());
    }
}
