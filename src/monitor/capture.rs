//! Capture collaborator
//!
//! The native receive library is reached through two traits: a
//! [`CaptureBackend`] that opens a receive connection to a named source, and
//! the [`FrameReceiver`] it returns, which yields raw BGRA frames. Both are
//! synchronous; the service drives them from the blocking pool.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;

use super::frame::{FrameError, PreviewFrame};
use crate::catalog::Source;
use crate::matrix::MatrixError;

/// A raw frame as delivered by the receive library (BGRA, padded rows)
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub width: u32,
    pub height: u32,
    /// Bytes per row, at least `width * 4`
    pub line_stride: usize,
    pub data: Bytes,
}

impl CapturedFrame {
    /// Convert to the packed RGB preview payload
    pub fn to_preview(&self) -> Result<PreviewFrame, FrameError> {
        PreviewFrame::from_bgra(self.width, self.height, self.line_stride, &self.data)
    }
}

/// Opens receive connections
pub trait CaptureBackend: Send + Sync + 'static {
    /// Connect to a source; the connection lives as long as the receiver
    fn connect(&self, source: &Source) -> Result<Box<dyn FrameReceiver>, MatrixError>;
}

/// One open receive connection
pub trait FrameReceiver: Send + 'static {
    /// Wait up to `timeout` for the next video frame
    ///
    /// `Ok(None)` means no frame arrived in time.
    fn capture(&mut self, timeout: Duration) -> Result<Option<CapturedFrame>, MatrixError>;
}

/// Behaviour of [`TestPatternCapture`] receivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatternMode {
    /// Every capture yields a frame
    #[default]
    Live,
    /// Captures time out with no frame
    Idle,
    /// Captures fail with an error
    Failing,
    /// New connections are refused
    Offline,
}

/// Synthetic capture backend
///
/// Each source gets a solid colour derived from its name with a one-pixel
/// bar that moves across the frame on every capture (never in column 0, so
/// the top-left pixel always identifies the source). The mode is shared with
/// open receivers and can be switched at any time.
#[derive(Debug, Clone)]
pub struct TestPatternCapture {
    width: u32,
    height: u32,
    mode: Arc<Mutex<PatternMode>>,
}

impl Default for TestPatternCapture {
    fn default() -> Self {
        Self::new(64, 36)
    }
}

impl TestPatternCapture {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(2),
            height: height.max(1),
            mode: Arc::new(Mutex::new(PatternMode::Live)),
        }
    }

    pub fn set_mode(&self, mode: PatternMode) {
        *self.mode.lock().unwrap_or_else(PoisonError::into_inner) = mode;
    }

    pub fn mode(&self) -> PatternMode {
        *self.mode.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Background colour used for a source name (RGB)
    pub fn color_for(name: &str) -> [u8; 3] {
        // FNV-1a
        let hash = name
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
                (h ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
            });
        [(hash >> 16) as u8, (hash >> 8) as u8, hash as u8]
    }
}

impl CaptureBackend for TestPatternCapture {
    fn connect(&self, source: &Source) -> Result<Box<dyn FrameReceiver>, MatrixError> {
        if self.mode() == PatternMode::Offline || !source.connected {
            return Err(MatrixError::NotConnected(source.name.clone()));
        }
        Ok(Box::new(PatternReceiver {
            color: Self::color_for(&source.name),
            width: self.width,
            height: self.height,
            tick: 0,
            mode: Arc::clone(&self.mode),
        }))
    }
}

struct PatternReceiver {
    color: [u8; 3],
    width: u32,
    height: u32,
    tick: u64,
    mode: Arc<Mutex<PatternMode>>,
}

impl FrameReceiver for PatternReceiver {
    fn capture(&mut self, _timeout: Duration) -> Result<Option<CapturedFrame>, MatrixError> {
        let mode = *self.mode.lock().unwrap_or_else(PoisonError::into_inner);
        match mode {
            PatternMode::Live => {}
            PatternMode::Idle => return Ok(None),
            PatternMode::Failing | PatternMode::Offline => {
                return Err(MatrixError::NotConnected("capture".into()))
            }
        }

        let bar = 1 + (self.tick % (self.width as u64 - 1)) as u32;
        self.tick += 1;

        let [r, g, b] = self.color;
        let stride = self.width as usize * 4;
        let mut data = Vec::with_capacity(stride * self.height as usize);
        for _ in 0..self.height {
            for x in 0..self.width {
                if x == bar {
                    data.extend_from_slice(&[255, 255, 255, 255]);
                } else {
                    data.extend_from_slice(&[b, g, r, 255]);
                }
            }
        }

        Ok(Some(CapturedFrame {
            width: self.width,
            height: self.height,
            line_stride: stride,
            data: Bytes::from(data),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_identifies_source() {
        let capture = TestPatternCapture::new(8, 2);
        let mut rx = capture.connect(&Source::new("CAM-A", "")).unwrap();

        let frame = rx
            .capture(Duration::from_millis(1))
            .unwrap()
            .unwrap()
            .to_preview()
            .unwrap();
        assert_eq!(frame.width, 8);
        assert_eq!(frame.pixel(0, 0), Some(TestPatternCapture::color_for("CAM-A")));
        assert_eq!(frame.pixel(1, 0), Some([255, 255, 255]));
    }

    #[test]
    fn test_bar_moves_between_captures() {
        let capture = TestPatternCapture::new(4, 1);
        let mut rx = capture.connect(&Source::new("CAM-A", "")).unwrap();

        let first = rx.capture(Duration::ZERO).unwrap().unwrap().to_preview().unwrap();
        let second = rx.capture(Duration::ZERO).unwrap().unwrap().to_preview().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_modes_affect_open_receivers() {
        let capture = TestPatternCapture::default();
        let mut rx = capture.connect(&Source::new("CAM-A", "")).unwrap();

        capture.set_mode(PatternMode::Idle);
        assert!(rx.capture(Duration::ZERO).unwrap().is_none());

        capture.set_mode(PatternMode::Failing);
        assert!(rx.capture(Duration::ZERO).is_err());

        capture.set_mode(PatternMode::Offline);
        assert!(capture.connect(&Source::new("CAM-B", "")).is_err());
    }

    #[test]
    fn test_distinct_colours() {
        assert_ne!(
            TestPatternCapture::color_for("CAM-A"),
            TestPatternCapture::color_for("CAM-B")
        );
    }
}
