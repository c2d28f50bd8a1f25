//! Preview frame payload
//!
//! Wire format served to clients:
//!
//! ```text
//! +-----------+------------+----------------------------------+
//! | width u32 | height u32 | R G B R G B ... (width*height*3) |
//! |    LE     |     LE     |  packed, no row padding          |
//! +-----------+------------+----------------------------------+
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the `{width, height}` prefix
pub const HEADER_LEN: usize = 8;

/// Bytes per pixel in the native capture format
const BGRA_PIXEL: usize = 4;

/// Frame payload errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer bytes than the header or the declared dimensions require
    Truncated { expected: usize, actual: usize },
    /// Row stride shorter than one row of pixels
    InvalidStride { width: u32, stride: usize },
    /// Zero-sized frame
    Empty,
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::Truncated { expected, actual } => {
                write!(f, "Frame truncated: expected {} bytes, got {}", expected, actual)
            }
            FrameError::InvalidStride { width, stride } => {
                write!(f, "Stride {} too short for width {}", stride, width)
            }
            FrameError::Empty => write!(f, "Frame has no pixels"),
        }
    }
}

impl std::error::Error for FrameError {}

/// A decoded RGB frame ready to hand to clients
///
/// Cloning is cheap; pixel data is reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewFrame {
    pub width: u32,
    pub height: u32,
    /// Packed RGB triplets, `width * height * 3` bytes
    pub rgb: Bytes,
}

impl PreviewFrame {
    /// Wrap packed RGB data, checking it matches the dimensions
    pub fn new(width: u32, height: u32, rgb: Bytes) -> Result<Self, FrameError> {
        let expected = rgb_len(width, height)?;
        if rgb.len() != expected {
            return Err(FrameError::Truncated {
                expected,
                actual: rgb.len(),
            });
        }
        Ok(Self { width, height, rgb })
    }

    /// Convert a BGRA capture (possibly with row padding) into packed RGB
    pub fn from_bgra(width: u32, height: u32, stride: usize, data: &[u8]) -> Result<Self, FrameError> {
        let expected = rgb_len(width, height)?;
        let row = width as usize * BGRA_PIXEL;
        if stride < row {
            return Err(FrameError::InvalidStride { width, stride });
        }

        let needed = stride * (height as usize - 1) + row;
        if data.len() < needed {
            return Err(FrameError::Truncated {
                expected: needed,
                actual: data.len(),
            });
        }

        let mut rgb = BytesMut::with_capacity(expected);
        for line in data.chunks(stride).take(height as usize) {
            for px in line[..row].chunks_exact(BGRA_PIXEL) {
                rgb.put_slice(&[px[2], px[1], px[0]]);
            }
        }

        Ok(Self {
            width,
            height,
            rgb: rgb.freeze(),
        })
    }

    /// Serialize with the 8-byte little-endian dimension header
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.rgb.len());
        buf.put_u32_le(self.width);
        buf.put_u32_le(self.height);
        buf.put_slice(&self.rgb);
        buf.freeze()
    }

    /// Parse the wire format back into a frame
    pub fn decode(mut data: Bytes) -> Result<Self, FrameError> {
        if data.len() < HEADER_LEN {
            return Err(FrameError::Truncated {
                expected: HEADER_LEN,
                actual: data.len(),
            });
        }
        let width = data.get_u32_le();
        let height = data.get_u32_le();
        Self::new(width, height, data)
    }

    /// RGB value of the pixel at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let at = (y as usize * self.width as usize + x as usize) * 3;
        Some([self.rgb[at], self.rgb[at + 1], self.rgb[at + 2]])
    }
}

fn rgb_len(width: u32, height: u32) -> Result<usize, FrameError> {
    if width == 0 || height == 0 {
        return Err(FrameError::Empty);
    }
    Ok(width as usize * height as usize * 3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_header_little_endian() {
        let frame = PreviewFrame::new(2, 1, Bytes::from_static(&[1, 2, 3, 4, 5, 6])).unwrap();
        let wire = frame.encode();

        assert_eq!(&wire[..HEADER_LEN], &[2, 0, 0, 0, 1, 0, 0, 0]);
        assert_eq!(&wire[HEADER_LEN..], &[1, 2, 3, 4, 5, 6]);
        assert_eq!(PreviewFrame::decode(wire).unwrap(), frame);
    }

    #[test]
    fn test_from_bgra_swaps_channels_and_drops_padding() {
        // 2x2, stride 12 (4 bytes of padding per row)
        let data = [
            10, 20, 30, 255, 40, 50, 60, 255, 0, 0, 0, 0, //
            70, 80, 90, 255, 1, 2, 3, 255, 0, 0, 0, 0,
        ];
        let frame = PreviewFrame::from_bgra(2, 2, 12, &data).unwrap();

        assert_eq!(frame.rgb.len(), 12);
        assert_eq!(frame.pixel(0, 0), Some([30, 20, 10]));
        assert_eq!(frame.pixel(1, 0), Some([60, 50, 40]));
        assert_eq!(frame.pixel(0, 1), Some([90, 80, 70]));
        assert_eq!(frame.pixel(1, 1), Some([3, 2, 1]));
        assert_eq!(frame.pixel(2, 1), None);
    }

    #[test]
    fn test_from_bgra_last_row_without_padding() {
        let data = [1, 2, 3, 0, 9, 9, 9, 9, 4, 5, 6, 0];
        let frame = PreviewFrame::from_bgra(1, 2, 8, &data).unwrap();
        assert_eq!(&frame.rgb[..], &[3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn test_from_bgra_rejects_bad_input() {
        assert_eq!(
            PreviewFrame::from_bgra(4, 1, 8, &[0; 16]),
            Err(FrameError::InvalidStride { width: 4, stride: 8 })
        );
        assert!(matches!(
            PreviewFrame::from_bgra(2, 2, 8, &[0; 12]),
            Err(FrameError::Truncated { .. })
        ));
        assert_eq!(PreviewFrame::from_bgra(0, 2, 8, &[]), Err(FrameError::Empty));
    }

    #[test]
    fn test_decode_truncated() {
        assert!(matches!(
            PreviewFrame::decode(Bytes::from_static(&[1, 0, 0])),
            Err(FrameError::Truncated { expected: 8, .. })
        ));

        let mut short = BytesMut::new();
        short.put_u32_le(2);
        short.put_u32_le(2);
        short.put_slice(&[0; 5]);
        assert_eq!(
            PreviewFrame::decode(short.freeze()),
            Err(FrameError::Truncated {
                expected: 12,
                actual: 5
            })
        );
    }
}
