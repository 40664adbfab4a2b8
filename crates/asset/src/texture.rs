//! Texture decoding and CPU-side pixel data.
//! Images decode to 8 bits per channel with 1, 3 or 4 channels.

use std::path::{Path, PathBuf};

use image::{ImageBuffer, Luma, Pixel, Rgb, Rgba, imageops::FilterType};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("Failed to decode image {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Unsupported channel count {channels} in image {path:?}")]
    UnsupportedChannelCount { path: PathBuf, channels: u8 },
    #[error("Pixel data is {actual} bytes, expected {expected} for {width}x{height} {format:?}")]
    SizeMismatch {
        width: u32,
        height: u32,
        format: PixelFormat,
        expected: usize,
        actual: usize,
    },
}

/// Pixel layout of decoded texture data, one byte per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Red,
    Rgb,
    Rgba,
}

impl PixelFormat {
    /// Maps a decoded image's channel count to a format; `None` for layouts
    /// the renderer cannot upload (e.g. luma + alpha).
    pub fn from_channel_count(channels: u8) -> Option<Self> {
        match channels {
            1 => Some(PixelFormat::Red),
            3 => Some(PixelFormat::Rgb),
            4 => Some(PixelFormat::Rgba),
            _ => None,
        }
    }

    pub fn channels(self) -> u32 {
        match self {
            PixelFormat::Red => 1,
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }
}

/// One level of a mip chain.
#[derive(Clone, Debug, PartialEq)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Texture data in CPU-friendly format before GPU upload.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl TextureData {
    /// Wrap raw pixels, checking that the buffer matches the dimensions.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self, TextureError> {
        let expected = (width * height * format.channels()) as usize;
        if data.len() != expected || width == 0 || height == 0 {
            return Err(TextureError::SizeMismatch {
                width,
                height,
                format,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            format,
        })
    }

    /// Decode an image file, keeping its channel layout.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TextureError> {
        let path = path.as_ref();
        log::debug!("Loading texture from {:?}", path);

        let img = image::open(path).map_err(|source| TextureError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

        let channels = img.color().channel_count();
        let format = PixelFormat::from_channel_count(channels).ok_or_else(|| {
            TextureError::UnsupportedChannelCount {
                path: path.to_path_buf(),
                channels,
            }
        })?;

        let (width, height) = (img.width(), img.height());
        let data = match format {
            PixelFormat::Red => img.into_luma8().into_raw(),
            PixelFormat::Rgb => img.into_rgb8().into_raw(),
            PixelFormat::Rgba => img.into_rgba8().into_raw(),
        };

        log::debug!("Loaded texture {}x{} {:?} ({} bytes)", width, height, format, data.len());

        Self::new(width, height, format, data)
    }

    /// A 1x1 RGBA texture of a single colour.
    pub fn solid_rgba(color: [u8; 4]) -> Self {
        Self {
            data: color.to_vec(),
            width: 1,
            height: 1,
            format: PixelFormat::Rgba,
        }
    }

    /// Number of levels in a full mip chain down to 1x1.
    pub fn mip_level_count(&self) -> u32 {
        32 - self.width.max(self.height).max(1).leading_zeros()
    }

    /// Full mip chain, level 0 first. Each level is a triangle-filtered
    /// downsample of the previous one.
    pub fn mip_chain(&self) -> Vec<MipLevel> {
        let mut levels = Vec::with_capacity(self.mip_level_count() as usize);
        levels.push(MipLevel {
            width: self.width,
            height: self.height,
            data: self.data.clone(),
        });

        for _ in 1..self.mip_level_count() {
            let Some(prev) = levels.last() else { break };
            let width = (prev.width / 2).max(1);
            let height = (prev.height / 2).max(1);
            let data = match self.format {
                PixelFormat::Red => downsample::<Luma<u8>>(prev, width, height),
                PixelFormat::Rgb => downsample::<Rgb<u8>>(prev, width, height),
                PixelFormat::Rgba => downsample::<Rgba<u8>>(prev, width, height),
            };
            match data {
                Some(data) => levels.push(MipLevel {
                    width,
                    height,
                    data,
                }),
                None => break,
            }
        }

        levels
    }

    /// Check if the texture data is valid.
    pub fn is_valid(&self) -> bool {
        let expected_size = (self.width * self.height * self.format.channels()) as usize;
        self.data.len() == expected_size && self.width > 0 && self.height > 0
    }
}

fn downsample<P>(level: &MipLevel, width: u32, height: u32) -> Option<Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let src = ImageBuffer::<P, &[u8]>::from_raw(level.width, level.height, level.data.as_slice())?;
    Some(image::imageops::resize(&src, width, height, FilterType::Triangle).into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, LumaA, RgbImage};

    #[test]
    fn channel_counts_map_exhaustively() {
        assert_eq!(PixelFormat::from_channel_count(1), Some(PixelFormat::Red));
        assert_eq!(PixelFormat::from_channel_count(3), Some(PixelFormat::Rgb));
        assert_eq!(PixelFormat::from_channel_count(4), Some(PixelFormat::Rgba));
        assert_eq!(PixelFormat::from_channel_count(2), None);
        assert_eq!(PixelFormat::from_channel_count(0), None);
    }

    #[test]
    fn mip_chain_reaches_one_pixel() {
        let tex = TextureData::new(8, 4, PixelFormat::Rgb, vec![200; 8 * 4 * 3]).unwrap();
        let chain = tex.mip_chain();
        let sizes: Vec<_> = chain.iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(sizes, [(8, 4), (4, 2), (2, 1), (1, 1)]);
        assert!(chain.iter().all(|l| l.data.len() == (l.width * l.height * 3) as usize));
    }

    #[test]
    fn size_mismatch_is_rejected() {
        assert!(matches!(
            TextureData::new(2, 2, PixelFormat::Rgba, vec![0; 3]),
            Err(TextureError::SizeMismatch { expected: 16, .. })
        ));
    }

    #[test]
    fn loads_png_with_native_channel_count() {
        let dir = tempfile::tempdir().unwrap();

        let gray = dir.path().join("gray.png");
        GrayImage::from_pixel(4, 4, Luma([7])).save(&gray).unwrap();
        let tex = TextureData::load(&gray).unwrap();
        assert_eq!(tex.format, PixelFormat::Red);
        assert_eq!(tex.data.len(), 16);

        let rgb = dir.path().join("rgb.png");
        RgbImage::from_pixel(2, 3, Rgb([1, 2, 3])).save(&rgb).unwrap();
        let tex = TextureData::load(&rgb).unwrap();
        assert_eq!(tex.format, PixelFormat::Rgb);
        assert_eq!((tex.width, tex.height), (2, 3));
        assert!(tex.is_valid());
    }

    #[test]
    fn luma_alpha_fails_explicitly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("la.png");
        ImageBuffer::<LumaA<u8>, Vec<u8>>::from_pixel(2, 2, LumaA([1, 255]))
            .save(&path)
            .unwrap();
        assert!(matches!(
            TextureData::load(&path),
            Err(TextureError::UnsupportedChannelCount { channels: 2, .. })
        ));
    }

    #[test]
    fn undecodable_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();
        assert!(matches!(TextureData::load(&path), Err(TextureError::Decode { .. })));
    }
}
