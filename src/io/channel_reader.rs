//! Reading channel images into pixel arrays
//!
//! A reader hands out a scoped [`ChannelImage`] handle. Whatever the reader
//! holds open for the image is released when the handle is dropped, so a
//! failure halfway through cutting still frees it.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageBuffer};
use log::{debug, info};

use crate::cutting::PixelArray;
use crate::errors::{PrepError, PrepResult};

/// An open channel image
pub trait ChannelImage {
    /// Decoded samples of the image
    fn pixels(&self) -> &PixelArray;

    /// File the image was read from
    fn source(&self) -> &Path;
}

/// Decodes channel image files
pub trait ChannelReader {
    /// Open an image file
    ///
    /// # Arguments
    /// * `path` - Image file to decode
    ///
    /// # Returns
    /// A handle that releases the image when dropped
    fn open(&self, path: &Path) -> PrepResult<Box<dyn ChannelImage>>;
}

/// Single-plane image decoded to 16-bit gray
struct DecodedImage {
    source: PathBuf,
    pixels: PixelArray,
}

impl ChannelImage for DecodedImage {
    fn pixels(&self) -> &PixelArray {
        &self.pixels
    }

    fn source(&self) -> &Path {
        &self.source
    }
}

impl Drop for DecodedImage {
    fn drop(&mut self) {
        debug!("Released image {}", self.source.display());
    }
}

/// Channel reader backed by the `image` crate
///
/// Any format the crate decodes is accepted; samples are converted to
/// 16-bit luminance.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiffChannelReader;

impl ChannelReader for TiffChannelReader {
    fn open(&self, path: &Path) -> PrepResult<Box<dyn ChannelImage>> {
        info!("Reading channel image {}", path.display());
        let decoded = image::open(path)?;
        let (width, height) = (decoded.width() as usize, decoded.height() as usize);
        let samples: Vec<u16> = match decoded {
            DynamicImage::ImageLuma16(gray) => gray.into_raw(),
            DynamicImage::ImageLuma8(gray) => gray.into_raw().into_iter().map(u16::from).collect(),
            other => {
                return Err(PrepError::GenericError(format!(
                    "{} has color type {:?}; only 8- and 16-bit grayscale channels are supported",
                    path.display(),
                    other.color()
                )))
            }
        };
        let pixels = PixelArray::new(1, height, width, samples)?;

        Ok(Box::new(DecodedImage {
            source: path.to_path_buf(),
            pixels,
        }))
    }
}

/// Write a single-plane array as a 16-bit gray TIFF
pub fn write_gray16_tiff(path: &Path, array: &PixelArray) -> PrepResult<()> {
    if array.planes != 1 {
        return Err(PrepError::GenericError(format!(
            "cannot write {} planes to {}; only single-plane images are supported",
            array.planes,
            path.display()
        )));
    }

    let buffer: ImageBuffer<image::Luma<u16>, Vec<u16>> =
        ImageBuffer::from_raw(array.width as u32, array.height as u32, array.data.clone())
            .ok_or_else(|| PrepError::GenericError(format!("pixel buffer too small for {}", path.display())))?;
    buffer.save_with_format(path, image::ImageFormat::Tiff)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_sixteen_bit_samples() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("CD3.tiff");
        let array = PixelArray::new(1, 2, 3, vec![0, 1, 300, 4000, 65535, 7]).unwrap();

        write_gray16_tiff(&path, &array).unwrap();
        let image = TiffChannelReader.open(&path).unwrap();

        assert_eq!(image.pixels(), &array);
        assert_eq!(image.source(), path.as_path());
    }

    #[test]
    fn eight_bit_samples_keep_their_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("DAPI.tif");
        image::GrayImage::from_raw(2, 1, vec![10, 200])
            .unwrap()
            .save_with_format(&path, image::ImageFormat::Tiff)
            .unwrap();

        let image = TiffChannelReader.open(&path).unwrap();

        assert_eq!(image.pixels().shape(), (1, 1, 2));
        assert_eq!(image.pixels().data, vec![10, 200]);
    }

    #[test]
    fn color_images_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rgb.tif");
        image::RgbImage::new(2, 2)
            .save_with_format(&path, image::ImageFormat::Tiff)
            .unwrap();

        assert!(matches!(TiffChannelReader.open(&path), Err(PrepError::GenericError(_))));
    }

    #[test]
    fn multi_plane_write_is_rejected() {
        let dir = tempdir().unwrap();
        let array = PixelArray::zeros(2, 2, 2);
        assert!(write_gray16_tiff(&dir.path().join("x.tiff"), &array).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(TiffChannelReader.open(Path::new("/no/such/image.tif")).is_err());
    }
}
