//! Decoded images bound to GPU textures.

use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::gfx::{GraphicsBackend, TextureId};

#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("failed to decode image `{}`", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("image has zero size")]
    ZeroSize,
}

/// A texture uploaded to the backend, with its pixel size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    id: TextureId,
    width: u32,
    height: u32,
}

impl Texture {
    /// Uploads an already decoded RGBA image.
    pub fn from_image<B>(backend: &mut B, image: &RgbaImage) -> Result<Self, TextureError>
    where
        B: GraphicsBackend + ?Sized,
    {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(TextureError::ZeroSize);
        }
        let id = backend.create_texture(width, height, image.as_raw());
        Ok(Self { id, width, height })
    }

    /// Decodes the image file at `path` and uploads it.
    pub fn load<B>(backend: &mut B, path: impl AsRef<Path>) -> Result<Self, TextureError>
    where
        B: GraphicsBackend + ?Sized,
    {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|source| TextureError::Decode { path: path.to_path_buf(), source })?
            .to_rgba8();
        log::debug!("decoded {} ({}x{})", path.display(), image.width(), image.height());
        Self::from_image(backend, &image)
    }

    #[inline]
    pub fn id(&self) -> TextureId {
        self.id
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Selects this texture for the next draw.
    #[inline]
    pub fn bind<B>(&self, backend: &mut B)
    where
        B: GraphicsBackend + ?Sized,
    {
        backend.bind_texture(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::recording::{Call, RecordingBackend};

    #[test]
    fn from_image_uploads_with_pixel_size() {
        let mut backend = RecordingBackend::new();
        let tex = Texture::from_image(&mut backend, &RgbaImage::new(48, 16)).unwrap();
        assert_eq!((tex.width(), tex.height()), (48, 16));
        assert_eq!(backend.calls, vec![Call::CreateTexture { width: 48, height: 16 }]);

        tex.bind(&mut backend);
        assert_eq!(backend.calls.last(), Some(&Call::BindTexture(tex.id())));
    }

    #[test]
    fn empty_image_is_rejected() {
        let mut backend = RecordingBackend::new();
        let err = Texture::from_image(&mut backend, &RgbaImage::new(0, 8)).unwrap_err();
        assert!(matches!(err, TextureError::ZeroSize));
        assert!(backend.calls.is_empty());
    }

    #[test]
    fn missing_file_reports_path() {
        let mut backend = RecordingBackend::new();
        let err = Texture::load(&mut backend, "does/not/exist.png").unwrap_err();
        assert!(err.to_string().contains("does/not/exist.png"));
    }
}
