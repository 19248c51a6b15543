//! Texture loading.
//!
//! A [`TextureLoader`] starts a load and returns an [`IoHandle`] right away;
//! the resource manager polls it once per frame.

use std::path::{Path, PathBuf};
use std::sync::mpsc;

use stonecut_core::compute::IoHandle;
use stonecut_core::texture::{CpuTexture, TextureOptions};

/// Why a texture could not be produced. Cloned to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TextureLoadError {
    #[error("failed to read texture {url}: {message}")]
    Io { url: String, message: String },
    #[error("failed to decode texture {url}: {message}")]
    Decode { url: String, message: String },
    /// The loader went away before producing a result.
    #[error("texture load cancelled: {url}")]
    Cancelled { url: String },
}

pub type TextureResult = Result<CpuTexture, TextureLoadError>;

/// Source of decoded textures.
pub trait TextureLoader {
    fn load(&self, url: &str, options: TextureOptions) -> IoHandle<TextureResult>;
}

/// Loads textures from disk on a one-thread tokio runtime.
///
/// Reads use `tokio::fs`; decoding runs on the blocking pool so it does
/// not stall other reads.
pub struct FileTextureLoader {
    runtime: tokio::runtime::Runtime,
    root: PathBuf,
}

impl FileTextureLoader {
    /// Resolves relative URLs against `root`.
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("stonecut-texture-io")
            .enable_all()
            .build()?;
        Ok(Self {
            runtime,
            root: root.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TextureLoader for FileTextureLoader {
    fn load(&self, url: &str, options: TextureOptions) -> IoHandle<TextureResult> {
        let (sender, receiver) = mpsc::channel();
        let path = self.root.join(url);
        let url = url.to_string();
        log::debug!("Loading texture {}", path.display());

        self.runtime.spawn(async move {
            let result = match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    let url_for_decode = url.clone();
                    tokio::task::spawn_blocking(move || {
                        decode_texture(&url_for_decode, &bytes, options)
                    })
                    .await
                    .unwrap_or_else(|err| {
                        Err(TextureLoadError::Decode {
                            url,
                            message: err.to_string(),
                        })
                    })
                }
                Err(err) => Err(TextureLoadError::Io {
                    url,
                    message: err.to_string(),
                }),
            };
            let _ = sender.send(result);
        });

        IoHandle::new(receiver)
    }
}

/// Decodes an encoded image (PNG or JPEG) to RGBA8.
pub fn decode_texture(
    url: &str,
    bytes: &[u8],
    options: TextureOptions,
) -> Result<CpuTexture, TextureLoadError> {
    let decode_error = |message: String| TextureLoadError::Decode {
        url: url.to_string(),
        message,
    };

    let image = image::load_from_memory(bytes).map_err(|err| decode_error(err.to_string()))?;
    let mut rgba = image.to_rgba8();
    if options.flip_y {
        image::imageops::flip_vertical_in_place(&mut rgba);
    }
    let (width, height) = rgba.dimensions();

    CpuTexture::from_rgba8(width, height, options.format(), rgba.into_raw())
        .map(|texture| texture.with_repeat(options.repeat).with_label(url))
        .ok_or_else(|| decode_error(format!("unexpected pixel data for {width}x{height}")))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgba, RgbaImage};
    use stonecut_core::texture::TextureFormat;

    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_fn(width, height, |_, y| {
            if y == 0 { Rgba([255, 0, 0, 255]) } else { Rgba([0, 0, 255, 255]) }
        });
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn decodes_png_to_rgba8() {
        let texture = decode_texture("marble.png", &png(3, 2), TextureOptions::default()).unwrap();
        assert_eq!((texture.width, texture.height), (3, 2));
        assert_eq!(texture.format, TextureFormat::Rgba8UnormSrgb);
        assert_eq!(texture.byte_size(), 3 * 2 * 4);
        assert_eq!(texture.pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(texture.label.as_deref(), Some("marble.png"));
    }

    #[test]
    fn flip_and_linear_options() {
        let options = TextureOptions::linear().with_flip_y(true).with_repeat(2.0, 3.0);
        let texture = decode_texture("rough.png", &png(1, 2), options).unwrap();
        assert_eq!(texture.format, TextureFormat::Rgba8Unorm);
        assert_eq!(texture.pixel(0, 0), Some([0, 0, 255, 255]));
        assert_eq!(texture.repeat, [2.0, 3.0]);
    }

    #[test]
    fn garbage_is_decode_error() {
        let err = decode_texture("bad.png", b"not an image", TextureOptions::default()).unwrap_err();
        assert!(matches!(err, TextureLoadError::Decode { ref url, .. } if url == "bad.png"));
    }
}
