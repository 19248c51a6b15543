//! CPU-side texture types.
//!
//! Provides [`CpuTexture`] for holding decoded pixel data, the
//! [`TextureFormat`] it is stored in, and the [`TextureOptions`] a consumer
//! passes when requesting a texture.

/// Pixel format of a [`CpuTexture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    /// 8-bit RGBA, linear.
    Rgba8Unorm,
    /// 8-bit RGBA, sRGB encoded. Used for albedo maps.
    #[default]
    Rgba8UnormSrgb,
}

impl TextureFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        4
    }

    pub fn is_srgb(&self) -> bool {
        matches!(self, Self::Rgba8UnormSrgb)
    }
}

/// How a texture should be decoded and sampled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureOptions {
    /// Decode as sRGB (colour maps) or linear (roughness, normal maps).
    pub srgb: bool,
    /// UV repeat across the slab footprint.
    pub repeat: [f32; 2],
    /// Flip rows on load.
    pub flip_y: bool,
}

impl Default for TextureOptions {
    fn default() -> Self {
        Self {
            srgb: true,
            repeat: [1.0, 1.0],
            flip_y: false,
        }
    }
}

impl TextureOptions {
    /// Data maps are linear.
    pub fn linear() -> Self {
        Self {
            srgb: false,
            ..Self::default()
        }
    }

    pub fn with_repeat(mut self, u: f32, v: f32) -> Self {
        self.repeat = [u, v];
        self
    }

    pub fn with_flip_y(mut self, flip: bool) -> Self {
        self.flip_y = flip;
        self
    }

    pub fn format(&self) -> TextureFormat {
        if self.srgb {
            TextureFormat::Rgba8UnormSrgb
        } else {
            TextureFormat::Rgba8Unorm
        }
    }

    /// Cache key identifying `url` loaded with these options.
    ///
    /// Options that change the decoded pixels are part of the key;
    /// the same file requested as sRGB and linear is two textures.
    pub fn cache_key(&self, url: &str) -> String {
        let mut key = url.to_owned();
        if !self.srgb {
            key.push_str("#linear");
        }
        if self.flip_y {
            key.push_str("#flip");
        }
        if self.repeat != [1.0, 1.0] {
            key.push_str(&format!("#repeat={}x{}", self.repeat[0], self.repeat[1]));
        }
        key
    }
}

/// Decoded texture pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuTexture {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub data: Vec<u8>,
    pub repeat: [f32; 2],
    pub label: Option<String>,
}

impl CpuTexture {
    /// Wrap RGBA8 pixels. Returns `None` if `data` does not match the size.
    pub fn from_rgba8(width: u32, height: u32, format: TextureFormat, data: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        (data.len() == expected).then_some(Self {
            width,
            height,
            format,
            data,
            repeat: [1.0, 1.0],
            label: None,
        })
    }

    /// A single-pixel texture of one colour.
    pub fn solid(rgba: [u8; 4], format: TextureFormat) -> Self {
        Self {
            width: 1,
            height: 1,
            format,
            data: rgba.to_vec(),
            repeat: [1.0, 1.0],
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_repeat(mut self, repeat: [f32; 2]) -> Self {
        self.repeat = repeat;
        self
    }

    /// Size of the pixel data in bytes.
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }

    /// RGBA of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rgba8_checks_length() {
        assert!(CpuTexture::from_rgba8(2, 2, TextureFormat::Rgba8Unorm, vec![0; 16]).is_some());
        assert!(CpuTexture::from_rgba8(2, 2, TextureFormat::Rgba8Unorm, vec![0; 15]).is_none());
    }

    #[test]
    fn pixel_lookup() {
        let tex = CpuTexture::solid([10, 20, 30, 255], TextureFormat::Rgba8UnormSrgb);
        assert_eq!(tex.pixel(0, 0), Some([10, 20, 30, 255]));
        assert_eq!(tex.pixel(1, 0), None);
    }

    #[test]
    fn cache_key_distinguishes_decode_options() {
        let url = "textures/carrara.png";
        let srgb = TextureOptions::default().cache_key(url);
        let linear = TextureOptions::linear().cache_key(url);
        assert_eq!(srgb, url);
        assert_ne!(srgb, linear);
        assert_ne!(
            srgb,
            TextureOptions::default().with_repeat(2.0, 2.0).cache_key(url)
        );
    }

    #[test]
    fn options_format() {
        assert!(TextureOptions::default().format().is_srgb());
        assert!(!TextureOptions::linear().format().is_srgb());
    }
}
