use std::{
    num::NonZeroU32,
    path::{Component, Path, PathBuf},
};

use imagesize::ImageError;
use tracing::warn;

/// Largest edge accepted from an image header.
pub const MAX_DIMENSION: u32 = 16_384;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: NonZeroU32,
    pub height: NonZeroU32,
}

/// Looks up site-relative image paths inside the public directory.
#[derive(Debug, Clone)]
pub struct ImageProbe {
    public_dir: PathBuf,
}

impl ImageProbe {
    pub fn new(public_dir: impl Into<PathBuf>) -> Self {
        Self {
            public_dir: public_dir.into(),
        }
    }

    /// `None` for remote images, missing files and unsupported formats.
    pub fn dimensions(&self, src: &str) -> Option<Dimensions> {
        let path = self.resolve(src)?;
        let size = match imagesize::size(&path) {
            Ok(size) => size,
            Err(ImageError::NotSupported) => return None,
            Err(ImageError::CorruptedImage) => {
                warn!(
                    target = "application::images",
                    path = %path.display(),
                    "corrupted image header"
                );
                return None;
            }
            Err(ImageError::IoError(err)) => {
                warn!(
                    target = "application::images",
                    path = %path.display(),
                    error = %err,
                    "image not readable"
                );
                return None;
            }
        };

        let width = parse_dimension(size.width)?;
        let height = parse_dimension(size.height)?;
        Some(Dimensions { width, height })
    }

    fn resolve(&self, src: &str) -> Option<PathBuf> {
        let relative = src.strip_prefix('/')?;
        let relative = relative.split(['?', '#']).next().unwrap_or(relative);
        let candidate = Path::new(relative);
        if candidate
            .components()
            .any(|component| !matches!(component, Component::Normal(_)))
        {
            return None;
        }
        Some(self.public_dir.join(candidate))
    }
}

fn parse_dimension(value: usize) -> Option<NonZeroU32> {
    let value = u32::try_from(value).ok()?;
    if value > MAX_DIMENSION {
        return None;
    }
    NonZeroU32::new(value)
}
