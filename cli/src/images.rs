use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Image formats accepted for food photos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
}

impl ImageKind {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Detect the format from the file's magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoredImage {
    pub name: String,
    pub url: String,
}

/// Content-addressed image directory; files are named by their SHA-256 digest.
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create image directory: {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Reject empty, oversized, or mislabelled uploads.
    pub fn check(bytes: &[u8], kind: ImageKind) -> Result<()> {
        if bytes.is_empty() {
            bail!("Image is empty");
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            bail!(
                "Image too large: {} bytes exceeds the {} MB limit",
                bytes.len(),
                MAX_IMAGE_BYTES / (1024 * 1024)
            );
        }
        if ImageKind::sniff(bytes) != Some(kind) {
            bail!("Image content does not match {}", kind.content_type());
        }
        Ok(())
    }

    pub fn save(&self, bytes: &[u8], kind: ImageKind) -> Result<StoredImage> {
        Self::check(bytes, kind)?;
        let digest = Sha256::digest(bytes);
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        let name = format!("{hex}.{}", kind.extension());
        let path = self.dir.join(&name);
        if !path.exists() {
            std::fs::write(&path, bytes)
                .with_context(|| format!("Failed to write image {}", path.display()))?;
        }

        Ok(StoredImage {
            url: format!("/api/images/{name}"),
            name,
        })
    }

    /// Read a stored image by name. Names that are not `<sha256>.<ext>` are
    /// rejected so callers cannot reach outside the directory.
    pub fn load(&self, name: &str) -> Result<Option<(Vec<u8>, ImageKind)>> {
        let Some(kind) = parse_name(name) else {
            return Ok(None);
        };
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path)
            .with_context(|| format!("Failed to read image {}", path.display()))?;
        Ok(Some((bytes, kind)))
    }
}

fn parse_name(name: &str) -> Option<ImageKind> {
    let (stem, ext) = name.split_once('.')?;
    if stem.len() != 64 || !stem.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
        return None;
    }
    ImageKind::from_extension(ext)
}
