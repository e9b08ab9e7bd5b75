//! tracked images: one snapshot repository per image folder

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, IoResultExt, Result};
use crate::hash::Hash;
use crate::ops::SaveOutcome;
use crate::repo::Repository;
use crate::types::{normalize_path, Snapshot};

/// payload file inside every image folder
pub const IMAGE_FILE: &str = "image.png";
/// sidecar metadata inside every image folder
pub const IMAGE_META_FILE: &str = "meta.json";
/// project metadata at the project root
pub const PROJECT_META_FILE: &str = "project.meta.json";

/// project-level metadata
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMeta {
    #[serde(default)]
    pub name: String,
}

/// per-image sidecar
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMeta {
    #[serde(default)]
    pub time_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_upscaled: Option<DateTime<Utc>>,
    /// generation parameters
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// a folder of images, each versioned independently
#[derive(Debug)]
pub struct Project {
    root: PathBuf,
    meta: ProjectMeta,
    images: BTreeMap<String, TrackedImage>,
}

impl Project {
    /// open a project, creating `images/` on first use
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let images_dir = root.join("images");
        fs::create_dir_all(&images_dir).with_path(&images_dir)?;

        let mut images = BTreeMap::new();
        for entry in fs::read_dir(&images_dir).with_path(&images_dir)? {
            let entry = entry.with_path(&images_dir)?;
            if !entry.file_type().with_path(entry.path())?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                debug!(path = ?entry.path(), "skipping non-utf8 image folder");
                continue;
            };
            let image = TrackedImage::open(entry.path(), &name)?;
            images.insert(name, image);
        }

        let meta_path = root.join(PROJECT_META_FILE);
        let meta = if meta_path.exists() {
            read_json(&meta_path)?
        } else {
            let meta = ProjectMeta::default();
            write_json(&meta_path, &meta)?;
            meta
        };

        info!(root = ?root, images = images.len(), "opened project");

        Ok(Self { root, meta, images })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    pub fn meta(&self) -> &ProjectMeta {
        &self.meta
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        self.meta.name = name.to_string();
        write_json(&self.root.join(PROJECT_META_FILE), &self.meta)
    }

    /// create an empty image folder with its repository
    pub fn create_image(&mut self, name: &str) -> Result<&TrackedImage> {
        self.build_image(name, |image| {
            image.update_meta(|meta| meta.time_created = Some(Utc::now()))
        })
    }

    /// create an image from its payload and record the first snapshot
    pub fn add_image(
        &mut self,
        name: &str,
        data: &[u8],
        params: BTreeMap<String, String>,
    ) -> Result<&TrackedImage> {
        self.build_image(name, |image| {
            image.update_meta(|meta| {
                meta.time_created = Some(Utc::now());
                meta.params = params;
            })?;
            image.update(data)?;
            image.save_snapshot("initial")?;
            Ok(())
        })
    }

    /// open a new image folder and run `init` on it
    ///
    /// the image is registered only once `init` succeeds; on failure a
    /// folder created here is removed again.
    fn build_image<F>(&mut self, name: &str, init: F) -> Result<&TrackedImage>
    where
        F: FnOnce(&TrackedImage) -> Result<()>,
    {
        validate_image_name(name)?;
        if self.images.contains_key(name) {
            return Err(Error::ImageExists(name.to_string()));
        }

        let path = self.images_dir().join(name);
        let created = !path.exists();

        let result = TrackedImage::open(&path, name).and_then(|image| {
            init(&image)?;
            Ok(image)
        });
        let image = match result {
            Ok(image) => image,
            Err(e) => {
                if created {
                    if let Err(cleanup) = fs::remove_dir_all(&path) {
                        warn!(path = ?path, error = %cleanup, "failed to remove partial image");
                    }
                }
                return Err(e);
            }
        };

        info!(image = name, "created image");
        Ok(self.images.entry(name.to_string()).or_insert(image))
    }

    pub fn image(&self, name: &str) -> Result<&TrackedImage> {
        self.images
            .get(name)
            .ok_or_else(|| Error::ImageNotFound(name.to_string()))
    }

    /// image names, sorted
    pub fn images(&self) -> Vec<&str> {
        self.images.keys().map(String::as_str).collect()
    }
}

/// one image folder: payload, sidecar, and its own repository
#[derive(Debug)]
pub struct TrackedImage {
    name: String,
    path: PathBuf,
    repo: Repository,
}

impl TrackedImage {
    /// open (or create) an image folder
    pub fn open(path: impl AsRef<Path>, name: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path).with_path(&path)?;

        let repo = Repository::open(&path)?;

        Ok(Self {
            name: name.to_string(),
            path,
            repo,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// the sidecar as currently on disk
    ///
    /// read on every call: a restore may have replaced it.
    pub fn meta(&self) -> Result<ImageMeta> {
        read_json(&self.path.join(IMAGE_META_FILE))
    }

    /// edit the on-disk sidecar and write it back
    pub fn update_meta(&self, f: impl FnOnce(&mut ImageMeta)) -> Result<()> {
        let mut meta = self.meta()?;
        f(&mut meta);
        write_json(&self.path.join(IMAGE_META_FILE), &meta)
    }

    /// overwrite the payload; not versioned until the next save
    pub fn update(&self, content: &[u8]) -> Result<()> {
        let path = self.path.join(IMAGE_FILE);
        fs::write(&path, content).with_path(&path)
    }

    pub fn save_snapshot(&self, description: &str) -> Result<SaveOutcome> {
        self.repo.save_snapshot(description)
    }

    /// payload bytes from a snapshot, or the live file for `None`
    pub fn read_version(&self, snapshot: Option<&Hash>) -> Result<Vec<u8>> {
        self.repo.read_file(IMAGE_FILE, snapshot)
    }

    pub fn history(&self) -> Vec<Snapshot> {
        self.repo.history()
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }
}

/// image names are single path components
fn validate_image_name(name: &str) -> Result<()> {
    let normalized = normalize_path(Path::new(name))?;
    if normalized != name || name.contains('/') {
        return Err(Error::InvalidPath(format!("invalid image name: {}", name)));
    }
    Ok(())
}

fn read_json<T: Default + serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    match fs::read(path) {
        Ok(content) => Ok(serde_json::from_slice(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e).with_path(path),
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(path, bytes).with_path(path)
}
