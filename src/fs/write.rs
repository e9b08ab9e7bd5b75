use std::fs::{self, File};
use std::path::{Component, Path};

use tracing::debug;

use crate::error::{IoResultExt, Result};

/// fsync a directory
pub fn fsync_dir(path: &Path) -> Result<()> {
    let dir = File::open(path).with_path(path)?;
    dir.sync_all().with_path(path)?;
    Ok(())
}

/// fsync a file
pub fn fsync_file(path: &Path) -> Result<()> {
    let file = File::open(path).with_path(path)?;
    file.sync_all().with_path(path)?;
    Ok(())
}

/// replace `root/rel` with a copy of `source`
///
/// the copy is staged at `tmp` and renamed into place, so readers never see
/// a half-written file. anything in the way (a directory where the file
/// goes, or a file where a parent directory goes) is removed first.
pub fn replace_file(root: &Path, rel: &str, source: &Path, tmp: &Path, fsync: bool) -> Result<u64> {
    let dest = root.join(rel);
    make_parent_dirs(root, rel)?;

    if dest.is_dir() && !dest.is_symlink() {
        debug!(path = ?dest, "removing directory in the way of restored file");
        fs::remove_dir_all(&dest).with_path(&dest)?;
    }

    let copied = fs::copy(source, tmp).with_path(tmp)?;
    if fsync {
        fsync_file(tmp)?;
    }
    fs::rename(tmp, &dest).with_path(&dest)?;

    Ok(copied)
}

/// remove `root/rel`, then every parent directory this leaves empty
///
/// pruning stops at the first non-empty directory and never removes `root`.
pub fn remove_file_and_prune(root: &Path, rel: &str) -> Result<()> {
    let path = root.join(rel);

    // already gone, or replaced by a directory / shadowed by a file during restore
    match fs::symlink_metadata(&path) {
        Ok(meta) if !meta.is_dir() => fs::remove_file(&path).with_path(&path)?,
        _ => return Ok(()),
    }

    let mut dir = path.parent();
    while let Some(d) = dir {
        if d == root || !d.starts_with(root) {
            break;
        }
        let is_empty = match fs::read_dir(d) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => break,
        };
        if !is_empty {
            break;
        }
        fs::remove_dir(d).with_path(d)?;
        debug!(path = ?d, "pruned empty directory");
        dir = d.parent();
    }

    Ok(())
}

/// create the parent directories of `root/rel`, replacing files in the way
fn make_parent_dirs(root: &Path, rel: &str) -> Result<()> {
    let Some(parent) = Path::new(rel).parent() else {
        return Ok(());
    };

    let mut current = root.to_path_buf();
    for component in parent.components() {
        if let Component::Normal(part) = component {
            current.push(part);
            match fs::symlink_metadata(&current) {
                Ok(meta) if meta.is_dir() => continue,
                Ok(_) => {
                    debug!(path = ?current, "removing file in the way of restored directory");
                    fs::remove_file(&current).with_path(&current)?;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e).with_path(&current),
            }
            fs::create_dir(&current).with_path(&current)?;
        }
    }

    Ok(())
}
