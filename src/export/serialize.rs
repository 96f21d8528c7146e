//! Font serialization into a project's working copy.
//!
//! Each font is written to `<font name>.rcjk/font.json` at the root of the
//! working copy. Output is deterministic: object keys are sorted and files
//! whose content did not change are left untouched.

use miette::Diagnostic;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::db::Font;

pub const FONT_DIR_SUFFIX: &str = ".rcjk";
pub const FONT_FILE_NAME: &str = "font.json";

/// Errors that can occur while writing fonts to disk.
#[derive(Error, Diagnostic, Debug)]
pub enum SerializeError {
    #[error("IO error writing {}: {source}", .path.display())]
    #[diagnostic(code(robocjk::export::serialize::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error for font {uid}: {source}")]
    #[diagnostic(code(robocjk::export::serialize::json))]
    Json {
        uid: Uuid,
        #[source]
        source: serde_json::Error,
    },

    #[error("Fonts {first} and {second} both map to directory '{dir}'")]
    #[diagnostic(
        code(robocjk::export::serialize::duplicate_dir),
        help("Font names must be unique within a project")
    )]
    DuplicateFontDir { dir: String, first: Uuid, second: Uuid },
}

#[derive(Serialize)]
struct FontDocument<'a> {
    uid: &'a Uuid,
    name: &'a str,
    data: &'a serde_json::Value,
}

/// Directory name of a font inside the working copy.
pub fn font_dir_name(font: &Font) -> String {
    let name = sanitize_filename::sanitize(font.name.trim());
    let stem = if name.is_empty() || name.starts_with('.') {
        font.uid.hyphenated().to_string()
    } else {
        name
    };
    format!("{}{}", stem, FONT_DIR_SUFFIX)
}

/// Directory names for all fonts of a project, keyed by font uid.
///
/// Computed over every font of the project, not just the ones being
/// exported, so incremental exports cannot collide with unchanged fonts.
pub fn font_dir_names(fonts: &[Font]) -> Result<BTreeMap<Uuid, String>, SerializeError> {
    let mut by_dir: BTreeMap<String, Uuid> = BTreeMap::new();
    let mut names = BTreeMap::new();

    for font in fonts {
        let dir = font_dir_name(font);
        // Case-insensitive filesystems would merge these directories.
        if let Some(first) = by_dir.insert(dir.to_lowercase(), font.uid) {
            return Err(SerializeError::DuplicateFontDir {
                dir,
                first,
                second: font.uid,
            });
        }
        names.insert(font.uid, dir);
    }

    Ok(names)
}

/// Render a font document. Keys are sorted since `serde_json::Value` maps
/// are ordered.
pub fn render_font(font: &Font) -> Result<Vec<u8>, SerializeError> {
    let document = FontDocument {
        uid: &font.uid,
        name: &font.name,
        data: &font.data,
    };
    let mut bytes =
        serde_json::to_vec_pretty(&document).map_err(|source| SerializeError::Json {
            uid: font.uid,
            source,
        })?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Write `fonts` into `root`. Returns the font directories written, relative
/// to `root`, for staging.
pub fn write_fonts(
    root: &Path,
    fonts: &[&Font],
    dir_names: &BTreeMap<Uuid, String>,
) -> Result<Vec<String>, SerializeError> {
    let mut written = Vec::with_capacity(fonts.len());

    for font in fonts {
        let dir_name = match dir_names.get(&font.uid) {
            Some(name) => name.clone(),
            None => font_dir_name(font),
        };
        let dir = root.join(&dir_name);
        std::fs::create_dir_all(&dir).map_err(|source| SerializeError::Io {
            path: dir.clone(),
            source,
        })?;

        write_if_changed(&dir.join(FONT_FILE_NAME), &render_font(font)?)?;
        written.push(dir_name);
    }

    Ok(written)
}

/// Remove font directories in `root` that belong to no current font.
/// Returns the removed directory names, relative to `root`.
pub fn prune_stale_fonts(
    root: &Path,
    dir_names: &BTreeMap<Uuid, String>,
) -> Result<Vec<String>, SerializeError> {
    let keep: BTreeSet<&str> = dir_names.values().map(String::as_str).collect();
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| SerializeError::Io { path, source }
    };

    let mut removed = Vec::new();
    for entry in std::fs::read_dir(root).map_err(io_err(root))? {
        let entry = entry.map_err(io_err(root))?;
        let name = entry.file_name().to_string_lossy().to_string();

        if !name.ends_with(FONT_DIR_SUFFIX) || keep.contains(name.as_str()) {
            continue;
        }
        if !entry.file_type().map_err(io_err(&entry.path()))?.is_dir() {
            continue;
        }

        std::fs::remove_dir_all(entry.path()).map_err(io_err(&entry.path()))?;
        removed.push(name);
    }

    removed.sort();
    Ok(removed)
}

/// Atomically replace `path` with `contents` unless it already holds them.
fn write_if_changed(path: &Path, contents: &[u8]) -> Result<(), SerializeError> {
    if std::fs::read(path).is_ok_and(|existing| existing == contents) {
        return Ok(());
    }

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let io_err = |source| SerializeError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    file.write_all(contents).map_err(io_err)?;
    file.flush().map_err(io_err)?;
    file.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
