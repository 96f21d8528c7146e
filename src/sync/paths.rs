//! Path resolution for project working copies.

use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Working copy directory of a project: `<GIT_REPOSITORIES_PATH>/<project uid>`.
///
/// The uid is used rather than the repository name, which two projects on
/// different hosts may share.
pub fn working_copy_dir(repositories_path: &Path, project_uid: &Uuid) -> PathBuf {
    repositories_path.join(project_uid.hyphenated().to_string())
}
