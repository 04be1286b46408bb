use std::fs::create_dir_all;
use std::path::{Component, Path, PathBuf};

use crate::Error;

/// Resolve a database file path relative to `base_dir`.
///
/// Missing directories up to the database file are created. Special paths like `:memory:` are
/// passed through unchanged. Empty paths, absolute paths and paths that climb out of `base_dir`
/// are rejected.
pub fn resolve_database_path(path: &str, base_dir: &Path) -> Result<PathBuf, Error> {
   if path.is_empty() {
      return Err(Error::InvalidPath("path cannot be empty".to_string()));
   }

   if path == ":memory:" || path.starts_with("file::memory:") {
      return Ok(PathBuf::from(path));
   }

   let relative = Path::new(path);
   if relative
      .components()
      .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
   {
      return Err(Error::InvalidPath(path.to_string()));
   }

   let resolved = base_dir.join(relative);
   create_dir_all(resolved.parent().unwrap_or(base_dir))?;

   Ok(resolved)
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_relative_path_joined_to_base() {
      let dir = tempfile::tempdir().unwrap();
      let base = dir.path().join("nested");

      let resolved = resolve_database_path("app/data.db", &base).unwrap();

      assert_eq!(resolved, base.join("app/data.db"));
      assert!(base.join("app").is_dir());
   }

   #[test]
   fn test_memory_path_passes_through() {
      let resolved = resolve_database_path(":memory:", Path::new("/unused")).unwrap();
      assert_eq!(resolved, PathBuf::from(":memory:"));
   }

   #[test]
   fn test_rejected_paths() {
      let dir = tempfile::tempdir().unwrap();

      for path in ["", "../escape.db", "/etc/passwd", "a/../../b.db"] {
         let err = resolve_database_path(path, dir.path()).unwrap_err();
         assert!(matches!(err, Error::InvalidPath(_)), "accepted {path:?}");
      }
   }
}
