//! Numeric ObjectID bijection: maps the virtual root, the media root,
//! and every descendant file/directory to a stable-for-one-Browse numeric
//! string ID, and back.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const VIRTUAL_ROOT_ID: &str = "0";
pub const MEDIA_ROOT_ID: &str = "1";
pub const PARENT_OF_VIRTUAL_ROOT_ID: &str = "-1";

/// A fresh assignment of numeric IDs to relative paths under a media root,
/// built by one depth-first pre-order walk. IDs are only valid for the
/// Browse request they were built for; rebuild per request.
#[derive(Debug, Default)]
pub struct ObjectIdMap {
    id_to_path: HashMap<String, PathBuf>,
    path_to_id: HashMap<PathBuf, String>,
}

impl ObjectIdMap {
    /// Walk `media_root` depth-first, pre-order, assigning sequential IDs
    /// starting at 2 (0 and 1 are reserved for the virtual and media root).
    pub fn build(media_root: &Path) -> Self {
        let mut map = ObjectIdMap::default();
        map.path_to_id.insert(PathBuf::new(), MEDIA_ROOT_ID.to_string());
        map.id_to_path
            .insert(MEDIA_ROOT_ID.to_string(), PathBuf::new());

        let mut next_id = 2u64;
        walk(media_root, media_root, &mut next_id, &mut map);
        map
    }

    /// Resolve an ObjectID to a path relative to the media root. The
    /// virtual root and its parent have no filesystem path of their own.
    pub fn relative_path(&self, id: &str) -> Option<&Path> {
        self.id_to_path.get(id).map(PathBuf::as_path)
    }

    /// Look up the ObjectID assigned to a path relative to the media root.
    pub fn id_for(&self, relative: &Path) -> Option<&str> {
        self.path_to_id.get(relative).map(String::as_str)
    }

    /// ID of the containing object: the media root's parent is the virtual
    /// root, and the virtual root's parent is [`PARENT_OF_VIRTUAL_ROOT_ID`].
    pub fn parent_id(&self, id: &str) -> String {
        if id == VIRTUAL_ROOT_ID {
            return PARENT_OF_VIRTUAL_ROOT_ID.to_string();
        }
        if id == MEDIA_ROOT_ID {
            return VIRTUAL_ROOT_ID.to_string();
        }
        match self.relative_path(id).and_then(Path::parent) {
            Some(parent) => self
                .id_for(parent)
                .map(str::to_string)
                .unwrap_or_else(|| MEDIA_ROOT_ID.to_string()),
            None => MEDIA_ROOT_ID.to_string(),
        }
    }
}

fn walk(root: &Path, dir: &Path, next_id: &mut u64, map: &mut ObjectIdMap) {
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return;
    };
    let mut entries: Vec<_> = read_dir.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();

        let id = next_id.to_string();
        *next_id += 1;
        map.id_to_path.insert(id.clone(), relative.clone());
        map.path_to_id.insert(relative, id);

        if metadata.is_dir() {
            walk(root, &path, next_id, map);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn bijection_round_trips() {
        let root = tempdir().unwrap();
        fs::create_dir(root.path().join("sub")).unwrap();
        fs::write(root.path().join("sub/b.mp4"), b"x").unwrap();
        fs::write(root.path().join("a.mp3"), b"y").unwrap();

        let map = ObjectIdMap::build(root.path());
        for id in ["1", "2", "3", "4"] {
            let path = map.relative_path(id).unwrap().to_path_buf();
            assert_eq!(map.id_for(&path), Some(id));
        }
    }

    #[test]
    fn reserved_ids_have_no_path() {
        let root = tempdir().unwrap();
        let map = ObjectIdMap::build(root.path());
        assert!(map.relative_path(VIRTUAL_ROOT_ID).is_none());
        assert_eq!(map.relative_path(MEDIA_ROOT_ID), Some(Path::new("")));
    }

    #[test]
    fn parent_chain_reaches_virtual_root() {
        let root = tempdir().unwrap();
        fs::create_dir(root.path().join("sub")).unwrap();
        fs::write(root.path().join("sub/b.mp4"), b"x").unwrap();

        let map = ObjectIdMap::build(root.path());
        let sub_id = map.id_for(Path::new("sub")).unwrap().to_string();
        let file_id = map.id_for(Path::new("sub/b.mp4")).unwrap().to_string();

        assert_eq!(map.parent_id(&file_id), sub_id);
        assert_eq!(map.parent_id(&sub_id), MEDIA_ROOT_ID);
        assert_eq!(map.parent_id(MEDIA_ROOT_ID), VIRTUAL_ROOT_ID);
        assert_eq!(map.parent_id(VIRTUAL_ROOT_ID), PARENT_OF_VIRTUAL_ROOT_ID);
    }
}
