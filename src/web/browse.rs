//! ContentDirectory `Browse` action engine.

use std::path::Path;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::duration;
use crate::object_id::{ObjectIdMap, MEDIA_ROOT_ID, PARENT_OF_VIRTUAL_ROOT_ID, VIRTUAL_ROOT_ID};
use crate::state::AppState;
use crate::web::xml::{self, DidlContainer, DidlItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseFlag {
    Metadata,
    DirectChildren,
}

pub struct BrowseRequest {
    pub object_id: String,
    pub flag: BrowseFlag,
    pub starting_index: u32,
    pub requested_count: u32,
}

pub struct BrowseResult {
    pub didl: String,
    pub number_returned: usize,
    pub total_matches: usize,
    pub update_id: u32,
}

fn empty_result(update_id: u32) -> BrowseResult {
    BrowseResult {
        didl: xml::generate_didl(&[], &[]),
        number_returned: 0,
        total_matches: 0,
        update_id,
    }
}

pub async fn browse(state: &AppState, request: BrowseRequest) -> BrowseResult {
    let object_id = if request.object_id.is_empty() {
        VIRTUAL_ROOT_ID.to_string()
    } else {
        request.object_id
    };

    let update_id = if xml::root_ids_for_flag(&object_id) {
        state.identity.on_root_access().await
    } else {
        state.identity.system_update_id()
    };

    let map = ObjectIdMap::build(&state.config.media_root);

    match request.flag {
        BrowseFlag::Metadata => browse_metadata(state, &map, &object_id, update_id),
        BrowseFlag::DirectChildren => {
            browse_children(state, &map, &object_id, request.starting_index, request.requested_count, update_id)
        }
    }
}

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn media_url(state: &AppState, relative: &Path) -> String {
    let encoded = relative
        .to_string_lossy()
        .split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/");
    format!(
        "http://{}:{}/media/{encoded}",
        state.server_ip, state.config.port
    )
}

fn browse_metadata(
    state: &AppState,
    map: &ObjectIdMap,
    object_id: &str,
    update_id: u32,
) -> BrowseResult {
    if object_id == VIRTUAL_ROOT_ID {
        let didl = xml::generate_didl(
            &[DidlContainer {
                id: VIRTUAL_ROOT_ID.to_string(),
                parent_id: PARENT_OF_VIRTUAL_ROOT_ID.to_string(),
                title: "Media Library".to_string(),
                child_count: 1,
            }],
            &[],
        );
        return BrowseResult {
            didl,
            number_returned: 1,
            total_matches: 1,
            update_id,
        };
    }

    let Some(relative) = map.relative_path(object_id) else {
        return empty_result(update_id);
    };
    let absolute = state.config.media_root.join(relative);
    let Ok(metadata) = std::fs::metadata(&absolute) else {
        return empty_result(update_id);
    };

    let parent_id = map.parent_id(object_id);
    let name = file_name_of(relative, object_id);

    let didl = if metadata.is_dir() {
        let child_count = direct_children(state, relative).len();
        xml::generate_didl(
            &[DidlContainer {
                id: object_id.to_string(),
                parent_id,
                title: name,
                child_count,
            }],
            &[],
        )
    } else {
        xml::generate_didl(&[], &[build_item(state, object_id, &parent_id, relative, &absolute, &metadata, &name)])
    };

    BrowseResult {
        didl,
        number_returned: 1,
        total_matches: 1,
        update_id,
    }
}

fn file_name_of(relative: &Path, object_id: &str) -> String {
    if object_id == MEDIA_ROOT_ID {
        "Media Library".to_string()
    } else {
        relative
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| object_id.to_string())
    }
}

fn browse_children(
    state: &AppState,
    map: &ObjectIdMap,
    object_id: &str,
    starting_index: u32,
    requested_count: u32,
    update_id: u32,
) -> BrowseResult {
    let target = if object_id == VIRTUAL_ROOT_ID {
        None
    } else {
        match map.relative_path(object_id) {
            Some(p) => Some(p.to_path_buf()),
            None => return empty_result(update_id),
        }
    };

    // "0"'s only child is the media root itself.
    if target.is_none() {
        let didl = xml::generate_didl(
            &[DidlContainer {
                id: MEDIA_ROOT_ID.to_string(),
                parent_id: VIRTUAL_ROOT_ID.to_string(),
                title: "Media Library".to_string(),
                child_count: direct_children(state, Path::new("")).len(),
            }],
            &[],
        );
        return BrowseResult {
            didl,
            number_returned: 1,
            total_matches: 1,
            update_id,
        };
    }

    let target = target.unwrap();
    let mut entries = direct_children(state, &target);
    entries.sort_by_key(|e| e.name.to_lowercase());

    let total_matches = entries.len();
    let start = starting_index as usize;
    let count = if requested_count == 0 {
        total_matches.saturating_sub(start)
    } else {
        requested_count as usize
    };
    let page: Vec<_> = entries.into_iter().skip(start).take(count).collect();

    let mut containers = Vec::new();
    let mut items = Vec::new();
    for entry in page {
        let Some(id) = map.id_for(&entry.relative) else {
            continue;
        };
        if entry.is_dir {
            containers.push(DidlContainer {
                id: id.to_string(),
                parent_id: object_id.to_string(),
                title: entry.name,
                child_count: direct_children(state, &entry.relative).len(),
            });
        } else {
            let absolute = state.config.media_root.join(&entry.relative);
            let Ok(metadata) = std::fs::metadata(&absolute) else {
                continue;
            };
            items.push(build_item(
                state,
                id,
                object_id,
                &entry.relative,
                &absolute,
                &metadata,
                &entry.name,
            ));
        }
    }

    let number_returned = containers.len() + items.len();
    let didl = xml::generate_didl(&containers, &items);

    BrowseResult {
        didl,
        number_returned,
        total_matches,
        update_id,
    }
}

struct Entry {
    relative: std::path::PathBuf,
    name: String,
    is_dir: bool,
}

fn direct_children(state: &AppState, relative_dir: &Path) -> Vec<Entry> {
    let absolute = state.config.media_root.join(relative_dir);
    let Ok(read_dir) = std::fs::read_dir(&absolute) else {
        return Vec::new();
    };
    read_dir
        .filter_map(|e| e.ok())
        .filter_map(|entry| {
            let metadata = entry.metadata().ok()?;
            let name = entry.file_name().to_string_lossy().to_string();
            let relative = relative_dir.join(&name);
            Some(Entry {
                relative,
                name,
                is_dir: metadata.is_dir(),
            })
        })
        .collect()
}

fn build_item(
    state: &AppState,
    id: &str,
    parent_id: &str,
    relative: &Path,
    absolute: &Path,
    metadata: &std::fs::Metadata,
    name: &str,
) -> DidlItem {
    let mime = state.mime.guess(relative);
    let dur = duration::sniff(absolute).map(duration::format_duration);
    DidlItem {
        id: id.to_string(),
        parent_id: parent_id.to_string(),
        title: name.to_string(),
        mime_type: mime,
        size: metadata.len(),
        url: media_url(state, relative),
        duration: dur,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use std::fs;
    use tempfile::tempdir;

    fn test_state(root: &Path) -> AppState {
        let config = ServerConfig {
            media_root: root.to_path_buf(),
            port: 8200,
            verbose: false,
            server_name: "Test".to_string(),
        };
        AppState::new(config, None, "127.0.0.1".to_string())
    }

    #[tokio::test]
    async fn browse_root_returns_media_container() {
        let root = tempdir().unwrap();
        let state = test_state(root.path());

        let result = browse(
            &state,
            BrowseRequest {
                object_id: "0".to_string(),
                flag: BrowseFlag::DirectChildren,
                starting_index: 0,
                requested_count: 0,
            },
        )
        .await;

        assert_eq!(result.number_returned, 1);
        assert!(result.didl.contains(r#"id="1""#));
    }

    #[tokio::test]
    async fn browse_empty_library_returns_no_entries() {
        let root = tempdir().unwrap();
        let state = test_state(root.path());

        let result = browse(
            &state,
            BrowseRequest {
                object_id: MEDIA_ROOT_ID.to_string(),
                flag: BrowseFlag::DirectChildren,
                starting_index: 0,
                requested_count: 0,
            },
        )
        .await;

        assert_eq!(result.number_returned, 0);
        assert_eq!(result.total_matches, 0);
    }

    #[tokio::test]
    async fn browse_populated_library_lists_files() {
        let root = tempdir().unwrap();
        fs::write(root.path().join("a.mp4"), vec![0u8; 1_048_576]).unwrap();
        fs::write(root.path().join("b.mkv"), vec![0u8; 2_097_152]).unwrap();
        let state = test_state(root.path());

        let result = browse(
            &state,
            BrowseRequest {
                object_id: MEDIA_ROOT_ID.to_string(),
                flag: BrowseFlag::DirectChildren,
                starting_index: 0,
                requested_count: 0,
            },
        )
        .await;

        assert_eq!(result.number_returned, 2);
        assert_eq!(result.total_matches, 2);
        assert!(result.didl.contains("AVC_MP4_MP_SD_AAC_MULT5"));
        assert!(result.didl.contains("MATROSKA"));
        assert!(result.didl.contains(r#"size="1048576""#));
        assert!(result.didl.contains(r#"size="2097152""#));
    }

    #[tokio::test]
    async fn unknown_object_id_returns_empty_not_error() {
        let root = tempdir().unwrap();
        let state = test_state(root.path());

        let result = browse(
            &state,
            BrowseRequest {
                object_id: "9999".to_string(),
                flag: BrowseFlag::DirectChildren,
                starting_index: 0,
                requested_count: 0,
            },
        )
        .await;

        assert_eq!(result.number_returned, 0);
    }

    #[tokio::test]
    async fn pagination_respects_starting_index_and_count() {
        let root = tempdir().unwrap();
        for name in ["a.mp3", "b.mp3", "c.mp3"] {
            fs::write(root.path().join(name), b"x").unwrap();
        }
        let state = test_state(root.path());

        let result = browse(
            &state,
            BrowseRequest {
                object_id: MEDIA_ROOT_ID.to_string(),
                flag: BrowseFlag::DirectChildren,
                starting_index: 1,
                requested_count: 1,
            },
        )
        .await;

        assert_eq!(result.number_returned, 1);
        assert_eq!(result.total_matches, 3);
    }
}
