//! Best-effort media duration sniffing from the first 64KiB of a file.
//!
//! Reads raw MP4 `moov/mvhd` or AVI `avih` structures directly; never
//! shells out to an external prober. Purely advisory: any parse failure
//! means the caller omits the `duration=` DIDL-Lite attribute.

use std::fs::File;
use std::io::Read;
use std::path::Path;

const SNIFF_LIMIT: usize = 64 * 1024;

/// Sniff a duration in seconds, or `None` if the format isn't recognized
/// or the relevant box/chunk falls outside the first 64KiB.
pub fn sniff(path: &Path) -> Option<f64> {
    let mut file = File::open(path).ok()?;
    let mut buf = vec![0u8; SNIFF_LIMIT];
    let read = file.read(&mut buf).ok()?;
    buf.truncate(read);

    if buf.len() >= 12 && &buf[0..4] == b"RIFF" && &buf[8..12] == b"AVI " {
        sniff_avi(&buf)
    } else {
        sniff_mp4(&buf)
    }
}

/// Format seconds as the DIDL-Lite `res@duration` form, `H:MM:SS.mmm`.
pub fn format_duration(seconds: f64) -> String {
    let total_millis = (seconds * 1000.0).round().max(0.0) as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis / 60_000) % 60;
    let secs = (total_millis / 1000) % 60;
    let millis = total_millis % 1000;
    format!("{hours}:{minutes:02}:{secs:02}.{millis:03}")
}

fn sniff_mp4(buf: &[u8]) -> Option<f64> {
    let moov = find_box(buf, b"moov")?;
    let mvhd = find_box(moov, b"mvhd")?;
    if mvhd.len() < 4 {
        return None;
    }
    let version = mvhd[0];
    if version == 0 {
        if mvhd.len() < 20 {
            return None;
        }
        let timescale = u32::from_be_bytes(mvhd[12..16].try_into().ok()?);
        let duration = u32::from_be_bytes(mvhd[16..20].try_into().ok()?);
        if timescale == 0 {
            return None;
        }
        Some(duration as f64 / timescale as f64)
    } else {
        if mvhd.len() < 28 {
            return None;
        }
        let timescale = u32::from_be_bytes(mvhd[20..24].try_into().ok()?);
        let duration = u32::from_be_bytes(mvhd[24..28].try_into().ok()?);
        if timescale == 0 {
            return None;
        }
        Some(duration as f64 / timescale as f64)
    }
}

/// Locate the contents of the first `fourcc` box at any nesting depth
/// reachable from `buf`, searching only within `container` boxes.
fn find_box<'a>(buf: &'a [u8], fourcc: &[u8; 4]) -> Option<&'a [u8]> {
    let mut offset = 0;
    while offset + 8 <= buf.len() {
        let size = u32::from_be_bytes(buf[offset..offset + 4].try_into().ok()?) as usize;
        let kind = &buf[offset + 4..offset + 8];
        if size < 8 || offset + size > buf.len() {
            // Box truncated by the sniff window or malformed; give up on
            // this container rather than scanning garbage.
            if kind == fourcc {
                return Some(&buf[offset + 8..]);
            }
            break;
        }
        if kind == fourcc {
            return Some(&buf[offset + 8..offset + size]);
        }
        if matches!(kind, b"moov" | b"trak" | b"mdia" | b"udta") {
            if let Some(found) = find_box(&buf[offset + 8..offset + size], fourcc) {
                return Some(found);
            }
        }
        offset += size;
    }
    None
}

fn sniff_avi(buf: &[u8]) -> Option<f64> {
    let avih = find_riff_chunk(buf, b"avih")?;
    if avih.len() < 16 {
        return None;
    }
    let micros_per_frame = u32::from_le_bytes(avih[0..4].try_into().ok()?);
    let total_frames = u32::from_le_bytes(avih[12..16].try_into().ok()?);
    if micros_per_frame == 0 {
        return None;
    }
    Some((total_frames as u64 * micros_per_frame as u64) as f64 / 1_000_000.0)
}

fn find_riff_chunk<'a>(buf: &'a [u8], fourcc: &[u8; 4]) -> Option<&'a [u8]> {
    let mut offset = 12; // past "RIFF" size "AVI "
    while offset + 8 <= buf.len() {
        let id = &buf[offset..offset + 4];
        let size = u32::from_le_bytes(buf[offset + 4..offset + 8].try_into().ok()?) as usize;

        if id == b"LIST" && offset + 12 <= buf.len() {
            let list_type = &buf[offset + 8..offset + 12];
            if list_type == b"hdrl" {
                if let Some(found) = find_riff_chunk_in(&buf[offset + 12..], fourcc) {
                    return Some(found);
                }
            }
        }
        if id == fourcc {
            let end = (offset + 8 + size).min(buf.len());
            return Some(&buf[offset + 8..end]);
        }
        offset += 8 + size + (size % 2);
    }
    None
}

fn find_riff_chunk_in<'a>(buf: &'a [u8], fourcc: &[u8; 4]) -> Option<&'a [u8]> {
    let mut offset = 0;
    while offset + 8 <= buf.len() {
        let id = &buf[offset..offset + 4];
        let size = u32::from_le_bytes(buf[offset + 4..offset + 8].try_into().ok()?) as usize;
        if id == fourcc {
            let end = (offset + 8 + size).min(buf.len());
            return Some(&buf[offset + 8..end]);
        }
        offset += 8 + size + (size % 2);
    }
    None
}
