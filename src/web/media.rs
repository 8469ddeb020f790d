//! Media file delivery: `GET`/`HEAD /media/<path>` with always-on 206
//! byte-range responses (DLNA renderers, notably the Xbox 360, never send
//! a `Range` header but require 206 anyway).

use axum::{
    body::Body,
    extract::{Path as AxumPath, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::Response,
};
use percent_encoding::percent_decode_str;
use std::io::SeekFrom;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::error::AppError;
use crate::path_safety;
use crate::state::AppState;
use crate::web::xml::content_features;

const LARGE_REMAINING_THRESHOLD: u64 = 2 * 1024 * 1024;
const SMALL_CHUNK: usize = 16 * 1024;
const LARGE_CHUNK: usize = 512 * 1024;

struct ByteRange {
    start: u64,
    end: u64,
}

/// Parse a `Range` header against a file of `size` bytes, per the rules in
/// §4.8: missing or unparsable ranges fall back to the full file; an
/// open-ended range (`A-`) runs to EOF; a closed range (`A-B`) is honored
/// only if it is in bounds, else it also falls back to the full file.
fn parse_range(header: Option<&str>, size: u64) -> ByteRange {
    let full = ByteRange {
        start: 0,
        end: size.saturating_sub(1),
    };
    let Some(header) = header else { return full };
    let Some(spec) = header.strip_prefix("bytes=") else {
        return full;
    };
    let Some((start_str, end_str)) = spec.split_once('-') else {
        return full;
    };
    let Ok(start) = start_str.trim().parse::<u64>() else {
        return full;
    };

    if end_str.trim().is_empty() {
        if start < size {
            return ByteRange {
                start,
                end: size.saturating_sub(1),
            };
        }
        return full;
    }

    match end_str.trim().parse::<u64>() {
        Ok(end) if start <= end && end < size => ByteRange { start, end },
        _ => full,
    }
}

pub async fn serve_media(
    State(state): State<AppState>,
    method: Method,
    AxumPath(encoded_path): AxumPath<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let relative = percent_decode_str(&encoded_path)
        .decode_utf8()
        .map(|s| s.to_string())
        .unwrap_or(encoded_path);

    let requested = state.config.media_root.join(&relative);
    if !path_safety::is_safe(&state.config.media_root, &requested) {
        return Err(AppError::Forbidden);
    }

    let metadata = match tokio::fs::metadata(&requested).await {
        Ok(m) if m.is_file() => m,
        _ => return Err(AppError::NotFound),
    };

    {
        let mut now_playing = state.now_playing.write().await;
        *now_playing = Some(std::path::PathBuf::from(&relative));
    }

    let size = metadata.len();
    let mime = state.mime.guess(std::path::Path::new(&relative));
    let range_header = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok());
    let range = parse_range(range_header, size);
    let content_length = range.end - range.start + 1;

    let response = Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(header::CONTENT_TYPE, mime.clone())
        .header(header::CONTENT_LENGTH, content_length)
        .header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", range.start, range.end, size),
        )
        .header(header::ACCEPT_RANGES, "bytes")
        .header("contentFeatures.dlna.org", content_features(&mime))
        .header("TransferMode.DLNA.ORG", "Streaming")
        .header(header::SERVER, "OpenDLNA/1.0 UPnP/1.0 DLNADOC/1.50")
        .header(header::CONNECTION, "keep-alive")
        .header(header::CACHE_CONTROL, "max-age=3600");

    if method == Method::HEAD {
        return response
            .body(Body::empty())
            .map_err(AppError::from);
    }

    let mut file = tokio::fs::File::open(&requested).await?;
    file.seek(SeekFrom::Start(range.start)).await?;
    let bounded = file.take(content_length);

    let capacity = if content_length > LARGE_REMAINING_THRESHOLD {
        SMALL_CHUNK
    } else {
        LARGE_CHUNK
    };
    let stream = ReaderStream::with_capacity(bounded, capacity);

    Ok(response.body(Body::from_stream(stream))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_range_spans_whole_file() {
        let r = parse_range(None, 1000);
        assert_eq!((r.start, r.end), (0, 999));
    }

    #[test]
    fn open_ended_range_runs_to_eof() {
        let r = parse_range(Some("bytes=100-"), 1000);
        assert_eq!((r.start, r.end), (100, 999));
    }

    #[test]
    fn closed_range_is_honored_when_in_bounds() {
        let r = parse_range(Some("bytes=100-199"), 1000);
        assert_eq!((r.start, r.end), (100, 199));
    }

    #[test]
    fn out_of_bounds_range_falls_back_to_full_file() {
        let r = parse_range(Some("bytes=5000-6000"), 1000);
        assert_eq!((r.start, r.end), (0, 999));
    }

    #[test]
    fn malformed_range_falls_back_to_full_file() {
        let r = parse_range(Some("not-a-range"), 1000);
        assert_eq!((r.start, r.end), (0, 999));
    }
}
