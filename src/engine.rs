//! Conversion engine: load a legacy-encoded file into the buffer as Unicode,
//! and write the buffer back out in the legacy encoding.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::{Instant, SystemTime};

use encoding_rs::Encoding;
use tracing::{debug, info};

use crate::document::{char_len, normalize_newlines, to_crlf, DocumentStore};
use crate::encoding::{decode_strict, encode_strict};
use crate::error::{display_name, Error, Result};
use crate::host::{DeclaredEncoding, DocumentHost, DocumentId, Region, Viewport};

/// Strictly decode the file at `path`, with CRLF normalised to LF.
pub fn decode_file(path: &Path, encoding: &'static Encoding) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    let text = decode_strict(&bytes, encoding).ok_or_else(|| Error::DecodeFailure {
        file: display_name(path),
        encoding: encoding.name(),
    })?;
    Ok(normalize_newlines(&text).into_owned())
}

/// Write `text` with CRLF line endings, strictly encoded, atomically
/// replacing the file at `path`. Returns the file's modification time after
/// the write.
pub fn write_encoded(path: &Path, text: &str, encoding: &'static Encoding) -> Result<SystemTime> {
    let crlf = to_crlf(&normalize_newlines(text));
    let bytes = encode_strict(&crlf, encoding).ok_or_else(|| Error::EncodeFailure {
        file: display_name(path),
        encoding: encoding.name(),
    })?;
    write_atomic(path, &bytes).map_err(|e| Error::io(path, e))?;
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|e| Error::io(path, e))
}

/// Replace the document's buffer with the Unicode decoding of its backing
/// file and mark it converted.
///
/// The replacement runs with the document in scratch mode and inside an
/// internal edit, so neither dirty tracking nor the modified handler treat it
/// as a user edit. Selections and viewport survive the replacement. On error
/// the buffer is untouched.
pub fn convert_to_unicode<H: DocumentHost>(
    host: &mut H,
    store: &DocumentStore,
    doc: DocumentId,
    path: &Path,
    encoding: &'static Encoding,
) -> Result<()> {
    let started = Instant::now();
    let text = decode_file(path, encoding)?;

    let selections = host.selections(doc);
    let viewport = host.viewport(doc);
    host.set_viewport(doc, Viewport::default());

    host.set_scratch(doc, true);
    {
        let _edit = store.begin_internal_edit(doc);
        let whole = Region::new(0, host.size(doc));
        host.replace(doc, whole, &text);
    }

    let len = char_len(&text);
    let selections: Vec<Region> = selections.into_iter().map(|r| r.clamp(len)).collect();
    host.set_selections(doc, &selections);
    host.set_viewport(doc, viewport);
    host.set_encoding(doc, DeclaredEncoding::Unicode);

    store.update(doc, |state| {
        state.needs_processing = true;
        state.converted = true;
        state.source_encoding = Some(encoding);
        state.conversion_failures = 0;
    });

    debug!(%doc, elapsed = ?started.elapsed(), "converted buffer");
    info!(%doc, file = %path.display(), encoding = encoding.name(), "converted to Unicode");
    host.status_message(&format!("{} -> UTF8", encoding.name()));
    Ok(())
}

/// Write the whole buffer to `path` in `encoding` with CRLF line endings,
/// bypassing the host's own save.
pub fn save_with_encoding<H: DocumentHost>(
    host: &H,
    doc: DocumentId,
    path: &Path,
    encoding: &'static Encoding,
) -> Result<SystemTime> {
    let text = host.substr(doc, Region::new(0, host.size(doc)));
    let modified = write_encoded(path, &text, encoding)?;
    info!(%doc, file = %path.display(), encoding = encoding.name(), "saved with legacy encoding");
    Ok(modified)
}

/// Write through a temporary file in the same directory and rename it over
/// the target, keeping the target's permissions. A symlinked target is
/// resolved first so the link itself survives.
fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let target = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let permissions = fs::metadata(&target).map(|meta| meta.permissions()).ok();

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    if let Some(permissions) = permissions {
        fs::set_permissions(tmp.path(), permissions)?;
    }

    tmp.persist(&target).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use encoding_rs::GBK;

    use super::*;

    #[test]
    fn decode_file_normalises_line_endings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gbk.txt");
        fs::write(&path, [0xD6, 0xD0, b'\r', b'\n', 0xB9, 0xFA, b'\n']).unwrap();

        assert_eq!(decode_file(&path, GBK).unwrap(), "中\n国\n");
    }

    #[test]
    fn decode_file_failure_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.txt");
        fs::write(&path, [b'a', 0xFF]).unwrap();

        let err = decode_file(&path, GBK).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Errors occurred while converting broken.txt with GBK encoding"
        );
    }

    #[test]
    fn write_encoded_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gbk.txt");
        let original = [0xD6, 0xD0, b'\r', b'\n', 0xB9, 0xFA, b'\n'];
        fs::write(&path, original).unwrap();

        let text = decode_file(&path, GBK).unwrap();
        write_encoded(&path, &text, GBK).unwrap();

        // Only the lone LF changes.
        assert_eq!(
            fs::read(&path).unwrap(),
            [0xD6, 0xD0, b'\r', b'\n', 0xB9, 0xFA, b'\r', b'\n']
        );
    }

    #[test]
    fn write_encoded_keeps_old_content_on_encode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keep.txt");
        fs::write(&path, b"before").unwrap();

        let err = write_encoded(&path, "emoji 😀", GBK).unwrap_err();
        assert!(matches!(err, Error::EncodeFailure { .. }));
        assert_eq!(fs::read(&path).unwrap(), b"before");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn write_encoded_follows_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real.txt");
        let link = dir.path().join("link.txt");
        fs::write(&real, b"old").unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        write_encoded(&link, "中国", GBK).unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read(&real).unwrap(), [0xD6, 0xD0, 0xB9, 0xFA]);
    }

    #[test]
    fn write_encoded_reports_modification_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.txt");

        let modified = write_encoded(&path, "中国", GBK).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), modified);
    }
}
