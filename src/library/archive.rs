//! ZIP archives holding an exported library as `media_data.json`.

use super::library_manager::LibraryExport;
use anyhow::{Context, Result};
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const ARCHIVE_DATA_FILE: &str = "media_data.json";

pub fn encode_archive(export: &LibraryExport) -> Result<Vec<u8>> {
    let json = serde_json::to_vec_pretty(export).context("Failed to serialize library")?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    writer
        .start_file(ARCHIVE_DATA_FILE, options)
        .context("Failed to start archive entry")?;
    writer.write_all(&json)?;
    let cursor = writer.finish().context("Failed to finish archive")?;
    Ok(cursor.into_inner())
}

pub fn decode_archive(bytes: &[u8]) -> Result<LibraryExport> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).context("Not a valid zip archive")?;
    let mut file = archive
        .by_name(ARCHIVE_DATA_FILE)
        .with_context(|| format!("Archive does not contain {}", ARCHIVE_DATA_FILE))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .with_context(|| format!("Failed to read {}", ARCHIVE_DATA_FILE))?;
    serde_json::from_str(&content).with_context(|| format!("Malformed {}", ARCHIVE_DATA_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::library_manager::ExportedMediaItem;
    use crate::library::models::{CollectionInput, MediaItemInput};

    #[test]
    fn archive_contains_media_data_json() {
        let export = LibraryExport {
            data: vec![ExportedMediaItem {
                id: Some(7),
                item: MediaItemInput {
                    title: "Outer Wilds".to_string(),
                    category: Some("Games".to_string()),
                    rating: Some(10),
                    ..Default::default()
                },
            }],
            collections: vec![CollectionInput {
                name: "Space".to_string(),
                description: None,
                media_item_ids: vec![7],
            }],
        };

        let bytes = encode_archive(&export).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        assert_eq!(archive.len(), 1);
        let mut raw = String::new();
        archive
            .by_name(ARCHIVE_DATA_FILE)
            .unwrap()
            .read_to_string(&mut raw)
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["data"][0]["title"], "Outer Wilds");
        assert_eq!(json["data"][0]["id"], 7);
        assert_eq!(json["collections"][0]["media_item_ids"][0], 7);

        let decoded = decode_archive(&bytes).unwrap();
        assert_eq!(decoded.data[0].item.rating, Some(10));
    }

    #[test]
    fn rejects_archives_without_data_file() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("other.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"hello").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = decode_archive(&bytes).unwrap_err();
        assert!(format!("{:#}", err).contains(ARCHIVE_DATA_FILE));
        assert!(decode_archive(b"not a zip").is_err());
    }
}
