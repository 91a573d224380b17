//! Turning captured and clipboard data into something uploadable.

use std::{
    io::Cursor,
    path::{Path, PathBuf},
};

use chrono::Local;
use image::{ImageFormat, RgbaImage};
use url::Url;

use crate::{dispatch::DispatchError, executor::payload_filename, paths::Storage};

/// What gets sent to a site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    File(PathBuf),
    Url(String),
}

impl Payload {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Payload::File(path) => Some(path),
            Payload::Url(_) => None,
        }
    }

    /// `$input$` replacement: the file's base name or the URL itself.
    pub fn input(&self) -> String {
        match self {
            Payload::File(path) => payload_filename(path),
            Payload::Url(url) => url.clone(),
        }
    }
}

/// Local paths from a copied-files URI list.
///
/// Lines that are not `file://` URIs, such as the leading `copy` of the
/// GNOME format, are ignored.
pub fn parse_uri_list(text: &str) -> Vec<PathBuf> {
    text.lines()
        .map(str::trim)
        .filter(|line| line.starts_with("file://"))
        .filter_map(|line| Url::parse(line).ok())
        .filter_map(|url| url.to_file_path().ok())
        .collect()
}

/// Write `text` to a new `.txt` archive file.
pub async fn archive_text(storage: &Storage, text: &str) -> Result<PathBuf, DispatchError> {
    let path = storage.archive_file("txt", &Local::now())?;
    tokio::fs::write(&path, text).await?;
    debug!("Archived clipboard text to {}", path.display());
    Ok(path)
}

/// Encode `image` as PNG into a new archive file.
pub async fn archive_png(storage: &Storage, image: &RgbaImage) -> Result<PathBuf, DispatchError> {
    let mut png = Cursor::new(Vec::new());
    image.write_to(&mut png, ImageFormat::Png)?;
    let path = storage.archive_file("png", &Local::now())?;
    tokio::fs::write(&path, png.into_inner()).await?;
    debug!(
        "Archived {}x{} image to {}",
        image.width(),
        image.height(),
        path.display()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uri_list() {
        let text = "copy\nfile:///tmp/a%20b.png\r\nfile:///tmp/c.txt\nhttp://x/y";
        assert_eq!(
            parse_uri_list(text),
            vec![PathBuf::from("/tmp/a b.png"), PathBuf::from("/tmp/c.txt")]
        );
        assert!(parse_uri_list("just some text").is_empty());
    }

    #[test]
    fn test_payload_input() {
        assert_eq!(Payload::File(PathBuf::from("/a/b/shot.png")).input(), "shot.png");
        assert_eq!(Payload::Url("https://x/1".to_string()).input(), "https://x/1");
        assert_eq!(Payload::Url("https://x/1".to_string()).path(), None);
    }

    #[tokio::test]
    async fn test_archive_png() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path(), false);
        let path = archive_png(&storage, &RgbaImage::new(3, 2)).await.unwrap();
        assert_eq!(path.extension().unwrap(), "png");
        assert!(path.starts_with(dir.path().join("archive")));
        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (3, 2));
    }

    #[tokio::test]
    async fn test_archive_text() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path(), true);
        let path = archive_text(&storage, "hello").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
        assert_eq!(path.extension().unwrap(), "txt");
    }
}
