use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use reqwest::blocking::Client as HttpClient;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifier::DatasetIdentifier;
use crate::util::guess_filename_from_url;

const EXPORT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// An exported snapshot of a dataset.
///
/// A release the server is still building has no download URL and no
/// metadata; [`Release::available`] tells the two apart.
#[derive(Debug, Clone, PartialEq)]
pub struct Release {
    dataset_slug: String,
    team_slug: String,
    version: String,
    url: Option<String>,
    export_date: DateTime<FixedOffset>,
    image_count: Option<u64>,
    class_count: Option<usize>,
    available: bool,
    latest: bool,
}

#[derive(Debug, serde::Deserialize)]
struct ReleasePayload {
    inserted_at: String,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    version: Option<Value>,
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    metadata: Option<ReleaseMetadata>,
    #[serde(default)]
    latest: bool,
}

#[derive(Debug, serde::Deserialize)]
struct ReleaseMetadata {
    num_images: u64,
    #[serde(default)]
    annotation_classes: Vec<Value>,
}

impl Release {
    /// Builds a release from one entry of the exports listing.
    ///
    /// Unavailable releases take their label from `version`, available
    /// ones from `name`.
    pub fn parse(dataset_slug: &str, team_slug: &str, payload: &Value) -> Result<Self> {
        let payload: ReleasePayload = serde_json::from_value(payload.clone())?;
        let export_date = parse_export_date(&payload.inserted_at)?;

        let Some(url) = payload.download_url else {
            let version = payload
                .version
                .as_ref()
                .and_then(label)
                .ok_or_else(|| missing_field("version"))?;
            return Ok(Self {
                dataset_slug: dataset_slug.to_string(),
                team_slug: team_slug.to_string(),
                version,
                url: None,
                export_date,
                image_count: None,
                class_count: None,
                available: false,
                latest: false,
            });
        };

        let version = payload
            .name
            .as_ref()
            .and_then(label)
            .ok_or_else(|| missing_field("name"))?;
        let metadata = payload.metadata.ok_or_else(|| missing_field("metadata"))?;

        Ok(Self {
            dataset_slug: dataset_slug.to_string(),
            team_slug: team_slug.to_string(),
            version,
            url: Some(url),
            export_date,
            image_count: Some(metadata.num_images),
            class_count: Some(metadata.annotation_classes.len()),
            available: true,
            latest: payload.latest,
        })
    }

    pub fn dataset_slug(&self) -> &str {
        &self.dataset_slug
    }

    pub fn team_slug(&self) -> &str {
        &self.team_slug
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn export_date(&self) -> DateTime<FixedOffset> {
        self.export_date
    }

    pub fn image_count(&self) -> Option<u64> {
        self.image_count
    }

    pub fn class_count(&self) -> Option<usize> {
        self.class_count
    }

    pub fn available(&self) -> bool {
        self.available
    }

    pub fn latest(&self) -> bool {
        self.latest
    }

    /// `team/dataset:version`
    pub fn identifier(&self) -> DatasetIdentifier {
        DatasetIdentifier::new(
            Some(&self.team_slug),
            &self.dataset_slug,
            Some(&self.version),
        )
    }

    /// Streams the release archive to `path` and returns the written path.
    ///
    /// The URL is pre-signed, so the request carries no credentials and the
    /// status code is not inspected.
    pub fn download_zip(&self, path: &Path) -> Result<PathBuf> {
        self.download_zip_with_progress(path, false)
    }

    pub fn download_zip_with_progress(&self, path: &Path, progress: bool) -> Result<PathBuf> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| Error::ReleaseUnavailable(self.identifier().to_string()))?;

        let target = if path.as_os_str().is_empty() {
            guess_filename_from_url(url)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(format!("{}.zip", self.version)))
        } else {
            path.to_path_buf()
        };

        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Archives can be large; no total timeout.
        let http = HttpClient::builder().timeout(None::<Duration>).build()?;
        debug!("GET {} -> {}", url, target.display());
        let mut resp = http.get(url).send()?;

        let pb = if progress {
            resp.content_length().map(|len| {
                let pb = ProgressBar::new(len);
                if let Ok(style) = ProgressStyle::with_template(
                    "{spinner:.green} {bytes}/{total_bytes} ({bytes_per_sec}) {wide_bar} {eta}",
                ) {
                    pb.set_style(style.progress_chars("=>-"));
                }
                pb
            })
        } else {
            None
        };

        let mut out = File::create(&target)?;
        let mut written: u64 = 0;
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = resp.read(&mut buf)?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n])?;
            written += n as u64;
            if let Some(pb) = &pb {
                pb.inc(n as u64);
            }
        }
        out.flush()?;

        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }
        info!(
            "downloaded release {} ({} bytes) to {}",
            self.identifier(),
            written,
            target.display()
        );
        Ok(target)
    }
}

fn parse_export_date(s: &str) -> Result<DateTime<FixedOffset>> {
    let normalized = match s.strip_suffix('Z') {
        Some(rest) => format!("{rest}+0000"),
        None => s.to_string(),
    };
    Ok(DateTime::parse_from_str(&normalized, EXPORT_DATE_FORMAT)?)
}

fn label(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn missing_field(field: &str) -> Error {
    Error::UnexpectedResponse(format!("release payload without `{field}`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    #[test]
    fn pending_release_has_no_metadata() {
        let payload = json!({
            "inserted_at": "2020-03-10T12:30:00+0000",
            "download_url": null,
            "version": "1.0",
            "name": "ignored",
            "latest": true,
        });
        let release = Release::parse("cats", "acme", &payload).unwrap();

        assert!(!release.available());
        assert_eq!(release.version(), "1.0");
        assert_eq!(release.url(), None);
        assert_eq!(release.image_count(), None);
        assert_eq!(release.class_count(), None);
        assert!(!release.latest());
    }

    #[test]
    fn available_release_reads_name_and_metadata() {
        let payload = json!({
            "inserted_at": "2020-03-10T12:30:00+0100",
            "download_url": "http://x",
            "version": 7,
            "name": "v2",
            "latest": true,
            "metadata": {"num_images": 10, "annotation_classes": ["a", "b", "c"]},
        });
        let release = Release::parse("cats", "acme", &payload).unwrap();

        assert!(release.available());
        assert_eq!(release.version(), "v2");
        assert_eq!(release.url(), Some("http://x"));
        assert_eq!(release.image_count(), Some(10));
        assert_eq!(release.class_count(), Some(3));
        assert!(release.latest());

        let date = release.export_date();
        assert_eq!((date.year(), date.month(), date.day()), (2020, 3, 10));
        assert_eq!(date.hour(), 12);
        assert_eq!(date.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn numeric_version_is_rendered_as_text() {
        let payload = json!({
            "inserted_at": "2021-01-01T00:00:00Z",
            "download_url": null,
            "version": 3,
        });
        let release = Release::parse("cats", "acme", &payload).unwrap();
        assert_eq!(release.version(), "3");
    }

    #[test]
    fn bad_timestamp_is_an_error() {
        let payload = json!({
            "inserted_at": "10/03/2020",
            "download_url": null,
            "version": "1.0",
        });
        assert!(matches!(
            Release::parse("cats", "acme", &payload),
            Err(Error::Timestamp(_))
        ));
    }

    #[test]
    fn available_release_without_metadata_is_rejected() {
        let payload = json!({
            "inserted_at": "2020-03-10T12:30:00+0000",
            "download_url": "http://x",
            "name": "v2",
        });
        assert!(matches!(
            Release::parse("cats", "acme", &payload),
            Err(Error::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn identifier_is_team_dataset_version() {
        let payload = json!({
            "inserted_at": "2020-03-10T12:30:00+0000",
            "download_url": "http://x",
            "name": "v2",
            "metadata": {"num_images": 1, "annotation_classes": []},
        });
        let release = Release::parse("cats", "acme", &payload).unwrap();
        assert_eq!(release.identifier().to_string(), "acme/cats:v2");
    }

    #[test]
    fn downloading_a_pending_release_fails() {
        let payload = json!({
            "inserted_at": "2020-03-10T12:30:00+0000",
            "download_url": null,
            "version": "1.0",
        });
        let release = Release::parse("cats", "acme", &payload).unwrap();
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            release.download_zip(&dir.path().join("out.zip")),
            Err(Error::ReleaseUnavailable(id)) if id == "acme/cats:1.0"
        ));
    }
}
