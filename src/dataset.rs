use std::path::PathBuf;

use serde_json::Value;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::identifier::DatasetIdentifier;
use crate::release::Release;
use crate::util::urljoin;

/// Dataset summary as returned by `GET /datasets/` and `POST /datasets`.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct DatasetSummary {
    id: u64,
    name: String,
    slug: String,
    num_images: u64,
    progress: f64,
}

/// A dataset that lives on the server.
///
/// Borrows the [`Client`] it was listed or created with, which is used for
/// every follow-up request.
#[derive(Debug, Clone)]
pub struct RemoteDataset<'a> {
    pub name: String,
    pub slug: String,
    pub team: String,
    pub dataset_id: u64,
    pub image_count: u64,
    /// Fraction of annotated images, `0.0..=1.0`.
    pub progress: f64,
    client: &'a Client,
}

impl<'a> RemoteDataset<'a> {
    pub(crate) fn new(client: &'a Client, team: &str, summary: DatasetSummary) -> Self {
        Self {
            name: summary.name,
            slug: summary.slug,
            team: team.to_string(),
            dataset_id: summary.id,
            image_count: summary.num_images,
            progress: summary.progress,
            client,
        }
    }

    pub fn client(&self) -> &'a Client {
        self.client
    }

    /// `team/slug`
    pub fn identifier(&self) -> DatasetIdentifier {
        DatasetIdentifier::new(Some(&self.team), &self.slug, None)
    }

    /// Where this dataset is pulled to: `<datasets_dir>/<team>/<slug>`.
    pub fn local_path(&self) -> Result<PathBuf> {
        Ok(self
            .client
            .get_datasets_dir(Some(&self.team))?
            .join(&self.team)
            .join(&self.slug))
    }

    pub fn remote_path(&self) -> String {
        urljoin(
            self.client.base_url(),
            &format!("/datasets/{}", self.dataset_id),
        )
    }

    /// Available releases, highest version first.
    pub fn get_releases(&self) -> Result<Vec<Release>> {
        let payload = self.client.get(
            &format!("/datasets/{}/exports", self.dataset_id),
            Some(&self.team),
        )?;
        let entries = payload.as_array().ok_or_else(|| {
            Error::UnexpectedResponse(format!(
                "exports of {} are not a list: {}",
                self.identifier(),
                payload
            ))
        })?;

        let mut releases = entries
            .iter()
            .map(|entry| Release::parse(&self.slug, &self.team, entry))
            .collect::<Result<Vec<_>>>()?;
        releases.retain(Release::available);
        releases.sort_by(|a, b| b.version().cmp(a.version()));
        Ok(releases)
    }

    /// Picks a release by version, or the one flagged latest for `"latest"`.
    pub fn get_release(&self, name: &str) -> Result<Release> {
        let releases = self.get_releases()?;
        if releases.is_empty() {
            return Err(Error::NotFound(self.identifier().to_string()));
        }

        let found = if name == "latest" {
            releases.into_iter().find(Release::latest)
        } else {
            releases.into_iter().find(|r| r.version() == name)
        };
        found.ok_or_else(|| Error::NotFound(format!("{}:{}", self.identifier(), name)))
    }
}

impl DatasetSummary {
    pub(crate) fn from_payload(payload: Value) -> Result<Self> {
        Ok(serde_json::from_value(payload)?)
    }
}
