use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A dataset reference of the form `team/slug:version`, where the team and
/// the version are optional (`slug`, `team/slug`, `slug:version`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetIdentifier {
    pub team_slug: Option<String>,
    pub dataset_slug: String,
    pub version: Option<String>,
}

impl DatasetIdentifier {
    pub fn new(
        team_slug: Option<&str>,
        dataset_slug: &str,
        version: Option<&str>,
    ) -> Self {
        Self {
            team_slug: team_slug.map(str::to_string),
            dataset_slug: dataset_slug.to_string(),
            version: version.map(str::to_string),
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidIdentifier(s.to_string());

        let (team, rest) = match s.split_once('/') {
            Some((team, rest)) => (Some(team), rest),
            None => (None, s),
        };
        let (slug, version) = match rest.split_once(':') {
            Some((slug, version)) => (slug, Some(version)),
            None => (rest, None),
        };

        if slug.is_empty() || slug.contains('/') || slug.contains(':') {
            return Err(invalid());
        }
        if team.is_some_and(str::is_empty) || version.is_some_and(str::is_empty) {
            return Err(invalid());
        }
        if version.is_some_and(|v| v.contains(':')) {
            return Err(invalid());
        }

        Ok(Self::new(team, slug, version))
    }

    /// Fills in the team when the identifier does not name one.
    pub fn with_default_team(mut self, team: Option<&str>) -> Self {
        if self.team_slug.is_none() {
            self.team_slug = team.map(str::to_string);
        }
        self
    }
}

impl FromStr for DatasetIdentifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for DatasetIdentifier {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DatasetIdentifier {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

/// Anything that names a dataset: a raw `team/slug:version` string or an
/// already parsed identifier.
pub trait IntoDatasetIdentifier {
    fn into_identifier(self) -> Result<DatasetIdentifier>;
}

impl IntoDatasetIdentifier for DatasetIdentifier {
    fn into_identifier(self) -> Result<DatasetIdentifier> {
        Ok(self)
    }
}

impl IntoDatasetIdentifier for &DatasetIdentifier {
    fn into_identifier(self) -> Result<DatasetIdentifier> {
        Ok(self.clone())
    }
}

impl IntoDatasetIdentifier for &str {
    fn into_identifier(self) -> Result<DatasetIdentifier> {
        DatasetIdentifier::parse(self)
    }
}

impl IntoDatasetIdentifier for String {
    fn into_identifier(self) -> Result<DatasetIdentifier> {
        DatasetIdentifier::parse(&self)
    }
}

impl fmt::Display for DatasetIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(team) = &self.team_slug {
            write!(f, "{team}/")?;
        }
        f.write_str(&self.dataset_slug)?;
        if let Some(version) = &self.version {
            write!(f, ":{version}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_forms() {
        let full = DatasetIdentifier::parse("acme/cats:v2").unwrap();
        assert_eq!(full, DatasetIdentifier::new(Some("acme"), "cats", Some("v2")));

        let no_version = DatasetIdentifier::parse("acme/cats").unwrap();
        assert_eq!(no_version, DatasetIdentifier::new(Some("acme"), "cats", None));

        let bare = DatasetIdentifier::parse("cats").unwrap();
        assert_eq!(bare, DatasetIdentifier::new(None, "cats", None));

        let versioned: DatasetIdentifier = "cats:1.0".parse().unwrap();
        assert_eq!(versioned, DatasetIdentifier::new(None, "cats", Some("1.0")));
    }

    #[test]
    fn rejects_malformed_identifiers() {
        for bad in ["", "/cats", "acme/", "acme/cats:", "a/b/c", "cats:v1:v2", ":v1"] {
            assert!(
                matches!(DatasetIdentifier::parse(bad), Err(Error::InvalidIdentifier(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn default_team_only_fills_missing_team() {
        let filled = DatasetIdentifier::parse("cats")
            .unwrap()
            .with_default_team(Some("acme"));
        assert_eq!(filled.team_slug.as_deref(), Some("acme"));

        let kept = DatasetIdentifier::parse("zoo/cats")
            .unwrap()
            .with_default_team(Some("acme"));
        assert_eq!(kept.team_slug.as_deref(), Some("zoo"));
    }

    #[test]
    fn display_round_trips_the_canonical_form() {
        for s in ["acme/cats:v2", "acme/cats", "cats"] {
            assert_eq!(DatasetIdentifier::parse(s).unwrap().to_string(), s);
        }
    }
}
