//! Structured identifiers and their backend references.
//!
//! An identifier is the backend's resource path flattened into a single
//! token, e.g. `/pulp/api/v3/repositories/deb/apt/<uuid>/` becomes
//! `repositories-deb-apt-<uuid>`. Both directions are purely textual.

use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{IdError, Result},
    kind::{KindEntry, PackageType, RepoType, ResourceKind},
};

static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<prefix>[a-z_]+(?:-[a-z_]+)*)-(?P<uuid>[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})(?:-versions-(?P<version>\d+))?$",
    )
    .expect("unable to compile identifier regex")
});

/// A decoded structured identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier {
    entry: &'static KindEntry,
    uuid: Uuid,
    version: Option<u64>,
}

impl Identifier {
    /// Creates an identifier for a registered resource kind.
    pub fn new(kind: ResourceKind, uuid: Uuid) -> Result<Self> {
        let entry = kind
            .entry()
            .ok_or_else(|| IdError::invalid(format!("{kind:?}-{uuid}")))?;
        Ok(Self {
            entry,
            uuid,
            version: None,
        })
    }

    /// Identifier of version `number` of this repository.
    pub fn with_version(self, number: u64) -> Result<Self> {
        if !matches!(self.kind(), ResourceKind::Repository(_)) {
            return Err(IdError::invalid(format!("{self}-versions-{number}")));
        }
        Ok(Self {
            version: Some(number),
            ..self
        })
    }

    /// Parses an identifier string.
    ///
    /// ```
    /// use depot_id::{Identifier, RepoType, ResourceKind};
    ///
    /// let id = Identifier::decode("repositories-deb-apt-13104a41-ba7a-4de0-98b3-ae6f5c263558").unwrap();
    /// assert_eq!(id.kind(), ResourceKind::Repository(RepoType::Apt));
    /// assert_eq!(id.category(), "repositories");
    /// assert_eq!(id.subtypes(), &["deb", "apt"]);
    /// ```
    pub fn decode(value: &str) -> Result<Self> {
        let caps = IDENTIFIER_RE
            .captures(value)
            .ok_or_else(|| IdError::invalid(value))?;

        let prefix = &caps["prefix"];
        let mut pieces = prefix.split('-');
        let category = pieces.next().ok_or_else(|| IdError::invalid(value))?;
        let subtypes: Vec<&str> = pieces.collect();

        let entry = ResourceKind::lookup(category, &subtypes)
            .and_then(ResourceKind::entry)
            .ok_or_else(|| IdError::invalid(value))?;
        let uuid = Uuid::parse_str(&caps["uuid"]).map_err(|_| IdError::invalid(value))?;

        let version = match caps.name("version") {
            Some(number) => {
                if !matches!(entry.kind, ResourceKind::Repository(_)) {
                    return Err(IdError::invalid(value));
                }
                Some(
                    number
                        .as_str()
                        .parse::<u64>()
                        .map_err(|_| IdError::invalid(value))?,
                )
            }
            None => None,
        };

        Ok(Self {
            entry,
            uuid,
            version,
        })
    }

    /// Builds an identifier from its parts, validating them against the
    /// kind table.
    pub fn from_parts(category: &str, subtypes: &[&str], uuid: Uuid) -> Result<Self> {
        let kind = ResourceKind::lookup(category, subtypes).ok_or_else(|| {
            let mut value = category.to_string();
            for subtype in subtypes {
                value.push('-');
                value.push_str(subtype);
            }
            IdError::invalid(format!("{value}-{uuid}"))
        })?;
        Self::new(kind, uuid)
    }

    /// Parses a backend reference (full or API-relative resource path).
    ///
    /// ```
    /// use depot_id::Identifier;
    ///
    /// let id = Identifier::from_reference(
    ///     "/pulp/api/v3/content/deb/packages/39a63a9e-2081-4dfe-80eb-2c27af4b6024/",
    ///     "/pulp/api/v3",
    /// )
    /// .unwrap();
    /// assert_eq!(id.to_string(), "content-deb-packages-39a63a9e-2081-4dfe-80eb-2c27af4b6024");
    /// ```
    pub fn from_reference(reference: &str, api_path: &str) -> Result<Self> {
        let relative = reference.strip_prefix(api_path).unwrap_or(reference);
        let flattened = relative
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("-");
        Self::decode(&flattened).map_err(|_| IdError::invalid(reference))
    }

    /// Backend resource path of this identifier.
    pub fn to_reference(&self, api_path: &str) -> String {
        let mut path = format!("{}/{}/", api_path.trim_end_matches('/'), self.category());
        for subtype in self.subtypes() {
            path.push_str(subtype);
            path.push('/');
        }
        path.push_str(&self.uuid.to_string());
        path.push('/');
        if let Some(number) = self.version {
            path.push_str(&format!("versions/{number}/"));
        }
        path
    }

    pub fn kind(&self) -> ResourceKind {
        self.entry.kind
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn version(&self) -> Option<u64> {
        self.version
    }

    pub fn category(&self) -> &'static str {
        self.entry.category
    }

    pub fn subtypes(&self) -> &'static [&'static str] {
        self.entry.subtypes
    }

    /// The repository this identifier belongs to, for repository and
    /// repository version identifiers.
    pub fn repository(&self) -> Option<Identifier> {
        match self.kind() {
            ResourceKind::Repository(_) => {
                Some(Self {
                    version: None,
                    ..*self
                })
            }
            _ => None,
        }
    }

    pub fn repo_type(&self) -> Option<RepoType> {
        self.kind().repo_type()
    }

    pub fn package_type(&self) -> Option<PackageType> {
        match self.kind() {
            ResourceKind::Package(ty) => Some(ty),
            _ => None,
        }
    }

    pub fn is_package(&self) -> bool {
        self.package_type().is_some()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.category())?;
        for subtype in self.subtypes() {
            write!(f, "-{subtype}")?;
        }
        write!(f, "-{}", self.uuid)?;
        if let Some(number) = self.version {
            write!(f, "-versions-{number}")?;
        }
        Ok(())
    }
}

impl FromStr for Identifier {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self> {
        Self::decode(&value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.to_string()
    }
}

/// Decodes an identifier into its category, subtypes and uuid.
pub fn decode(value: &str) -> Result<(&'static str, &'static [&'static str], Uuid)> {
    let id = Identifier::decode(value)?;
    Ok((id.category(), id.subtypes(), id.uuid()))
}

/// Encodes a category, subtypes and uuid into an identifier string.
pub fn encode(category: &str, subtypes: &[&str], uuid: Uuid) -> Result<String> {
    Identifier::from_parts(category, subtypes, uuid).map(|id| id.to_string())
}

/// Converts an identifier string into the backend resource path.
pub fn to_reference(value: &str, api_path: &str) -> Result<String> {
    Identifier::decode(value).map(|id| id.to_reference(api_path))
}
