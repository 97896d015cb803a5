//! Closed tables of repository, package and resource kinds.
//!
//! Every per-type detail (backend plugin names, natural keys, filename
//! fields, path segments) is looked up here instead of branching on type
//! strings at the call sites.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::IdError;

/// Type of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoType {
    Apt,
    /// Maps to the `rpm` plugin in the backend.
    Yum,
    Python,
    File,
}

impl RepoType {
    pub const ALL: [RepoType; 4] = [RepoType::Apt, RepoType::Yum, RepoType::Python, RepoType::File];

    pub fn as_str(self) -> &'static str {
        match self {
            RepoType::Apt => "apt",
            RepoType::Yum => "yum",
            RepoType::Python => "python",
            RepoType::File => "file",
        }
    }

    /// Backend plugin that owns this repository type.
    pub fn plugin(self) -> &'static str {
        match self {
            RepoType::Apt => "deb",
            RepoType::Yum => "rpm",
            RepoType::Python => "python",
            RepoType::File => "file",
        }
    }

    /// Backend name of the repository type within its plugin.
    pub fn backend_type(self) -> &'static str {
        match self {
            RepoType::Apt => "apt",
            RepoType::Yum => "rpm",
            RepoType::Python => "python",
            RepoType::File => "file",
        }
    }

    /// Backend name used for publications and distributions.
    pub fn publication_type(self) -> &'static str {
        match self {
            RepoType::Python => "pypi",
            other => other.backend_type(),
        }
    }

    /// Package types a repository of this type can hold.
    pub fn package_types(self) -> &'static [PackageType] {
        match self {
            RepoType::Apt => &[PackageType::Deb, PackageType::DebSrc],
            RepoType::Yum => &[PackageType::Rpm],
            RepoType::Python => &[PackageType::Python],
            RepoType::File => &[PackageType::File],
        }
    }

    /// The binary package type of this repository.
    pub fn primary_package_type(self) -> PackageType {
        self.package_types()[0]
    }

    /// Whether packages are subdivided into releases and components.
    pub fn has_releases(self) -> bool {
        matches!(self, RepoType::Apt)
    }
}

impl fmt::Display for RepoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepoType {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apt" => Ok(RepoType::Apt),
            "yum" | "rpm" => Ok(RepoType::Yum),
            "python" => Ok(RepoType::Python),
            "file" => Ok(RepoType::File),
            other => Err(IdError::UnknownRepoType(other.to_string())),
        }
    }
}

/// Type of a package content unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    Deb,
    DebSrc,
    Rpm,
    Python,
    File,
}

struct PackageTypeInfo {
    name: &'static str,
    repo_type: RepoType,
    subtype: &'static str,
    natural_key_fields: &'static [&'static str],
    filename_field: &'static str,
}

const PACKAGE_TYPES: [PackageTypeInfo; 5] = [
    PackageTypeInfo {
        name: "deb",
        repo_type: RepoType::Apt,
        subtype: "packages",
        natural_key_fields: &["package", "version", "architecture"],
        filename_field: "relative_path",
    },
    PackageTypeInfo {
        name: "deb_src",
        repo_type: RepoType::Apt,
        subtype: "source_packages",
        natural_key_fields: &["source", "version"],
        filename_field: "relative_path",
    },
    PackageTypeInfo {
        name: "rpm",
        repo_type: RepoType::Yum,
        subtype: "packages",
        natural_key_fields: &["name", "epoch", "version", "release", "arch"],
        filename_field: "location_href",
    },
    PackageTypeInfo {
        name: "python",
        repo_type: RepoType::Python,
        subtype: "packages",
        natural_key_fields: &["name", "filename"],
        filename_field: "filename",
    },
    PackageTypeInfo {
        name: "file",
        repo_type: RepoType::File,
        subtype: "files",
        natural_key_fields: &["relative_path"],
        filename_field: "relative_path",
    },
];

impl PackageType {
    pub const ALL: [PackageType; 5] = [
        PackageType::Deb,
        PackageType::DebSrc,
        PackageType::Rpm,
        PackageType::Python,
        PackageType::File,
    ];

    fn info(self) -> &'static PackageTypeInfo {
        &PACKAGE_TYPES[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        self.info().name
    }

    pub fn repo_type(self) -> RepoType {
        self.info().repo_type
    }

    /// Fields that together identify a package of this type.
    pub fn natural_key_fields(self) -> &'static [&'static str] {
        self.info().natural_key_fields
    }

    /// The field holding the package name; always the first natural key field.
    pub fn name_field(self) -> &'static str {
        self.info().natural_key_fields[0]
    }

    pub fn filename_field(self) -> &'static str {
        self.info().filename_field
    }

    /// Path segments of this package type below the `content` category.
    pub fn subtypes(self) -> [&'static str; 2] {
        [self.repo_type().plugin(), self.info().subtype]
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageType {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PackageType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| IdError::UnknownPackageType(s.to_string()))
    }
}

/// Every resource kind the gateway manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Repository(RepoType),
    Distribution(RepoType),
    Publication(RepoType),
    Remote(RepoType),
    Package(PackageType),
    Release,
    ReleaseComponent,
    ReleaseArchitecture,
    PackageReleaseComponent,
    Task,
    Artifact,
}

/// One row of the identifier pattern table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KindEntry {
    pub kind: ResourceKind,
    pub category: &'static str,
    pub subtypes: &'static [&'static str],
}

macro_rules! entry {
    ($kind:expr, $category:literal $(, $subtype:literal)*) => {
        KindEntry {
            kind: $kind,
            category: $category,
            subtypes: &[$($subtype),*],
        }
    };
}

/// The fixed category/subtype table.
pub const KIND_TABLE: &[KindEntry] = &[
    entry!(ResourceKind::Repository(RepoType::Apt), "repositories", "deb", "apt"),
    entry!(ResourceKind::Repository(RepoType::Yum), "repositories", "rpm", "rpm"),
    entry!(ResourceKind::Repository(RepoType::Python), "repositories", "python", "python"),
    entry!(ResourceKind::Repository(RepoType::File), "repositories", "file", "file"),
    entry!(ResourceKind::Distribution(RepoType::Apt), "distributions", "deb", "apt"),
    entry!(ResourceKind::Distribution(RepoType::Yum), "distributions", "rpm", "rpm"),
    entry!(ResourceKind::Distribution(RepoType::Python), "distributions", "python", "pypi"),
    entry!(ResourceKind::Distribution(RepoType::File), "distributions", "file", "file"),
    entry!(ResourceKind::Publication(RepoType::Apt), "publications", "deb", "apt"),
    entry!(ResourceKind::Publication(RepoType::Yum), "publications", "rpm", "rpm"),
    entry!(ResourceKind::Publication(RepoType::Python), "publications", "python", "pypi"),
    entry!(ResourceKind::Publication(RepoType::File), "publications", "file", "file"),
    entry!(ResourceKind::Remote(RepoType::Apt), "remotes", "deb", "apt"),
    entry!(ResourceKind::Remote(RepoType::Yum), "remotes", "rpm", "rpm"),
    entry!(ResourceKind::Package(PackageType::Deb), "content", "deb", "packages"),
    entry!(ResourceKind::Package(PackageType::DebSrc), "content", "deb", "source_packages"),
    entry!(ResourceKind::Package(PackageType::Rpm), "content", "rpm", "packages"),
    entry!(ResourceKind::Package(PackageType::Python), "content", "python", "packages"),
    entry!(ResourceKind::Package(PackageType::File), "content", "file", "files"),
    entry!(ResourceKind::Release, "content", "deb", "releases"),
    entry!(ResourceKind::ReleaseComponent, "content", "deb", "release_components"),
    entry!(ResourceKind::ReleaseArchitecture, "content", "deb", "release_architectures"),
    entry!(ResourceKind::PackageReleaseComponent, "content", "deb", "package_release_components"),
    entry!(ResourceKind::Task, "tasks"),
    entry!(ResourceKind::Artifact, "artifacts"),
];

impl ResourceKind {
    /// Table row for this kind, if the kind is registered.
    pub fn entry(self) -> Option<&'static KindEntry> {
        KIND_TABLE.iter().find(|entry| entry.kind == self)
    }

    /// Looks up the kind registered for a category and subtype list.
    pub fn lookup(category: &str, subtypes: &[&str]) -> Option<ResourceKind> {
        KIND_TABLE
            .iter()
            .find(|entry| entry.category == category && entry.subtypes == subtypes)
            .map(|entry| entry.kind)
    }

    /// Collection path of this kind, relative to the backend API root.
    ///
    /// ```
    /// use depot_id::{PackageType, ResourceKind};
    ///
    /// let kind = ResourceKind::Package(PackageType::Deb);
    /// assert_eq!(kind.collection_path().as_deref(), Some("/content/deb/packages/"));
    /// ```
    pub fn collection_path(self) -> Option<String> {
        let entry = self.entry()?;
        let mut path = format!("/{}/", entry.category);
        for subtype in entry.subtypes {
            path.push_str(subtype);
            path.push('/');
        }
        Some(path)
    }

    pub fn repo_type(self) -> Option<RepoType> {
        match self {
            ResourceKind::Repository(ty)
            | ResourceKind::Distribution(ty)
            | ResourceKind::Publication(ty)
            | ResourceKind::Remote(ty) => Some(ty),
            ResourceKind::Package(ty) => Some(ty.repo_type()),
            ResourceKind::Release
            | ResourceKind::ReleaseComponent
            | ResourceKind::ReleaseArchitecture
            | ResourceKind::PackageReleaseComponent => Some(RepoType::Apt),
            ResourceKind::Task | ResourceKind::Artifact => None,
        }
    }

    /// Whether identifiers of this kind can be added to or removed from a
    /// repository's content.
    pub fn is_content(self) -> bool {
        self.entry().is_some_and(|entry| entry.category == "content")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_table_rows_are_unique() {
        let mut seen = HashSet::new();
        for entry in KIND_TABLE {
            assert!(seen.insert((entry.category, entry.subtypes)));
        }
    }

    #[test]
    fn test_package_type_table_order() {
        for ty in PackageType::ALL {
            assert_eq!(ty.info().name, ty.as_str());
            assert_eq!(ty.as_str().parse::<PackageType>().unwrap(), ty);
        }
    }

    #[test]
    fn test_natural_keys() {
        assert_eq!(
            PackageType::Rpm.natural_key_fields(),
            &["name", "epoch", "version", "release", "arch"]
        );
        assert_eq!(PackageType::Deb.name_field(), "package");
        assert_eq!(PackageType::DebSrc.name_field(), "source");
        assert_eq!(PackageType::Rpm.filename_field(), "location_href");
    }

    #[test]
    fn test_repo_type_parse() {
        assert_eq!("rpm".parse::<RepoType>().unwrap(), RepoType::Yum);
        assert_eq!("yum".parse::<RepoType>().unwrap(), RepoType::Yum);
        assert!("deb".parse::<RepoType>().is_err());
    }

    #[test]
    fn test_every_package_type_has_a_kind() {
        for ty in PackageType::ALL {
            let entry = ResourceKind::Package(ty).entry().unwrap();
            assert_eq!(entry.subtypes, ty.subtypes());
        }
    }

    #[test]
    fn test_repo_package_types_belong_to_repo() {
        for repo_type in RepoType::ALL {
            for ty in repo_type.package_types() {
                assert_eq!(ty.repo_type(), repo_type);
            }
        }
    }

    #[test]
    fn test_collection_paths() {
        assert_eq!(
            ResourceKind::Repository(RepoType::Yum).collection_path().unwrap(),
            "/repositories/rpm/rpm/"
        );
        assert_eq!(ResourceKind::Task.collection_path().unwrap(), "/tasks/");
        assert!(ResourceKind::Remote(RepoType::File).collection_path().is_none());
    }

    #[test]
    fn test_is_content() {
        assert!(ResourceKind::PackageReleaseComponent.is_content());
        assert!(ResourceKind::Package(PackageType::File).is_content());
        assert!(!ResourceKind::Repository(RepoType::Apt).is_content());
        assert!(!ResourceKind::Task.is_content());
    }
}
