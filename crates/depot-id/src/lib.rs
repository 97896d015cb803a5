//! Structured identifiers for depot.
//!
//! Clients never see backend resource paths. Every resource is addressed by
//! an opaque identifier of the form `<category>-<subtype...>-<uuid>` that
//! can be decoded, and turned back into a backend path, without any remote
//! call.
//!
//! # Example
//!
//! ```
//! use depot_id::{Identifier, PackageType};
//!
//! let id: Identifier = "content-rpm-packages-21b4d540-76ef-420c-af0a-78c92b67eca0"
//!     .parse()
//!     .unwrap();
//! assert_eq!(id.package_type(), Some(PackageType::Rpm));
//! assert_eq!(
//!     id.to_reference("/pulp/api/v3"),
//!     "/pulp/api/v3/content/rpm/packages/21b4d540-76ef-420c-af0a-78c92b67eca0/"
//! );
//! ```

pub mod error;
pub mod identifier;
pub mod kind;

pub use error::{IdError, Result};
pub use identifier::{decode, encode, to_reference, Identifier};
pub use kind::{KindEntry, PackageType, RepoType, ResourceKind, KIND_TABLE};
pub use uuid::Uuid;
