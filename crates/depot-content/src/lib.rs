//! Package lookup and content reconciliation.
//!
//! [`ContentManager`] turns "add these packages, remove those" into the
//! content sets one repository modify call needs, keeping apt release
//! links consistent. [`PackageLookup`] finds the packages to act on, and
//! [`PackageUploader`] creates new ones from URLs.

pub mod error;
pub mod logging;
pub mod lookup;
pub mod reconcile;
pub mod upload;

pub use error::{ContentError, Result};
pub use lookup::{PackageLookup, PackageQuery, INDIVIDUAL_LOOKUP_LIMIT};
pub use reconcile::{ContentGraph, ContentManager, ContentPlan, GatewayGraph};
pub use upload::{FailedUpload, PackageUploader, UploadReport, UploadedPackage, UPLOAD_WORKERS};
