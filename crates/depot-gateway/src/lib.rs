//! Typed gateway to the content store.
//!
//! Every call goes through a [`Session`], which owns the HTTP transport,
//! credentials and correlation id for one unit of work. Responses are
//! translated at this boundary: backend references become structured
//! identifiers, so callers never handle backend paths.
//!
//! ```no_run
//! use depot_config::Config;
//! use depot_gateway::{RepositoryApi, Session, TaskPoller};
//! use depot_id::Identifier;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::new()?;
//! let session = Session::new(&config);
//! let repo: Identifier = "repositories-rpm-rpm-11712ac6-ae6d-43b0-9494-1930337425b4".parse()?;
//!
//! let task = RepositoryApi::new(&session).publish(&repo)?;
//! TaskPoller::new(&session).wait(&task)?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod package;
pub mod pages;
pub mod release;
pub mod repository;
pub mod session;
pub mod task;
pub mod translate;
pub mod transport;

pub use api::{Endpoint, Filters, ListPage, Outcome, Pagination, ResourceApi, TaskRef};
pub use error::{GatewayError, Result};
pub use package::PackageApi;
pub use pages::Pages;
pub use release::{
    NewRelease, PackageReleaseComponentApi, ReleaseApi, ReleaseArchitectureApi,
    ReleaseComponentApi, ReleaseFilter,
};
pub use repository::RepositoryApi;
pub use session::Session;
pub use task::{TaskApi, TaskPoller, TaskState};
pub use transport::{ApiRequest, ApiResponse, Method, Transport, UreqTransport};
