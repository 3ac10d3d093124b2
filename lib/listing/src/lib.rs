//! List screens of the registrar console.
//!
//! A [`ListController`] pages, sorts and searches one collection through a
//! [`ListSource`], discarding responses that a newer request has overtaken.
//! Foreign-key columns are filled in by a [`ReferenceResolver`] owned by the
//! controller, which keeps resolved names across reloads.
//!
//! # Example
//!
//! ```no_run
//! use registrar_listing::{
//!     ListController, ListQuery, Resource, RestListSource, RestReferenceLookup,
//! };
//! use registrar_core::RecordId;
//! use registrar_transport::Transport;
//! use std::sync::Arc;
//!
//! # async fn example(transport: Transport) {
//! let academies = RestReferenceLookup::for_resource(transport.clone(), Resource::Academies);
//! let source = RestListSource::<serde_json::Value>::for_resource(transport, Resource::Majors);
//! let controller = ListController::new(Arc::new(source), ListQuery::new("majorName"))
//!     .with_reference(Arc::new(academies), |row: &serde_json::Value| {
//!         row.get("academyId")?.as_i64().map(RecordId::new)
//!     });
//!
//! if let Ok(page) = controller.refresh().await {
//!     println!("{} majors on page {}", page.content.len(), page.page_index);
//!     if let Some(names) = controller.reference(0) {
//!         println!("academy 1 is {}", names.display(RecordId::new(1)));
//!     }
//! }
//! # }
//! ```

pub mod controller;
pub mod error;
pub mod page;
pub mod query;
pub mod resolver;
pub mod resource;
pub mod source;

pub use controller::{ListController, ListState};
pub use error::ListError;
pub use page::Page;
pub use query::{ListQuery, PaginationStrategy, SortDirection};
pub use resolver::{ReferenceLookup, ReferenceResolver, RestReferenceLookup};
pub use resource::{ForeignKey, Resource, UnknownResource};
pub use source::{ListSource, RestListSource};
