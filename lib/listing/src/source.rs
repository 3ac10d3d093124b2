//! Where list pages come from.

use async_trait::async_trait;
use registrar_transport::{Transport, TransportError};
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use tracing::instrument;

use crate::page::Page;
use crate::query::ListQuery;
use crate::resource::Resource;

/// Fetches list data for one collection.
#[async_trait]
pub trait ListSource<T>: Send + Sync {
    /// Fetches one server-paged, server-sorted page.
    async fn fetch_page(&self, query: &ListQuery) -> Result<Page<T>, TransportError>;

    /// Fetches every record matching `keyword`, unpaged.
    async fn search(&self, keyword: &str) -> Result<Vec<T>, TransportError>;
}

/// A [`ListSource`] backed by the REST listing and search endpoints.
pub struct RestListSource<T> {
    transport: Transport,
    path: String,
    _rows: PhantomData<fn() -> T>,
}

impl<T> RestListSource<T> {
    /// Lists the collection at `path`, e.g. `/students`.
    #[must_use]
    pub fn new(transport: Transport, path: impl Into<String>) -> Self {
        Self {
            transport,
            path: path.into().trim_end_matches('/').to_string(),
            _rows: PhantomData,
        }
    }

    /// Lists a catalogued resource.
    #[must_use]
    pub fn for_resource(transport: Transport, resource: Resource) -> Self {
        Self::new(transport, resource.path())
    }

    fn search_path(&self) -> String {
        format!("{}/search", self.path)
    }
}

impl<T> fmt::Debug for RestListSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestListSource")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T> ListSource<T> for RestListSource<T>
where
    T: DeserializeOwned + Send + 'static,
{
    #[instrument(skip(self, query), fields(path = %self.path, page = query.page_index()))]
    async fn fetch_page(&self, query: &ListQuery) -> Result<Page<T>, TransportError> {
        self.transport
            .get(&self.path, &query.listing_params())
            .await?
            .data()
    }

    #[instrument(skip(self), fields(path = %self.path))]
    async fn search(&self, keyword: &str) -> Result<Vec<T>, TransportError> {
        self.transport
            .get(&self.search_path(), &[("keyword", keyword.to_string())])
            .await?
            .data()
    }
}
