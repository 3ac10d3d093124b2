//! Foreign-key display names.
//!
//! List rows carry ids such as `academyId`; the columns show names. A
//! [`ReferenceResolver`] fetches each missing name once, caches it for the
//! life of the resolver and never asks for an id that is already on its way.

use async_trait::async_trait;
use futures::future::join_all;
use registrar_core::RecordId;
use registrar_transport::{Transport, TransportError};
use serde_json::Value as JsonValue;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

use crate::resource::Resource;

/// Looks up the display name of one record.
#[async_trait]
pub trait ReferenceLookup: Send + Sync {
    async fn lookup(&self, id: RecordId) -> Result<String, TransportError>;
}

/// Reads the name field of `GET {path}/{id}`.
pub struct RestReferenceLookup {
    transport: Transport,
    path: String,
    name_field: String,
}

impl RestReferenceLookup {
    #[must_use]
    pub fn new(transport: Transport, path: impl Into<String>, name_field: impl Into<String>) -> Self {
        Self {
            transport,
            path: path.into().trim_end_matches('/').to_string(),
            name_field: name_field.into(),
        }
    }

    /// Looks up names of a catalogued resource.
    #[must_use]
    pub fn for_resource(transport: Transport, resource: Resource) -> Self {
        Self::new(transport, resource.path(), resource.name_field())
    }
}

impl fmt::Debug for RestReferenceLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestReferenceLookup")
            .field("path", &self.path)
            .field("name_field", &self.name_field)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ReferenceLookup for RestReferenceLookup {
    async fn lookup(&self, id: RecordId) -> Result<String, TransportError> {
        let record: JsonValue = self
            .transport
            .get(&format!("{}/{id}", self.path), &[])
            .await?
            .data()?;

        match record.get(&self.name_field) {
            Some(JsonValue::String(name)) => Ok(name.clone()),
            Some(JsonValue::Null) | None => Err(TransportError::Decode {
                reason: format!("record {id} has no '{}'", self.name_field),
            }),
            Some(other) => Ok(other.to_string()),
        }
    }
}

#[derive(Debug, Default)]
struct Entries {
    names: HashMap<RecordId, String>,
    in_flight: HashSet<RecordId>,
}

/// Ids one `resolve` call is fetching. Dropping the claim takes them out of
/// the in-flight set, also when the call is cancelled part way.
struct Claim<'a> {
    resolver: &'a ReferenceResolver,
    ids: Vec<RecordId>,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        let mut entries = self.resolver.entries();
        for id in &self.ids {
            entries.in_flight.remove(id);
        }
    }
}

/// Caching, deduplicating id-to-name resolver.
pub struct ReferenceResolver {
    lookup: Arc<dyn ReferenceLookup>,
    entries: Mutex<Entries>,
}

impl fmt::Debug for ReferenceResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries();
        f.debug_struct("ReferenceResolver")
            .field("cached", &entries.names.len())
            .field("in_flight", &entries.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl ReferenceResolver {
    #[must_use]
    pub fn new(lookup: Arc<dyn ReferenceLookup>) -> Self {
        Self {
            lookup,
            entries: Mutex::new(Entries::default()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached name for `id`.
    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<String> {
        self.entries().names.get(&id).cloned()
    }

    /// Returns the cached name for `id`, or the id itself until it resolves.
    #[must_use]
    pub fn display(&self, id: RecordId) -> String {
        self.get(id).unwrap_or_else(|| id.to_string())
    }

    /// Number of cached names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetches every id that is neither cached nor in flight, concurrently.
    ///
    /// A failed lookup leaves its id unresolved and does not affect the
    /// others. Returns how many names were added.
    #[instrument(skip(self, ids))]
    pub async fn resolve<I>(&self, ids: I) -> usize
    where
        I: IntoIterator<Item = RecordId> + Send,
    {
        let claim = {
            let requested: BTreeSet<RecordId> = ids.into_iter().collect();
            let mut entries = self.entries();
            let missing: Vec<RecordId> = requested
                .into_iter()
                .filter(|id| !entries.names.contains_key(id) && !entries.in_flight.contains(id))
                .collect();
            entries.in_flight.extend(missing.iter().copied());
            Claim {
                resolver: self,
                ids: missing,
            }
        };

        if claim.ids.is_empty() {
            return 0;
        }
        debug!(count = claim.ids.len(), "resolving references");

        let results = join_all(claim.ids.iter().map(|&id| async move {
            (id, self.lookup.lookup(id).await)
        }))
        .await;

        let mut entries = self.entries();
        let mut added = 0;
        for (id, result) in results {
            match result {
                Ok(name) => {
                    entries.names.insert(id, name);
                    added += 1;
                }
                Err(error) => debug!(%id, %error, "reference lookup failed"),
            }
        }
        drop(entries);
        added
    }

    /// Starts resolution in the background.
    pub fn spawn_resolve(self: &Arc<Self>, ids: Vec<RecordId>) -> JoinHandle<usize> {
        let resolver = Arc::clone(self);
        tokio::spawn(async move { resolver.resolve(ids).await })
    }
}
