//! The list controller.
//!
//! Every list screen owns one [`ListController`]. A load is tagged with a
//! sequence number when it is issued; only the response to the most recent
//! load may touch the observable [`ListState`]. Older responses are dropped
//! whatever order they arrive in.

use futures::future::join_all;
use registrar_core::RecordId;
use registrar_transport::TransportError;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, instrument};

use crate::error::ListError;
use crate::page::Page;
use crate::query::{ListQuery, PaginationStrategy};
use crate::resolver::{ReferenceLookup, ReferenceResolver};
use crate::source::ListSource;

/// What a list screen renders.
#[derive(Debug, Clone, PartialEq)]
pub struct ListState<T> {
    /// The most recently issued query.
    pub query: ListQuery,
    /// The last page that loaded successfully.
    pub page: Page<T>,
    /// True while the latest load is outstanding.
    pub loading: bool,
    /// Failure of the latest load, cleared by the next success.
    pub error: Option<TransportError>,
    /// Sequence number of the latest load.
    pub sequence: u64,
}

impl<T> ListState<T> {
    fn new(query: ListQuery) -> Self {
        Self {
            query,
            page: Page::empty(),
            loading: false,
            error: None,
            sequence: 0,
        }
    }
}

type KeyFn<T> = dyn Fn(&T) -> Option<RecordId> + Send + Sync;

struct ReferenceColumn<T> {
    resolver: ReferenceResolver,
    key: Box<KeyFn<T>>,
}

/// Loads pages for one list screen.
pub struct ListController<T> {
    source: Arc<dyn ListSource<T>>,
    state: watch::Sender<ListState<T>>,
    references: Vec<ReferenceColumn<T>>,
}

impl<T> fmt::Debug for ListController<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ListController")
            .field("query", &state.query)
            .field("sequence", &state.sequence)
            .field("loading", &state.loading)
            .field("references", &self.references.len())
            .finish_non_exhaustive()
    }
}

impl<T> ListController<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates an idle controller; nothing is fetched until [`load`](Self::load).
    #[must_use]
    pub fn new(source: Arc<dyn ListSource<T>>, initial: ListQuery) -> Self {
        let (state, _) = watch::channel(ListState::new(initial));
        Self {
            source,
            state,
            references: Vec::new(),
        }
    }

    /// Adds a foreign-key column. After every successful load the ids
    /// `key` extracts from the page are resolved through `lookup`.
    ///
    /// Each column gets its own [`ReferenceResolver`], so resolved names live
    /// exactly as long as this controller.
    #[must_use]
    pub fn with_reference<F>(mut self, lookup: Arc<dyn ReferenceLookup>, key: F) -> Self
    where
        F: Fn(&T) -> Option<RecordId> + Send + Sync + 'static,
    {
        self.references.push(ReferenceColumn {
            resolver: ReferenceResolver::new(lookup),
            key: Box::new(key),
        });
        self
    }

    /// Returns the resolver of the `index`-th column added with
    /// [`with_reference`](Self::with_reference).
    #[must_use]
    pub fn reference(&self, index: usize) -> Option<&ReferenceResolver> {
        self.references.get(index).map(|column| &column.resolver)
    }

    /// Returns a snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> ListState<T> {
        self.state.borrow().clone()
    }

    /// Returns the most recently issued query.
    #[must_use]
    pub fn query(&self) -> ListQuery {
        self.state.borrow().query.clone()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ListState<T>> {
        self.state.subscribe()
    }

    /// Issues `query` and, if it is still the latest load when the response
    /// arrives, publishes the page.
    ///
    /// A response reporting a page past the end of a non-empty result set
    /// is re-issued once for the last page.
    #[instrument(skip(self, query), fields(page = query.page_index(), keyword = query.keyword()))]
    pub async fn load(&self, query: ListQuery) -> Result<Page<T>, ListError> {
        let mut sequence = 0;
        self.state.send_modify(|state| {
            state.sequence += 1;
            sequence = state.sequence;
            state.query = query.clone();
            state.loading = true;
        });
        debug!(sequence, "issued list load");

        let fetched = self.fetch(&query).await;
        let outcome = match fetched {
            Ok(page) if page.is_past_end() && self.is_current(sequence) => {
                let clamped = query.clamped_to(page.total_pages);
                debug!(
                    sequence,
                    requested = page.page_index,
                    total_pages = page.total_pages,
                    "page past end, re-issuing for last page"
                );
                self.fetch(&clamped).await.map(|page| (clamped, page))
            }
            Ok(mut page) if page.total_pages == 0 && page.page_index > 0 => {
                page.page_index = 0;
                Ok((query.with_page(0), page))
            }
            Ok(page) => Ok((query, page)),
            Err(error) => Err(error),
        };

        if !self.is_current(sequence) {
            debug!(sequence, "discarding stale list response");
            return Err(ListError::Superseded { sequence });
        }

        let (query, page) = match outcome {
            Ok(loaded) => loaded,
            Err(error) => {
                debug!(sequence, %error, "list load failed");
                let stored = self.state.send_if_modified(|state| {
                    if state.sequence != sequence {
                        return false;
                    }
                    state.loading = false;
                    state.error = Some(error.clone());
                    true
                });
                return Err(if stored {
                    ListError::Transport(error)
                } else {
                    ListError::Superseded { sequence }
                });
            }
        };

        self.resolve_references(&page.content).await;

        let published = page.clone();
        let stored = self.state.send_if_modified(|state| {
            if state.sequence != sequence {
                return false;
            }
            state.query = query;
            state.page = published;
            state.loading = false;
            state.error = None;
            true
        });
        if stored {
            Ok(page)
        } else {
            debug!(sequence, "discarding stale list response");
            Err(ListError::Superseded { sequence })
        }
    }

    /// Re-issues the current query.
    pub async fn refresh(&self) -> Result<Page<T>, ListError> {
        self.load(self.query()).await
    }

    pub async fn next_page(&self) -> Result<Page<T>, ListError> {
        self.load(self.query().next_page()).await
    }

    pub async fn previous_page(&self) -> Result<Page<T>, ListError> {
        self.load(self.query().previous_page()).await
    }

    pub async fn go_to_page(&self, page_index: usize) -> Result<Page<T>, ListError> {
        self.load(self.query().with_page(page_index)).await
    }

    /// Column-header click.
    pub async fn sort_by(&self, field: &str) -> Result<Page<T>, ListError> {
        self.load(self.query().toggle_sort(field)).await
    }

    /// Search submit. A blank keyword returns to the plain listing.
    pub async fn search(&self, keyword: &str) -> Result<Page<T>, ListError> {
        self.load(self.query().with_keyword(keyword)).await
    }

    fn is_current(&self, sequence: u64) -> bool {
        self.state.borrow().sequence == sequence
    }

    async fn fetch(&self, query: &ListQuery) -> Result<Page<T>, TransportError> {
        match query.strategy() {
            PaginationStrategy::ServerPaged => self.source.fetch_page(query).await,
            PaginationStrategy::ClientSlicedFromFullMatch => {
                let keyword = query.keyword().unwrap_or_default();
                let matches = self.source.search(keyword).await?;
                Ok(Page::client_sliced(
                    matches,
                    query.page_index(),
                    query.page_size(),
                ))
            }
        }
    }

    async fn resolve_references(&self, rows: &[T]) {
        join_all(self.references.iter().map(|column| {
            let ids: Vec<RecordId> = rows.iter().filter_map(|row| (column.key)(row)).collect();
            column.resolver.resolve(ids)
        }))
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    #[derive(Debug, Clone, PartialEq)]
    struct Student {
        id: i64,
        name: String,
        academy_id: Option<i64>,
    }

    fn students(count: i64) -> Vec<Student> {
        (1..=count)
            .map(|id| Student {
                id,
                name: format!("student {id}"),
                academy_id: Some(id % 3),
            })
            .collect()
    }

    #[derive(Default)]
    struct MemorySource {
        rows: Mutex<Vec<Student>>,
        pages: Mutex<Vec<usize>>,
        searches: Mutex<Vec<String>>,
        fail_next: Mutex<Option<TransportError>>,
    }

    impl MemorySource {
        fn with_rows(rows: Vec<Student>) -> Arc<Self> {
            Arc::new(Self {
                rows: Mutex::new(rows),
                ..Self::default()
            })
        }

        fn take_failure(&self) -> Result<(), TransportError> {
            match self.fail_next.lock().unwrap().take() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl ListSource<Student> for MemorySource {
        async fn fetch_page(&self, query: &ListQuery) -> Result<Page<Student>, TransportError> {
            self.pages.lock().unwrap().push(query.page_index());
            self.take_failure()?;
            let rows = self.rows.lock().unwrap().clone();
            Ok(Page::client_sliced(
                rows,
                query.page_index(),
                query.page_size(),
            ))
        }

        async fn search(&self, keyword: &str) -> Result<Vec<Student>, TransportError> {
            self.searches.lock().unwrap().push(keyword.to_string());
            self.take_failure()?;
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|row| row.name.contains(keyword))
                .cloned()
                .collect())
        }
    }

    type Gate = oneshot::Receiver<Result<Page<Student>, TransportError>>;

    /// Holds each page request until the test releases it.
    #[derive(Default)]
    struct GatedSource {
        gates: Mutex<HashMap<usize, Gate>>,
    }

    impl GatedSource {
        fn gate(&self, page_index: usize) -> oneshot::Sender<Result<Page<Student>, TransportError>> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().insert(page_index, rx);
            tx
        }
    }

    #[async_trait]
    impl ListSource<Student> for GatedSource {
        async fn fetch_page(&self, query: &ListQuery) -> Result<Page<Student>, TransportError> {
            let gate = self.gates.lock().unwrap().remove(&query.page_index());
            match gate {
                Some(gate) => gate.await.unwrap_or(Err(TransportError::Timeout)),
                None => Err(TransportError::Timeout),
            }
        }

        async fn search(&self, _keyword: &str) -> Result<Vec<Student>, TransportError> {
            Ok(Vec::new())
        }
    }

    fn page_of(ids: &[i64], page_index: usize) -> Page<Student> {
        Page {
            content: students(20)
                .into_iter()
                .filter(|row| ids.contains(&row.id))
                .collect(),
            total_pages: 5,
            page_index,
        }
    }

    async fn wait_for_sequence(controller: &ListController<Student>, sequence: u64) {
        controller
            .subscribe()
            .wait_for(|state| state.sequence == sequence)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn older_response_arriving_last_is_discarded() {
        let source = Arc::new(GatedSource::default());
        let first = source.gate(1);
        let second = source.gate(2);
        let controller = Arc::new(ListController::new(source, ListQuery::default()));

        let older = tokio::spawn({
            let controller = controller.clone();
            async move { controller.load(ListQuery::default().with_page(1)).await }
        });
        wait_for_sequence(&controller, 1).await;
        let newer = tokio::spawn({
            let controller = controller.clone();
            async move { controller.load(ListQuery::default().with_page(2)).await }
        });
        wait_for_sequence(&controller, 2).await;

        second.send(Ok(page_of(&[3, 4], 2))).unwrap();
        let page = newer.await.unwrap().unwrap();
        assert_eq!(page.page_index, 2);

        first.send(Ok(page_of(&[1, 2], 1))).unwrap();
        let err = older.await.unwrap().unwrap_err();
        assert_eq!(err, ListError::Superseded { sequence: 1 });

        let state = controller.state();
        assert_eq!(state.page.page_index, 2);
        assert_eq!(state.query.page_index(), 2);
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn older_response_arriving_first_is_discarded() {
        let source = Arc::new(GatedSource::default());
        let first = source.gate(1);
        let second = source.gate(2);
        let controller = Arc::new(ListController::new(source, ListQuery::default()));

        let older = tokio::spawn({
            let controller = controller.clone();
            async move { controller.load(ListQuery::default().with_page(1)).await }
        });
        wait_for_sequence(&controller, 1).await;
        let newer = tokio::spawn({
            let controller = controller.clone();
            async move { controller.load(ListQuery::default().with_page(2)).await }
        });
        wait_for_sequence(&controller, 2).await;

        first.send(Ok(page_of(&[1, 2], 1))).unwrap();
        assert!(older.await.unwrap().unwrap_err().is_superseded());

        let state = controller.state();
        assert!(state.loading);
        assert!(state.page.is_empty());

        second.send(Ok(page_of(&[3, 4], 2))).unwrap();
        newer.await.unwrap().unwrap();
        assert_eq!(controller.state().page.page_index, 2);
    }

    #[tokio::test]
    async fn stale_failure_does_not_set_error() {
        let source = Arc::new(GatedSource::default());
        let first = source.gate(1);
        let second = source.gate(2);
        let controller = Arc::new(ListController::new(source, ListQuery::default()));

        let older = tokio::spawn({
            let controller = controller.clone();
            async move { controller.load(ListQuery::default().with_page(1)).await }
        });
        wait_for_sequence(&controller, 1).await;
        let newer = tokio::spawn({
            let controller = controller.clone();
            async move { controller.load(ListQuery::default().with_page(2)).await }
        });
        wait_for_sequence(&controller, 2).await;

        second.send(Ok(page_of(&[3], 2))).unwrap();
        newer.await.unwrap().unwrap();
        first
            .send(Err(TransportError::Network {
                reason: "reset".to_string(),
            }))
            .unwrap();
        assert!(older.await.unwrap().unwrap_err().is_superseded());

        assert_eq!(controller.state().error, None);
    }

    #[tokio::test]
    async fn failure_keeps_last_good_page() {
        let source = MemorySource::with_rows(students(15));
        let controller = ListController::new(source.clone(), ListQuery::default());

        let first = controller.load(ListQuery::default()).await.unwrap();
        assert_eq!(first.content.len(), 10);

        *source.fail_next.lock().unwrap() = Some(TransportError::Forbidden {
            message: "access denied".to_string(),
        });
        let err = controller.next_page().await.unwrap_err();
        assert!(matches!(
            err,
            ListError::Transport(TransportError::Forbidden { .. })
        ));

        let state = controller.state();
        assert_eq!(state.page, first);
        assert!(matches!(state.error, Some(TransportError::Forbidden { .. })));
        assert!(!state.loading);

        controller.refresh().await.unwrap();
        let state = controller.state();
        assert_eq!(state.error, None);
        assert_eq!(state.page.page_index, 1);
        assert_eq!(state.page.content.len(), 5);
    }

    #[tokio::test]
    async fn keyword_slices_full_match_list() {
        let source = MemorySource::with_rows(students(23));
        let controller = ListController::new(source.clone(), ListQuery::default());

        let page = controller
            .load(ListQuery::default().with_keyword("student").with_page(2))
            .await
            .unwrap();

        assert_eq!(page.content.len(), 3);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page_index, 2);
        assert!(source.pages.lock().unwrap().is_empty());
        assert_eq!(*source.searches.lock().unwrap(), vec!["student".to_string()]);
    }

    #[tokio::test]
    async fn every_search_page_turn_refetches_matches() {
        let source = MemorySource::with_rows(students(23));
        let controller = ListController::new(source.clone(), ListQuery::default());

        controller.search("student").await.unwrap();
        source.rows.lock().unwrap().truncate(12);
        let page = controller.next_page().await.unwrap();

        assert_eq!(source.searches.lock().unwrap().len(), 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.content.len(), 2);
    }

    #[tokio::test]
    async fn clearing_keyword_returns_to_server_paging() {
        let source = MemorySource::with_rows(students(23));
        let controller = ListController::new(source.clone(), ListQuery::default());

        controller.search("student").await.unwrap();
        controller.search("  ").await.unwrap();

        assert_eq!(source.searches.lock().unwrap().len(), 1);
        assert_eq!(*source.pages.lock().unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn page_past_end_is_reissued_for_last_page() {
        let source = MemorySource::with_rows(students(25));
        let controller = ListController::new(source.clone(), ListQuery::default());

        let page = controller.go_to_page(4).await.unwrap();

        assert_eq!(*source.pages.lock().unwrap(), vec![4, 2]);
        assert_eq!(page.page_index, 2);
        assert_eq!(page.content.len(), 5);
        assert_eq!(controller.state().query.page_index(), 2);
    }

    #[tokio::test]
    async fn empty_result_resets_to_first_page() {
        let source = MemorySource::with_rows(Vec::new());
        let controller = ListController::new(source.clone(), ListQuery::default());

        let page = controller.go_to_page(3).await.unwrap();

        assert_eq!(*source.pages.lock().unwrap(), vec![3]);
        assert_eq!(page.page_index, 0);
        assert_eq!(controller.state().query.page_index(), 0);
    }

    #[tokio::test]
    async fn sort_change_starts_over() {
        let source = MemorySource::with_rows(students(25));
        let controller = ListController::new(source.clone(), ListQuery::new("name"));

        controller.go_to_page(2).await.unwrap();
        controller.sort_by("name").await.unwrap();

        let query = controller.query();
        assert_eq!(query.page_index(), 0);
        assert_eq!(query.sort_direction(), crate::query::SortDirection::Desc);
    }

    struct Academies {
        calls: Mutex<Vec<RecordId>>,
    }

    #[async_trait]
    impl ReferenceLookup for Academies {
        async fn lookup(&self, id: RecordId) -> Result<String, TransportError> {
            self.calls.lock().unwrap().push(id);
            Ok(format!("Academy {id}"))
        }
    }

    #[tokio::test]
    async fn references_resolve_before_load_returns() {
        let lookup = Arc::new(Academies {
            calls: Mutex::new(Vec::new()),
        });
        let source = MemorySource::with_rows(students(10));
        let controller = ListController::new(source, ListQuery::default())
            .with_reference(lookup.clone(), |row: &Student| {
                row.academy_id.map(RecordId::new)
            });

        controller.refresh().await.unwrap();

        assert_eq!(lookup.calls.lock().unwrap().len(), 3);
        let academies = controller.reference(0).unwrap();
        assert_eq!(academies.get(RecordId::new(1)).as_deref(), Some("Academy 1"));
        assert!(controller.reference(1).is_none());

        controller.refresh().await.unwrap();
        assert_eq!(lookup.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn reference_names_are_scoped_to_their_controller() {
        let lookup = Arc::new(Academies {
            calls: Mutex::new(Vec::new()),
        });
        let key = |row: &Student| row.academy_id.map(RecordId::new);
        let first = ListController::new(
            MemorySource::with_rows(students(10)),
            ListQuery::default(),
        )
        .with_reference(lookup.clone(), key);
        first.refresh().await.unwrap();
        drop(first);

        let second = ListController::new(
            MemorySource::with_rows(students(10)),
            ListQuery::default(),
        )
        .with_reference(lookup.clone(), key);
        assert!(second.reference(0).unwrap().is_empty());
        second.refresh().await.unwrap();

        assert_eq!(lookup.calls.lock().unwrap().len(), 6);
    }
}
