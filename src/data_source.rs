//! Paginated, selectable entity data source
//!
//! One generic container behind every table-like widget:
//! - wraps an injected [`PageFetcher`] (the only I/O)
//! - publishes the current page and its metadata as watch streams
//! - owns bulk selection (gated by a selectable predicate) and a single
//!   "current" entity used for detail-panel focus
//!
//! Fetch failures never reach the caller: the page degrades to empty.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, warn};

use crate::entity::{EntityId, Identified};
use crate::error::Result;
use crate::page::{PageData, PageLink, PageMeta};

/// Injected page fetch operation
#[async_trait]
pub trait PageFetcher<T>: Send + Sync {
    async fn fetch(&self, link: &PageLink) -> Result<PageData<T>>;
}

/// Adapter turning an async closure into a [`PageFetcher`]
pub struct FnFetcher<F>(F);

/// Wrap `|link| async move { ... }` as a fetcher
pub fn fetch_fn<F>(f: F) -> FnFetcher<F> {
    FnFetcher(f)
}

#[async_trait]
impl<T, F, Fut> PageFetcher<T> for FnFetcher<F>
where
    T: Send + 'static,
    F: Fn(PageLink) -> Fut + Send + Sync,
    Fut: Future<Output = Result<PageData<T>>> + Send,
{
    async fn fetch(&self, link: &PageLink) -> Result<PageData<T>> {
        (self.0)(link.clone()).await
    }
}

/// Which response wins when reloads overlap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReloadPolicy {
    /// Every completed load publishes; the last to complete wins
    #[default]
    LastCompletionWins,
    /// Only the most recently issued load may publish
    LatestRequestWins,
}

type Selectable<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// State shared with published streams
struct Shared<T> {
    page: RwLock<Arc<Vec<T>>>,
    meta: RwLock<PageMeta>,
    items_tx: Mutex<Option<watch::Sender<Arc<Vec<T>>>>>,
    meta_tx: Mutex<Option<watch::Sender<PageMeta>>>,
    loading_tx: watch::Sender<bool>,
    /// Selected entity ids (`id.id`)
    selection: Mutex<FxHashSet<String>>,
    current: Mutex<Option<EntityId>>,
    generation: AtomicU64,
    in_flight: AtomicUsize,
}

/// Counts one load as in flight until dropped, including when the load
/// future is cancelled mid-fetch
struct InFlight<'a> {
    count: &'a AtomicUsize,
    loading: &'a watch::Sender<bool>,
}

impl<'a> InFlight<'a> {
    fn start(count: &'a AtomicUsize, loading: &'a watch::Sender<bool>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        loading.send_replace(true);
        Self { count, loading }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.loading.send_replace(false);
        }
    }
}

/// Generic paged table source
pub struct EntitiesDataSource<T> {
    fetcher: Arc<dyn PageFetcher<T>>,
    selectable: Selectable<T>,
    policy: ReloadPolicy,
    shared: Arc<Shared<T>>,
}

impl<T> Clone for EntitiesDataSource<T> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            selectable: Arc::clone(&self.selectable),
            policy: self.policy,
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> EntitiesDataSource<T>
where
    T: Identified + Clone + Send + Sync + 'static,
{
    pub fn new(fetcher: impl PageFetcher<T> + 'static) -> Self {
        let (items_tx, _) = watch::channel(Arc::new(Vec::new()));
        let (meta_tx, _) = watch::channel(PageMeta::default());
        let (loading_tx, _) = watch::channel(false);

        Self {
            fetcher: Arc::new(fetcher),
            selectable: Arc::new(|_: &T| true),
            policy: ReloadPolicy::default(),
            shared: Arc::new(Shared {
                page: RwLock::new(Arc::new(Vec::new())),
                meta: RwLock::new(PageMeta::default()),
                items_tx: Mutex::new(Some(items_tx)),
                meta_tx: Mutex::new(Some(meta_tx)),
                loading_tx,
                selection: Mutex::new(FxHashSet::default()),
                current: Mutex::new(None),
                generation: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Items failing `predicate` never take part in bulk selection
    pub fn with_selectable(mut self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.selectable = Arc::new(predicate);
        self
    }

    pub fn with_reload_policy(mut self, policy: ReloadPolicy) -> Self {
        self.policy = policy;
        self
    }

    // ═══════════════════════════════════════════
    // STREAM LIFECYCLE
    // ═══════════════════════════════════════════

    /// Live item stream (current page first, then every publish)
    pub fn connect(&self) -> BoxStream<'static, Arc<Vec<T>>> {
        match self.shared.items_tx.lock().as_ref() {
            Some(tx) => WatchStream::new(tx.subscribe()).boxed(),
            None => stream::empty().boxed(),
        }
    }

    /// Page metadata stream
    pub fn page_meta(&self) -> BoxStream<'static, PageMeta> {
        match self.shared.meta_tx.lock().as_ref() {
            Some(tx) => WatchStream::new(tx.subscribe()).boxed(),
            None => stream::empty().boxed(),
        }
    }

    /// End the item and metadata streams. Safe to call repeatedly.
    pub fn disconnect(&self) {
        let items = self.shared.items_tx.lock().take();
        let meta = self.shared.meta_tx.lock().take();
        if items.is_some() || meta.is_some() {
            debug!("data source disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared.items_tx.lock().is_some()
    }

    // ═══════════════════════════════════════════
    // LOADING
    // ═══════════════════════════════════════════

    /// Fetch and publish a page.
    ///
    /// Selection is cleared before the new page is published. A failed fetch
    /// publishes (and returns) an empty page.
    pub async fn load_entities(&self, link: PageLink) -> PageData<T> {
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let _in_flight = InFlight::start(&self.shared.in_flight, &self.shared.loading_tx);

        let page = match self.fetcher.fetch(&link).await {
            Ok(page) => page,
            Err(e) => {
                warn!(page = link.page, error = %e, "page fetch failed, showing empty page");
                PageData::empty()
            }
        };

        let superseded = self.policy == ReloadPolicy::LatestRequestWins
            && self.shared.generation.load(Ordering::SeqCst) != generation;
        if superseded {
            debug!(page = link.page, generation, "discarding superseded page");
        } else {
            self.publish(page.clone());
        }
        page
    }

    /// Republish an empty page without fetching
    pub fn reset(&self) {
        self.publish(PageData::empty());
    }

    fn publish(&self, page: PageData<T>) {
        let (data, meta) = page.into_parts();
        let data = Arc::new(data);

        self.shared.selection.lock().clear();
        *self.shared.page.write() = Arc::clone(&data);
        *self.shared.meta.write() = meta;

        if let Some(tx) = self.shared.items_tx.lock().as_ref() {
            tx.send_replace(Arc::clone(&data));
        }
        if let Some(tx) = self.shared.meta_tx.lock().as_ref() {
            tx.send_replace(meta);
        }
        debug!(items = data.len(), total = meta.total_elements, "page published");
    }

    pub fn loading(&self) -> bool {
        *self.shared.loading_tx.borrow()
    }

    pub fn loading_stream(&self) -> BoxStream<'static, bool> {
        WatchStream::new(self.shared.loading_tx.subscribe()).boxed()
    }

    // ═══════════════════════════════════════════
    // DERIVED VALUES
    // ═══════════════════════════════════════════

    /// Items of the most recently published page
    pub fn items(&self) -> Arc<Vec<T>> {
        self.shared.page.read().clone()
    }

    pub fn meta(&self) -> PageMeta {
        *self.shared.meta.read()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.page.read().is_empty()
    }

    pub fn total(&self) -> usize {
        self.shared.meta.read().total_elements
    }

    pub fn is_all_selected(&self) -> bool {
        all_selected(&self.shared, &self.selectable, &self.items())
    }

    pub fn is_empty_stream(&self) -> BoxStream<'static, bool> {
        self.connect().map(|items| items.is_empty()).boxed()
    }

    pub fn total_stream(&self) -> BoxStream<'static, usize> {
        self.page_meta().map(|meta| meta.total_elements).boxed()
    }

    pub fn is_all_selected_stream(&self) -> BoxStream<'static, bool> {
        let shared = Arc::clone(&self.shared);
        let selectable = Arc::clone(&self.selectable);
        self.connect()
            .map(move |items| all_selected(&shared, &selectable, &items))
            .boxed()
    }

    // ═══════════════════════════════════════════
    // SELECTION
    // ═══════════════════════════════════════════

    pub fn is_selectable(&self, item: &T) -> bool {
        (self.selectable)(item)
    }

    /// Clear the selection when every selectable item is selected, otherwise
    /// select every selectable item of the current page
    pub fn master_toggle(&self) {
        let items = self.items();
        let selectable: Vec<&T> = items.iter().filter(|item| (self.selectable)(*item)).collect();

        let mut selection = self.shared.selection.lock();
        if selection.len() == selectable.len() {
            selection.clear();
        } else {
            for item in selectable {
                selection.insert(item.entity_id().id.clone());
            }
        }
    }

    /// Flip one item's selection. Returns whether it is now selected.
    pub fn toggle_selection(&self, item: &T) -> bool {
        let id = &item.entity_id().id;
        let on_page = self.items().iter().any(|i| &i.entity_id().id == id);
        if !on_page || !(self.selectable)(item) {
            return false;
        }

        let mut selection = self.shared.selection.lock();
        if selection.remove(id) {
            false
        } else {
            selection.insert(id.clone());
            true
        }
    }

    pub fn is_selected(&self, item: &T) -> bool {
        self.shared.selection.lock().contains(&item.entity_id().id)
    }

    /// Selected items in page order
    pub fn selected(&self) -> Vec<T> {
        let selection = self.shared.selection.lock();
        self.items()
            .iter()
            .filter(|item| selection.contains(&item.entity_id().id))
            .cloned()
            .collect()
    }

    pub fn selected_count(&self) -> usize {
        self.shared.selection.lock().len()
    }

    pub fn clear_selection(&self) {
        self.shared.selection.lock().clear();
    }

    // ═══════════════════════════════════════════
    // CURRENT ENTITY
    // ═══════════════════════════════════════════

    /// Make `item` the current entity. Returns false when it already was.
    pub fn toggle_current_entity(&self, item: &T) -> bool {
        let mut current = self.shared.current.lock();
        if current.as_ref().map(|c| &c.id) == Some(&item.entity_id().id) {
            false
        } else {
            *current = Some(item.entity_id().clone());
            true
        }
    }

    pub fn is_current_entity(&self, item: &T) -> bool {
        self.shared
            .current
            .lock()
            .as_ref()
            .is_some_and(|c| c.id == item.entity_id().id)
    }

    pub fn current_entity(&self) -> Option<EntityId> {
        self.shared.current.lock().clone()
    }
}

fn all_selected<T>(shared: &Shared<T>, selectable: &Selectable<T>, items: &[T]) -> bool {
    let selectable_count = items.iter().filter(|item| selectable(*item)).count();
    shared.selection.lock().len() == selectable_count
}
