//! Item list rendering: clear, order, resolve, draw.
//!
//! [`Renderer`] runs one pass over a borrowed surface. [`Canvas`] owns a
//! surface behind a mutex and makes every new `render` call supersede the
//! pass that is still running on that surface. Passes on other surfaces,
//! even through the same renderer, are never affected.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use canvas_core::kurbo::Point;
use canvas_core::{paint_order, CanvasItem, ImageItem, ItemId, ItemKind, TextItem};
use futures::StreamExt;
use serde::{Serialize, Serializer};
use tokio::sync::Mutex;

use crate::composite::composite_image;
use crate::error::{LoadResult, RenderError, RenderResult, SurfaceError};
use crate::resolver::{ImageResolver, ResolvedImage};
use crate::surface::{DrawingSurface, SurfaceSize};
use crate::text::draw_text;

/// Configuration for the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    /// How many image sources may be resolving at once. Draws stay in paint
    /// order regardless; `1` resolves each image just before it is drawn.
    pub prefetch: usize,
    /// Size to clear the surface to before drawing. `None` keeps its size.
    pub clear_size: Option<SurfaceSize>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            prefetch: 1,
            clear_size: None,
        }
    }
}

/// Outcome for a single item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ItemStatus {
    /// The item was drawn.
    Drawn,
    /// Nothing to draw.
    Skipped {
        /// Why nothing was drawn.
        reason: String,
    },
    /// Loading or drawing failed; later items were still drawn.
    Failed {
        /// Error message.
        message: String,
    },
}

/// Per-item entry of a [`RenderReport`], in paint order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReport {
    /// Position in the caller's item list.
    pub index: usize,
    /// Item id, if it had one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ItemId>,
    /// `image` or `text`.
    pub kind: &'static str,
    /// Outcome.
    #[serde(flatten)]
    pub status: ItemStatus,
    /// Time from the start of loading the item to its finished draw.
    #[serde(serialize_with = "as_millis")]
    pub draw_time: Duration,
}

/// Summary of one render pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderReport {
    /// One entry per item that was reached, in paint order.
    pub items: Vec<ItemReport>,
    /// A newer pass started before this one finished.
    pub superseded: bool,
    /// Surface size after the clear.
    pub surface: SurfaceSize,
    /// Wall time of the whole pass.
    #[serde(serialize_with = "as_millis")]
    pub total_time: Duration,
}

impl RenderReport {
    fn new(surface: SurfaceSize, capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            superseded: false,
            surface,
            total_time: Duration::ZERO,
        }
    }

    /// Number of items drawn.
    #[must_use]
    pub fn drawn(&self) -> usize {
        self.items
            .iter()
            .filter(|r| r.status == ItemStatus::Drawn)
            .count()
    }

    /// Items that failed.
    #[must_use]
    pub fn failed(&self) -> impl Iterator<Item = &ItemReport> {
        self.items
            .iter()
            .filter(|r| matches!(r.status, ItemStatus::Failed { .. }))
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}

/// Pass counter for one surface.
///
/// Each [`begin`](Self::begin) supersedes every token issued before it by
/// this counter or its clones.
#[derive(Debug, Clone, Default)]
pub struct PassGeneration {
    latest: Arc<AtomicU64>,
}

impl PassGeneration {
    /// A fresh counter with no passes issued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new pass, superseding every earlier token.
    #[must_use]
    pub fn begin(&self) -> PassToken {
        let id = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        PassToken {
            generation: Arc::clone(&self.latest),
            id,
        }
    }

    /// Stop any running pass at its next item boundary.
    pub fn cancel(&self) {
        self.latest.fetch_add(1, Ordering::AcqRel);
    }

    /// Latest issued generation.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.latest.load(Ordering::Acquire)
    }
}

/// Marks one render pass. A pass stops at the next item boundary once a
/// newer token has been issued by the same [`PassGeneration`].
#[derive(Debug, Clone)]
pub struct PassToken {
    generation: Arc<AtomicU64>,
    id: u64,
}

impl PassToken {
    /// Generation this token was issued for.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether no newer pass has started.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::Acquire) == self.id
    }
}

/// An item with its loaded content, and when loading started.
struct Loaded<'a> {
    index: usize,
    item: &'a CanvasItem,
    prepared: Prepared<'a>,
    started: Instant,
}

enum Prepared<'a> {
    Image(&'a ImageItem, LoadResult<ResolvedImage>),
    Text(&'a TextItem),
}

/// Draws item lists onto a surface.
pub struct Renderer<R> {
    resolver: R,
    config: RenderConfig,
}

impl<R: ImageResolver> Renderer<R> {
    /// Create a renderer with the default configuration.
    #[must_use]
    pub fn new(resolver: R) -> Self {
        Self::with_config(resolver, RenderConfig::default())
    }

    /// Create a renderer with the given configuration.
    #[must_use]
    pub fn with_config(resolver: R, config: RenderConfig) -> Self {
        Self { resolver, config }
    }

    /// The image resolver.
    #[must_use]
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Render `items` as a standalone pass that nothing else can supersede.
    ///
    /// Use [`Canvas::render`], or [`render_with_token`](Self::render_with_token)
    /// with a [`PassGeneration`] per surface, for passes that replace each other.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ContextUnavailable`] if the surface cannot be
    /// cleared, or a surface error that leaves it unusable. Per-item
    /// failures are reported in the returned [`RenderReport`].
    pub async fn render<S: DrawingSurface + ?Sized>(
        &self,
        surface: &mut S,
        items: &[CanvasItem],
    ) -> RenderResult<RenderReport> {
        let token = PassGeneration::new().begin();
        self.render_with_token(surface, items, &token).await
    }

    /// Render `items` under an existing pass token.
    ///
    /// # Errors
    ///
    /// See [`render`](Self::render).
    pub async fn render_with_token<S: DrawingSurface + ?Sized>(
        &self,
        surface: &mut S,
        items: &[CanvasItem],
        token: &PassToken,
    ) -> RenderResult<RenderReport> {
        let started = Instant::now();

        match surface.clear(self.config.clear_size) {
            Ok(()) => {}
            Err(SurfaceError::ContextUnavailable) => {
                tracing::error!("Render pass {} aborted: no drawing context", token.id());
                return Err(RenderError::ContextUnavailable);
            }
            Err(e) => return Err(e.into()),
        }

        let mut report = RenderReport::new(surface.size(), items.len());
        if items.is_empty() {
            tracing::debug!("Render pass {}: empty item list, cleared only", token.id());
            report.total_time = started.elapsed();
            return Ok(report);
        }

        let resolver = &self.resolver;
        let prepared = futures::stream::iter(paint_order(items))
            .map(|(index, item)| async move {
                let started = Instant::now();
                let prepared = match &item.kind {
                    ItemKind::Image(image) => {
                        Prepared::Image(image, resolver.resolve(&image.source).await)
                    }
                    ItemKind::Text(text) => Prepared::Text(text),
                };
                Loaded {
                    index,
                    item,
                    prepared,
                    started,
                }
            })
            .buffered(self.config.prefetch.max(1));
        let mut prepared = std::pin::pin!(prepared);

        loop {
            if !token.is_current() {
                report.superseded = true;
                break;
            }
            let Some(Loaded {
                index,
                item,
                prepared,
                started: item_started,
            }) = prepared.next().await
            else {
                break;
            };
            // Resolving may have taken long enough for a newer pass to start.
            if !token.is_current() {
                report.superseded = true;
                break;
            }

            let status = draw_item(surface, item, prepared)?;
            let entry = ItemReport {
                index,
                id: item.id.clone(),
                kind: item.kind.name(),
                status,
                draw_time: item_started.elapsed(),
            };
            tracing::debug!(
                "Item {} ({}) {:?} in {:?}",
                index,
                entry.kind,
                entry.status,
                entry.draw_time
            );
            report.items.push(entry);
        }

        report.total_time = started.elapsed();
        if report.superseded {
            tracing::debug!(
                "Render pass {} superseded after {} of {} items",
                token.id(),
                report.items.len(),
                items.len()
            );
        } else {
            tracing::debug!(
                "Render pass {} finished: {} drawn, {} failed, {:?}",
                token.id(),
                report.drawn(),
                report.failed().count(),
                report.total_time
            );
        }
        Ok(report)
    }
}

fn draw_item<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    item: &CanvasItem,
    prepared: Prepared<'_>,
) -> RenderResult<ItemStatus> {
    let anchor = Point::new(item.x, item.y);
    let result: RenderResult<ItemStatus> = match prepared {
        Prepared::Image(image_item, Ok(image)) => {
            composite_image(surface, anchor, image_item, &image)
                .map(|_| ItemStatus::Drawn)
                .map_err(RenderError::from)
        }
        Prepared::Image(_, Err(e)) => Err(e.into()),
        Prepared::Text(text) => match draw_text(surface, anchor, text) {
            Ok(0) => Ok(ItemStatus::Skipped {
                reason: "empty text".to_string(),
            }),
            Ok(_) => Ok(ItemStatus::Drawn),
            Err(e) => Err(e.into()),
        },
    };

    match result {
        Ok(status) => Ok(status),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::warn!("Skipping {} item: {}", item.kind.name(), e);
            Ok(ItemStatus::Failed {
                message: e.to_string(),
            })
        }
    }
}

/// A surface host. Owns the surface and serializes passes over it.
///
/// Calling [`render`](Self::render) supersedes any pass already running on
/// this canvas: the older pass stops at its next item boundary and releases
/// the surface, and the newer pass clears before it draws.
pub struct Canvas<S, R> {
    surface: Mutex<Option<S>>,
    renderer: Renderer<R>,
    passes: PassGeneration,
}

impl<S: DrawingSurface, R: ImageResolver> Canvas<S, R> {
    /// Host `surface`, drawing with `renderer`.
    #[must_use]
    pub fn new(surface: S, renderer: Renderer<R>) -> Self {
        Self {
            surface: Mutex::new(Some(surface)),
            renderer,
            passes: PassGeneration::new(),
        }
    }

    /// A host with no surface attached yet.
    #[must_use]
    pub fn detached(renderer: Renderer<R>) -> Self {
        Self {
            surface: Mutex::new(None),
            renderer,
            passes: PassGeneration::new(),
        }
    }

    /// The renderer.
    #[must_use]
    pub fn renderer(&self) -> &Renderer<R> {
        &self.renderer
    }

    /// Latest pass generation issued for this surface.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.passes.current()
    }

    /// Start a pass on this surface, superseding any running one.
    #[must_use]
    pub fn begin_pass(&self) -> PassToken {
        self.passes.begin()
    }

    /// Stop the running pass on this surface at its next item boundary.
    pub fn cancel(&self) {
        self.passes.cancel();
    }

    /// Attach a surface, returning the previous one.
    pub async fn attach(&self, surface: S) -> Option<S> {
        self.surface.lock().await.replace(surface)
    }

    /// Detach and return the surface. Later renders fail until one is attached.
    pub async fn detach(&self) -> Option<S> {
        self.surface.lock().await.take()
    }

    /// Surface size, if attached.
    pub async fn size(&self) -> Option<SurfaceSize> {
        self.surface.lock().await.as_ref().map(DrawingSurface::size)
    }

    /// Resize the attached surface.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ContextUnavailable`] if detached, or the
    /// surface error if the size cannot be allocated.
    pub async fn resize(&self, size: SurfaceSize) -> RenderResult<()> {
        let mut guard = self.surface.lock().await;
        let surface = guard.as_mut().ok_or(RenderError::ContextUnavailable)?;
        surface.resize(size)?;
        Ok(())
    }

    /// Run `f` with exclusive access to the surface.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ContextUnavailable`] if detached.
    pub async fn with_surface<T>(&self, f: impl FnOnce(&mut S) -> T) -> RenderResult<T> {
        let mut guard = self.surface.lock().await;
        let surface = guard.as_mut().ok_or(RenderError::ContextUnavailable)?;
        Ok(f(surface))
    }

    /// Render `items` as a new pass.
    ///
    /// The pass token is taken when this is called, not when the returned
    /// future is first polled, so a pass still running elsewhere starts
    /// winding down immediately.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ContextUnavailable`] if no surface is attached,
    /// otherwise as [`Renderer::render`].
    pub fn render<'a>(
        &'a self,
        items: &'a [CanvasItem],
    ) -> impl Future<Output = RenderResult<RenderReport>> + 'a {
        let token = self.passes.begin();
        async move {
            let mut guard = self.surface.lock().await;
            let surface = guard.as_mut().ok_or(RenderError::ContextUnavailable)?;
            self.renderer
                .render_with_token(surface, items, &token)
                .await
        }
    }
}
