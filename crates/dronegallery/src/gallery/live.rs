//! The live gallery driver.
//!
//! Owns one subscription and one [`GalleryView`], and feeds every state change
//! to a [`Presenter`] until shut down.

use std::future::Future;

use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use super::presenter::Presenter;
use super::view::{GallerySettings, GalleryView, ViewState};
use crate::collection::{CollectionQuery, DocumentCollection, SnapshotEvent, Subscription};
use crate::error::{Error, Result};

/// What happened during one [`LiveGallery::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Snapshots applied.
    pub snapshots: u64,
    /// Subscription errors applied.
    pub errors: u64,
    /// Frames handed to the presenter.
    pub frames: u64,
    /// Whether the composite banner was visible at any point.
    pub banner_shown: bool,
}

/// A gallery bound to one collection query.
#[derive(Debug)]
pub struct LiveGallery<C> {
    collection: C,
    query: CollectionQuery,
    settings: GallerySettings,
}

/// Next event of a subscription, or the end of one that never started.
async fn next_event(subscription: &mut Option<Subscription>) -> Option<SnapshotEvent> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => None,
    }
}

/// Resolves at `deadline`, or never when there is none.
async fn banner_timer(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl<C: DocumentCollection> LiveGallery<C> {
    /// Create a gallery over `collection`.
    #[must_use]
    pub fn new(collection: C, query: CollectionQuery, settings: GallerySettings) -> Self {
        Self {
            collection,
            query,
            settings,
        }
    }

    /// The subscribed query.
    #[must_use]
    pub fn query(&self) -> &CollectionQuery {
        &self.query
    }

    /// The collection backing the gallery.
    #[must_use]
    pub fn collection(&self) -> &C {
        &self.collection
    }

    /// Run until `shutdown` resolves.
    ///
    /// Presents the loading frame first, then one frame per state change.
    /// The banner timer is rebuilt on every iteration, so a superseding
    /// snapshot or shutdown drops it before it can fire. A collection that
    /// cannot be subscribed to shows the empty state, like any other
    /// subscription error.
    ///
    /// # Errors
    ///
    /// Returns an error if presenting fails.
    pub async fn run<P, F>(&self, presenter: &mut P, shutdown: F) -> Result<RunSummary>
    where
        P: Presenter + ?Sized,
        F: Future<Output = ()>,
    {
        let mut view = GalleryView::new(self.settings.clone());
        let mut summary = RunSummary::default();

        info!(
            "Live gallery started on '{}' ({} backend)",
            self.query.collection,
            self.collection.name()
        );

        presenter.present(&view.state())?;
        summary.frames += 1;

        let mut subscription = match self.collection.subscribe(&self.query).await {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                summary.errors += 1;
                view.apply_error(&e, Instant::now())?;
                presenter.present(&view.state())?;
                summary.frames += 1;
                None
            }
        };
        let mut open = subscription.is_some();

        tokio::pin!(shutdown);

        let outcome = loop {
            let deadline = view.banner_deadline();
            let changed = tokio::select! {
                () = &mut shutdown => break Ok(()),
                event = next_event(&mut subscription), if open => match event {
                    Some(SnapshotEvent::Snapshot(snapshot)) => {
                        summary.snapshots += 1;
                        view.apply_snapshot(&snapshot, Instant::now()).map(|()| true)
                    }
                    Some(SnapshotEvent::Error(err)) => {
                        summary.errors += 1;
                        view.apply_error(&err, Instant::now()).map(|()| true)
                    }
                    None => {
                        info!("Subscription to '{}' ended", self.query.collection);
                        open = false;
                        Ok(false)
                    }
                },
                () = banner_timer(deadline), if deadline.is_some() => {
                    view.fire_banner(Instant::now())
                }
            };

            match changed {
                Ok(true) => {
                    summary.banner_shown |= view.show_composite();
                    if let Err(e) = presenter.present(&view.state()) {
                        break Err(e);
                    }
                    summary.frames += 1;
                }
                Ok(false) => {}
                Err(e) => break Err(e),
            }
        };

        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
        view.teardown();
        debug!("Live gallery stopped: {:?}", summary);
        outcome.map(|()| summary)
    }

    /// Render the first delivery and stop.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription ends before delivering anything.
    pub async fn render_once(&self) -> Result<ViewState> {
        let mut view = GalleryView::new(self.settings.clone());
        let now = Instant::now();

        let mut subscription = match self.collection.subscribe(&self.query).await {
            Ok(subscription) => subscription,
            Err(e) => {
                view.apply_error(&e, now)?;
                let state = view.state();
                view.teardown();
                return Ok(state);
            }
        };

        match subscription.next().await {
            Some(SnapshotEvent::Snapshot(snapshot)) => view.apply_snapshot(&snapshot, now)?,
            Some(SnapshotEvent::Error(err)) => view.apply_error(&err, now)?,
            None => {
                return Err(Error::SubscriptionClosed {
                    collection: self.query.collection.clone(),
                })
            }
        }
        // Only a zero delay can have elapsed already
        view.fire_banner(now)?;

        let state = view.state();
        subscription.unsubscribe();
        view.teardown();
        Ok(state)
    }
}
