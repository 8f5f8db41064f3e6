//! The gallery view model.
//!
//! [`GalleryView`] turns subscription events into a [`ViewState`]: snapshots
//! replace the record list wholesale, errors clear it, and the banner gate is
//! re-evaluated on every delivery.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use super::banner::BannerGate;
use crate::collection::Snapshot;
use crate::error::{Error, Result};
use crate::record::{map_documents, ImageSetRecord, SchemaVariant, TIMESTAMP_FIELD};

/// Record count of a complete demonstration set.
pub const DEFAULT_EXPECTED_COUNT: usize = 11;

/// Delay before the composite banner shows.
pub const DEFAULT_BANNER_DELAY: Duration = Duration::from_secs(2);

/// Whether the first delivery has arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    /// Waiting for the first snapshot or error.
    #[default]
    Loading,
    /// At least one delivery has been applied.
    Ready,
}

/// Everything a presenter needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewState {
    /// Loading or ready.
    pub status: Status,
    /// Records in the order the collection delivered them.
    pub records: Vec<ImageSetRecord>,
    /// Whether the composite banner is visible.
    pub show_composite: bool,
}

impl ViewState {
    /// Check if the loading indicator should render.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status == Status::Loading
    }

    /// Check if the empty-state message should render.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status == Status::Ready && self.records.is_empty()
    }
}

/// How documents are read and when the banner shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GallerySettings {
    /// Record schema documents are read with.
    pub schema: SchemaVariant,
    /// Field holding the capture timestamp.
    pub timestamp_field: String,
    /// Record count that arms the composite banner.
    pub expected_count: usize,
    /// How long the count must hold before the banner shows.
    pub banner_delay: Duration,
}

impl Default for GallerySettings {
    fn default() -> Self {
        Self {
            schema: SchemaVariant::default(),
            timestamp_field: TIMESTAMP_FIELD.to_string(),
            expected_count: DEFAULT_EXPECTED_COUNT,
            banner_delay: DEFAULT_BANNER_DELAY,
        }
    }
}

/// The live gallery's state.
#[derive(Debug)]
pub struct GalleryView {
    settings: GallerySettings,
    status: Status,
    records: Vec<ImageSetRecord>,
    banner: BannerGate,
    torn_down: bool,
}

impl GalleryView {
    /// Create a view in the loading state.
    #[must_use]
    pub fn new(settings: GallerySettings) -> Self {
        let banner = BannerGate::new(settings.expected_count, settings.banner_delay);
        Self {
            settings,
            status: Status::Loading,
            records: Vec::new(),
            banner,
            torn_down: false,
        }
    }

    /// Settings the view was built with.
    #[must_use]
    pub fn settings(&self) -> &GallerySettings {
        &self.settings
    }

    /// Apply a delivered snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ViewTornDown`] after [`GalleryView::teardown`].
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot, now: Instant) -> Result<()> {
        self.ensure_live()?;
        self.records = map_documents(
            &snapshot.documents,
            self.settings.schema,
            &self.settings.timestamp_field,
        );
        self.status = Status::Ready;
        self.banner.observe(self.records.len(), now);
        debug!("Applied snapshot with {} records", self.records.len());
        Ok(())
    }

    /// Apply a subscription failure: the list clears as if empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ViewTornDown`] after [`GalleryView::teardown`].
    pub fn apply_error(&mut self, error: &Error, now: Instant) -> Result<()> {
        self.ensure_live()?;
        warn!("Error fetching images: {}", error);
        self.records.clear();
        self.status = Status::Ready;
        self.banner.observe(0, now);
        Ok(())
    }

    /// The banner timer fired. Returns `true` if the banner became visible.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ViewTornDown`] after [`GalleryView::teardown`].
    pub fn fire_banner(&mut self, now: Instant) -> Result<bool> {
        self.ensure_live()?;
        Ok(self.banner.fire(now))
    }

    /// When the banner timer must fire, if it is armed.
    #[must_use]
    pub fn banner_deadline(&self) -> Option<Instant> {
        if self.torn_down {
            None
        } else {
            self.banner.deadline()
        }
    }

    /// Loading or ready.
    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    /// Current records.
    #[must_use]
    pub fn records(&self) -> &[ImageSetRecord] {
        &self.records
    }

    /// Check whether the composite banner is visible.
    #[must_use]
    pub fn show_composite(&self) -> bool {
        self.banner.is_shown()
    }

    /// Copy out the current frame.
    #[must_use]
    pub fn state(&self) -> ViewState {
        ViewState {
            status: self.status,
            records: self.records.clone(),
            show_composite: self.show_composite(),
        }
    }

    /// Stop the view. Pending timers are cancelled and later changes fail.
    pub fn teardown(&mut self) {
        if !self.torn_down {
            self.banner.cancel();
            self.torn_down = true;
            debug!("Gallery view torn down");
        }
    }

    /// Check whether [`GalleryView::teardown`] has run.
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    fn ensure_live(&self) -> Result<()> {
        if self.torn_down {
            Err(Error::ViewTornDown)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Document, Timestamp};

    fn docs(count: usize) -> Vec<Document> {
        (0..count)
            .map(|i| {
                let seconds = 1_700_000_000 - i64::try_from(i).unwrap();
                Document::composite(
                    format!("doc-{i}"),
                    "t.jpg",
                    "d.jpg",
                    "r.jpg",
                    "f.jpg",
                    Some(Timestamp::new(seconds, 0)),
                )
            })
            .collect()
    }

    fn snapshot(count: usize) -> Snapshot {
        Snapshot::new(docs(count))
    }

    fn view() -> GalleryView {
        GalleryView::new(GallerySettings::default())
    }

    #[test]
    fn test_new_view_is_loading() {
        let view = view();
        let state = view.state();
        assert!(state.is_loading());
        assert!(!state.is_empty());
        assert!(state.records.is_empty());
        assert!(!state.show_composite);
    }

    #[test]
    fn test_snapshot_replaces_records_in_order() {
        let mut view = view();
        let now = Instant::now();

        view.apply_snapshot(&snapshot(3), now).unwrap();
        assert_eq!(view.status(), Status::Ready);
        assert_eq!(view.records().len(), 3);

        let next = Snapshot::new(vec![docs(5).remove(4)]);
        view.apply_snapshot(&next, now).unwrap();
        let ids: Vec<_> = view.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["doc-4"]);
    }

    #[test]
    fn test_snapshot_order_is_not_resorted() {
        let mut view = view();
        let mut documents = docs(3);
        documents.reverse();
        view.apply_snapshot(&Snapshot::new(documents), Instant::now())
            .unwrap();

        let ids: Vec<_> = view.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["doc-2", "doc-1", "doc-0"]);
    }

    #[test]
    fn test_empty_snapshot_is_empty_state() {
        let mut view = view();
        view.apply_snapshot(&snapshot(0), Instant::now()).unwrap();
        assert!(view.state().is_empty());
    }

    #[test]
    fn test_error_clears_previous_records() {
        let mut view = view();
        let now = Instant::now();
        view.apply_snapshot(&snapshot(3), now).unwrap();

        view.apply_error(&Error::subscription("images", "unavailable"), now)
            .unwrap();

        let state = view.state();
        assert!(state.is_empty());
        assert!(state.records.is_empty());
    }

    #[test]
    fn test_error_before_first_snapshot_is_ready() {
        let mut view = view();
        view.apply_error(&Error::subscription("images", "denied"), Instant::now())
            .unwrap();
        assert_eq!(view.status(), Status::Ready);
    }

    #[test]
    fn test_banner_shows_after_delay() {
        let mut view = view();
        let now = Instant::now();
        view.apply_snapshot(&snapshot(11), now).unwrap();

        assert_eq!(view.banner_deadline(), Some(now + DEFAULT_BANNER_DELAY));
        assert!(!view.fire_banner(now + Duration::from_millis(1999)).unwrap());
        assert!(view.fire_banner(now + DEFAULT_BANNER_DELAY).unwrap());
        assert!(view.state().show_composite);
    }

    #[test]
    fn test_banner_revoked_by_twelfth_record() {
        let mut view = view();
        let now = Instant::now();
        view.apply_snapshot(&snapshot(11), now).unwrap();
        view.apply_snapshot(&snapshot(12), now + Duration::from_millis(1900))
            .unwrap();

        assert!(view.banner_deadline().is_none());
        assert!(!view.fire_banner(now + DEFAULT_BANNER_DELAY).unwrap());
        assert!(!view.show_composite());
    }

    #[test]
    fn test_error_hides_shown_banner() {
        let mut view = view();
        let now = Instant::now();
        view.apply_snapshot(&snapshot(11), now).unwrap();
        view.fire_banner(now + DEFAULT_BANNER_DELAY).unwrap();
        assert!(view.show_composite());

        view.apply_error(&Error::subscription("images", "x"), now)
            .unwrap();
        assert!(!view.show_composite());
    }

    #[test]
    fn test_custom_threshold() {
        let settings = GallerySettings {
            expected_count: 2,
            banner_delay: Duration::from_secs(1),
            ..GallerySettings::default()
        };
        let mut view = GalleryView::new(settings);
        let now = Instant::now();
        view.apply_snapshot(&snapshot(2), now).unwrap();
        assert!(view.fire_banner(now + Duration::from_secs(1)).unwrap());
    }

    #[test]
    fn test_teardown_rejects_further_changes() {
        let mut view = view();
        let now = Instant::now();
        view.apply_snapshot(&snapshot(11), now).unwrap();

        view.teardown();
        assert!(view.is_torn_down());
        assert!(view.banner_deadline().is_none());

        let err = view.apply_snapshot(&snapshot(1), now).unwrap_err();
        assert!(err.is_view_torn_down());
        assert!(view
            .apply_error(&Error::subscription("images", "x"), now)
            .unwrap_err()
            .is_view_torn_down());
        assert!(view
            .fire_banner(now + DEFAULT_BANNER_DELAY)
            .unwrap_err()
            .is_view_torn_down());
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let mut view = view();
        view.teardown();
        view.teardown();
        assert!(view.is_torn_down());
    }
}
