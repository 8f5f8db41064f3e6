//! The live image gallery.
//!
//! - [`view`] holds the state machine fed by subscription events
//! - [`banner`] gates the composite banner on a stable record count
//! - [`render`] turns a frame into HTML
//! - [`presenter`] writes frames out
//! - [`live`] drives a subscription through all of the above

pub mod banner;
pub mod live;
pub mod presenter;
pub mod render;
pub mod view;

pub use banner::{BannerGate, BannerState};
pub use live::{LiveGallery, RunSummary};
pub use presenter::{HtmlFilePresenter, Presenter, StdoutPresenter, WriterPresenter};
pub use render::{render_fragment, render_page, RenderOptions};
pub use view::{GallerySettings, GalleryView, Status, ViewState};
