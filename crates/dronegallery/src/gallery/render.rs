//! HTML rendering of gallery frames.

use super::view::ViewState;
use crate::record::{ImageSet, ImageSetRecord, ImageSlot, SlotKind};

/// Heading shown above the gallery.
pub const DEFAULT_TITLE: &str = "Team 5 Drone Assisted Mine Detection";

/// Text of the composite banner.
pub const DEFAULT_BANNER_TEXT: &str = "2 MINES DETECTED";

/// Capture-time format (`HH:mm:ss`).
pub const DEFAULT_TIME_FORMAT: &str = "%H:%M:%S";

/// Shown while waiting for the first delivery.
pub const LOADING_TEXT: &str = "Loading images...";

/// Shown when the collection is empty or unreachable.
pub const EMPTY_TEXT: &str = "No Images Available At The Moment";

const STYLE: &str = r"
body { font-family: sans-serif; background: #f4f4f4; margin: 0; }
.gallery { max-width: 960px; margin: 20px auto; text-align: center; }
.loading { margin: 40px auto; width: 40px; height: 40px; border: 4px solid #ccc; border-top-color: #1976d2; border-radius: 50%; animation: spin 1s linear infinite; }
@keyframes spin { to { transform: rotate(360deg); } }
.empty { color: #666; }
.composite-banner { margin: 12px 0; padding: 12px; border-radius: 16px; background: #b71c1c; color: #fff; font-weight: bold; letter-spacing: 0.05em; }
.record { margin-bottom: 20px; padding: 10px; border-radius: 16px; background: #fff; box-shadow: 0 4px 12px rgba(0, 0, 0, 0.2); overflow: hidden; }
.set { display: flex; gap: 20px; align-items: center; }
.triptych { display: flex; flex: 3; gap: 10px; }
.slot { flex: 1; margin: 0; border-radius: 16px; overflow: hidden; }
.slot img { width: 100%; height: auto; max-height: 200px; object-fit: contain; }
.slot-combined img { max-height: 400px; }
.slot-fused { padding: 10px; box-shadow: 0 4px 12px rgba(0, 0, 0, 0.2); }
.missing { padding: 40px 0; color: #999; }
.caption { color: #666; }
";

/// Text and format options for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Page heading.
    pub title: String,
    /// Composite banner text.
    pub banner_text: String,
    /// strftime pattern for capture times.
    pub time_format: String,
    /// Seconds between browser reloads of a full page; 0 disables.
    pub refresh_secs: u64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            banner_text: DEFAULT_BANNER_TEXT.to_string(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            refresh_secs: 0,
        }
    }
}

/// Escape text for use in HTML content and quoted attributes.
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render one frame as an HTML fragment.
#[must_use]
pub fn render_fragment(state: &ViewState, options: &RenderOptions) -> String {
    let mut out = String::new();
    out.push_str("<section class=\"gallery\">\n");
    out.push_str(&format!("<h3>{}</h3>\n", escape_html(&options.title)));

    if state.is_loading() {
        out.push_str(&format!(
            "<div class=\"loading\" role=\"progressbar\" aria-label=\"{LOADING_TEXT}\"></div>\n"
        ));
    } else if state.records.is_empty() {
        out.push_str(&format!("<h6 class=\"empty\">{EMPTY_TEXT}</h6>\n"));
    } else {
        if state.show_composite {
            out.push_str(&format!(
                "<div class=\"composite-banner\" role=\"status\">Composite: {}</div>\n",
                escape_html(&options.banner_text)
            ));
        }
        out.push_str("<div class=\"records\">\n");
        for (index, record) in state.records.iter().enumerate() {
            render_record(&mut out, index + 1, record, options);
        }
        out.push_str("</div>\n");
    }

    out.push_str("</section>\n");
    out
}

/// Render one frame as a standalone HTML page.
#[must_use]
pub fn render_page(state: &ViewState, options: &RenderOptions) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    if options.refresh_secs > 0 {
        out.push_str(&format!(
            "<meta http-equiv=\"refresh\" content=\"{}\">\n",
            options.refresh_secs
        ));
    }
    out.push_str(&format!(
        "<title>{}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n",
        escape_html(&options.title)
    ));
    out.push_str(&render_fragment(state, options));
    out.push_str("</body>\n</html>\n");
    out
}

fn render_record(out: &mut String, number: usize, record: &ImageSetRecord, options: &RenderOptions) {
    let caption = escape_html(&record.caption(&options.time_format));
    out.push_str(&format!(
        "<article class=\"record\" data-id=\"{}\">\n",
        escape_html(&record.id)
    ));

    match &record.images {
        ImageSet::Single { .. } => {
            for slot in record.images.slots() {
                render_slot(out, number, slot, false);
            }
            out.push_str(&format!("<p class=\"caption\">{caption}</p>\n"));
        }
        ImageSet::Composite { .. } => {
            out.push_str(&format!("<h6 class=\"caption\">{caption}</h6>\n"));
            out.push_str("<div class=\"set\">\n<div class=\"triptych\">\n");
            let slots = record.images.slots();
            let (fused, others): (Vec<_>, Vec<_>) =
                slots.into_iter().partition(|s| s.kind == SlotKind::Fused);
            for slot in others {
                render_slot(out, number, slot, true);
            }
            out.push_str("</div>\n");
            for slot in fused {
                render_slot(out, number, slot, true);
            }
            out.push_str("</div>\n");
        }
    }

    out.push_str("</article>\n");
}

fn slot_class(kind: SlotKind) -> &'static str {
    match kind {
        SlotKind::Combined => "combined",
        SlotKind::Thermal => "thermal",
        SlotKind::Depth => "depth",
        SlotKind::Rgb => "rgb",
        SlotKind::Fused => "fused",
    }
}

fn render_slot(out: &mut String, number: usize, slot: ImageSlot<'_>, labelled: bool) {
    let label = slot.kind.label();
    out.push_str(&format!(
        "<figure class=\"slot slot-{}\">\n",
        slot_class(slot.kind)
    ));
    if labelled {
        out.push_str(&format!("<figcaption>{label}</figcaption>\n"));
    }
    match slot.url {
        Some(url) => out.push_str(&format!(
            "<img src=\"{}\" alt=\"{label} {number}\">\n",
            escape_html(url)
        )),
        None => out.push_str("<div class=\"missing\">No image</div>\n"),
    }
    out.push_str("</figure>\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::view::Status;
    use crate::record::{Document, SchemaVariant, Timestamp, TIMESTAMP_FIELD};

    fn composite_record(id: &str, timestamp: Option<Timestamp>) -> ImageSetRecord {
        let doc = Document::composite(
            id,
            "https://img/thermal.jpg",
            "https://img/depth.jpg",
            "https://img/rgb.jpg",
            "https://img/fuse.jpg",
            timestamp,
        );
        ImageSetRecord::from_document(&doc, SchemaVariant::Composite, TIMESTAMP_FIELD)
    }

    fn ready(records: Vec<ImageSetRecord>, show_composite: bool) -> ViewState {
        ViewState {
            status: Status::Ready,
            records,
            show_composite,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">&'"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_loading_frame() {
        let html = render_fragment(&ViewState::default(), &RenderOptions::default());
        assert!(html.contains("class=\"loading\""));
        assert!(!html.contains(EMPTY_TEXT));
        assert!(html.contains(DEFAULT_TITLE));
    }

    #[test]
    fn test_empty_frame() {
        let html = render_fragment(&ready(Vec::new(), false), &RenderOptions::default());
        assert!(html.contains("No Images Available At The Moment"));
        assert!(!html.contains("class=\"loading\""));
    }

    #[test]
    fn test_record_without_timestamp_is_unknown() {
        let state = ready(vec![composite_record("a", None)], false);
        let html = render_fragment(&state, &RenderOptions::default());

        assert!(html.contains("Uploaded on: Unknown"));
        assert!(html.contains("src=\"https://img/thermal.jpg\""));
        assert!(html.contains("src=\"https://img/fuse.jpg\""));
    }

    #[test]
    fn test_composite_record_has_four_labelled_slots() {
        let state = ready(vec![composite_record("a", Some(Timestamp::now()))], false);
        let html = render_fragment(&state, &RenderOptions::default());

        for label in ["Thermal", "Depth", "RGB", "Fused"] {
            assert!(html.contains(&format!("<figcaption>{label}</figcaption>")));
        }
        assert_eq!(html.matches("<img ").count(), 4);
        assert!(html.contains("alt=\"Thermal 1\""));
        assert!(html.contains("slot-fused"));
    }

    #[test]
    fn test_single_record_has_one_slot() {
        let doc = Document::single("a", "https://img/a.jpg", None);
        let record = ImageSetRecord::from_document(&doc, SchemaVariant::Single, TIMESTAMP_FIELD);
        let html = render_fragment(&ready(vec![record], false), &RenderOptions::default());

        assert_eq!(html.matches("<img ").count(), 1);
        assert!(html.contains("slot-combined"));
        assert!(html.contains("<p class=\"caption\">Uploaded on: Unknown</p>"));
    }

    #[test]
    fn test_missing_url_renders_placeholder() {
        let doc = Document::new("a").with_field("thermal", "t.jpg");
        let record = ImageSetRecord::from_document(&doc, SchemaVariant::Composite, TIMESTAMP_FIELD);
        let html = render_fragment(&ready(vec![record], false), &RenderOptions::default());

        assert_eq!(html.matches("<img ").count(), 1);
        assert_eq!(html.matches("No image").count(), 3);
    }

    #[test]
    fn test_records_render_in_given_order() {
        let state = ready(
            vec![composite_record("second", None), composite_record("first", None)],
            false,
        );
        let html = render_fragment(&state, &RenderOptions::default());
        let second = html.find("data-id=\"second\"").unwrap();
        let first = html.find("data-id=\"first\"").unwrap();
        assert!(second < first);
    }

    #[test]
    fn test_banner_only_when_shown() {
        let records = vec![composite_record("a", None)];
        let hidden = render_fragment(&ready(records.clone(), false), &RenderOptions::default());
        let shown = render_fragment(&ready(records, true), &RenderOptions::default());

        assert!(!hidden.contains("2 MINES DETECTED"));
        assert!(shown.contains("2 MINES DETECTED"));
        assert!(shown.contains("composite-banner"));
    }

    #[test]
    fn test_attributes_are_escaped() {
        let doc = Document::single("a\"b", "https://img/x.jpg?a=1&b=\"2\"", None);
        let record = ImageSetRecord::from_document(&doc, SchemaVariant::Single, TIMESTAMP_FIELD);
        let html = render_fragment(&ready(vec![record], false), &RenderOptions::default());

        assert!(html.contains("data-id=\"a&quot;b\""));
        assert!(html.contains("src=\"https://img/x.jpg?a=1&amp;b=&quot;2&quot;\""));
    }

    #[test]
    fn test_page_refresh_meta() {
        let mut options = RenderOptions::default();
        let page = render_page(&ViewState::default(), &options);
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(!page.contains("http-equiv"));

        options.refresh_secs = 2;
        let page = render_page(&ViewState::default(), &options);
        assert!(page.contains("<meta http-equiv=\"refresh\" content=\"2\">"));
    }
}
