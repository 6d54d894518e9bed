//! Render session state and debounced re-render scheduling
//!
//! A [`StampSession`] owns the two pieces of state a live-preview frontend
//! needs: the immutable uploaded document and the last successfully rendered
//! preview. Every render re-parses the source buffer, so regenerating the
//! preview after any number of parameter tweaks produces the same bytes as a
//! single render with the final parameters.
//!
//! [`Debouncer`] handles the scheduling side: parameter changes request a
//! render after a quiet period, and any newer change supersedes a pending
//! request instead of queueing behind it. A render that already started is
//! never interrupted; its result is simply replaced by the next cycle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::Result;
use crate::pdf::composite;
use crate::watermark::WatermarkSpec;

/// One document-editing session: source upload plus last-good preview
#[derive(Debug, Default)]
pub struct StampSession {
    source: Option<Vec<u8>>,
    preview: Option<Vec<u8>>,
}

impl StampSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the uploaded document
    ///
    /// The buffer is read-only for the rest of the session; renders parse a
    /// fresh document from it every time and never write back.
    pub fn load(&mut self, bytes: Vec<u8>) {
        self.source = Some(bytes);
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Last successfully rendered preview, if any
    pub fn preview(&self) -> Option<&[u8]> {
        self.preview.as_deref()
    }

    /// Render with `spec` and install the result as the current preview
    ///
    /// Returns `Ok(None)` when no source has been loaded. On a failed
    /// render the previous preview is left in place; the old buffer is
    /// released only once its replacement exists.
    pub fn render_preview(&mut self, spec: &WatermarkSpec) -> Result<Option<&[u8]>> {
        let source = match &self.source {
            Some(source) => source,
            None => return Ok(None),
        };

        let rendered = composite(source, spec)?;
        self.preview = Some(rendered);

        Ok(self.preview.as_deref())
    }

    /// Render a fresh copy for download; the preview is untouched
    ///
    /// Returns `Ok(None)` when no source has been loaded, which callers
    /// must check before offering the bytes to the user.
    pub fn export(&self, spec: &WatermarkSpec) -> Result<Option<Vec<u8>>> {
        match &self.source {
            Some(source) => composite(source, spec).map(Some),
            None => Ok(None),
        }
    }
}

/// Source of a parameter change, determining its debounce quiet period
///
/// Free-text entry waits out the typing burst, slider drags settle quickly,
/// and a fresh upload renders immediately. The periods are tunables, not
/// correctness properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputClass {
    Upload,
    Text,
    Slider,
}

impl InputClass {
    pub fn quiet_period(&self) -> Duration {
        match self {
            InputClass::Upload => Duration::ZERO,
            InputClass::Text => Duration::from_millis(800),
            InputClass::Slider => Duration::from_millis(150),
        }
    }
}

/// Cancellable-and-replaceable one-shot timer
///
/// Each [`schedule`](Debouncer::schedule) supersedes any pending job that
/// has not fired yet; at most one scheduled job is live at a time. A job
/// whose quiet period already elapsed runs to completion regardless of
/// later schedules.
#[derive(Debug, Default)]
pub struct Debouncer {
    generation: Arc<AtomicU64>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` after `quiet_period`, unless superseded first
    pub fn schedule<F>(&self, quiet_period: Duration, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let expected = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = Arc::clone(&self.generation);

        thread::spawn(move || {
            thread::sleep(quiet_period);
            if generation.load(Ordering::SeqCst) == expected {
                job();
            }
        });
    }

    /// Drop any pending job without scheduling a replacement
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watermark::WatermarkSpec;
    use lopdf::{Dictionary, Document, Object, Stream};
    use std::sync::mpsc;

    /// A valid single-page PDF built in memory
    fn minimal_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");

        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(Dictionary::new(), b"q Q".to_vec()));

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        page.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ]),
        );
        page.set("Contents", Object::Reference(content_id));
        let page_id = doc.add_object(Object::Dictionary(page));

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Count", Object::Integer(1));
        pages.set("Kids", Object::Array(vec![Object::Reference(page_id)]));
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = doc.add_object(Object::Dictionary(catalog));

        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("failed to serialize test PDF");
        bytes
    }

    /// Spec with empty text so tests run without any system font installed
    fn blank_spec() -> WatermarkSpec {
        WatermarkSpec {
            text: String::new(),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_source_renders_absent_result() {
        let mut session = StampSession::new();

        let result = session.render_preview(&blank_spec()).unwrap();
        assert!(result.is_none());
        assert!(session.export(&blank_spec()).unwrap().is_none());
    }

    #[test]
    fn test_render_installs_preview() {
        let mut session = StampSession::new();
        session.load(minimal_pdf());

        assert!(session.preview().is_none());
        let result = session.render_preview(&blank_spec()).unwrap();
        assert!(result.is_some());
        assert!(session.preview().is_some());
    }

    #[test]
    fn test_failed_render_preserves_previous_preview() {
        let mut session = StampSession::new();
        session.load(minimal_pdf());
        session.render_preview(&blank_spec()).unwrap();
        let good_preview = session.preview().unwrap().to_vec();

        session.load(b"not a pdf at all".to_vec());
        assert!(session.render_preview(&blank_spec()).is_err());

        assert_eq!(session.preview().unwrap(), good_preview.as_slice());
    }

    #[test]
    fn test_export_does_not_touch_preview() {
        let mut session = StampSession::new();
        session.load(minimal_pdf());
        session.render_preview(&blank_spec()).unwrap();
        let preview_before = session.preview().unwrap().to_vec();

        let exported = session.export(&blank_spec()).unwrap();
        assert!(exported.is_some());
        assert_eq!(session.preview().unwrap(), preview_before.as_slice());
    }

    #[test]
    fn test_debounce_supersedes_pending_job() {
        let debouncer = Debouncer::new();
        let (tx, rx) = mpsc::channel();

        let tx1 = tx.clone();
        debouncer.schedule(Duration::from_millis(80), move || {
            tx1.send(1).ok();
        });
        debouncer.schedule(Duration::from_millis(80), move || {
            tx.send(2).ok();
        });

        // Only the second job fires
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 2);
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn test_debounce_cancel_drops_pending_job() {
        let debouncer = Debouncer::new();
        let (tx, rx) = mpsc::channel();

        debouncer.schedule(Duration::from_millis(80), move || {
            tx.send(()).ok();
        });
        debouncer.cancel();

        assert!(rx.recv_timeout(Duration::from_millis(400)).is_err());
    }

    #[test]
    fn test_quiet_periods_ranked_by_input_class() {
        assert!(InputClass::Text.quiet_period() > InputClass::Slider.quiet_period());
        assert!(InputClass::Slider.quiet_period() > InputClass::Upload.quiet_period());
        assert_eq!(InputClass::Upload.quiet_period(), Duration::ZERO);
    }
}
