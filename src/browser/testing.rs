//! Scripted page drivers for tests.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Luma};
use tokio::time::Instant;
use url::Url;

use crate::app::error::RenderError;
use crate::browser::{DriverFactory, PageDriver, PageProbe};

type ProbeFn = dyn Fn(Duration) -> Result<PageProbe, RenderError> + Send + Sync;
type TextFn = dyn Fn(Duration) -> String + Send + Sync;

/// Paginated viewer state
#[derive(Debug, Default)]
pub(crate) struct Viewer {
    pub real_pages: u32,
    pub reported_total: Option<u32>,
    pub page_height: u64,
    pub viewport: u32,
    pub current_page: u32,
    pub offset: u64,
    /// `(page, offset)` of every capture, in order
    pub captures: Vec<(u32, u64)>,
    pub ui_suppressed: bool,
    pub advances: u32,
    /// Screenshots of this page fail
    pub broken_page: Option<u32>,
}

struct Inner {
    start: Instant,
    probe: Box<ProbeFn>,
    text: Box<TextFn>,
    viewer: Mutex<Viewer>,
    navigations: AtomicUsize,
    closed: AtomicBool,
    extract_delay_ms: AtomicU64,
}

/// A page whose state is a function of time since creation
#[derive(Clone)]
pub(crate) struct FakePage {
    inner: Arc<Inner>,
}

impl FakePage {
    pub fn timeline(
        probe: impl Fn(Duration) -> Result<PageProbe, RenderError> + Send + Sync + 'static,
        text: impl Fn(Duration) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                start: Instant::now(),
                probe: Box::new(probe),
                text: Box::new(text),
                viewer: Mutex::new(Viewer::default()),
                navigations: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
                extract_delay_ms: AtomicU64::new(0),
            }),
        }
    }

    /// A ready page showing `pages` pages of `page_height` pixels each
    pub fn viewer(pages: u32, reported_total: Option<u32>, page_height: u64, viewport: u32) -> Self {
        let page = Self::timeline(
            |_| {
                Ok(PageProbe {
                    key_element_found: true,
                    text_len: 10,
                    ..Default::default()
                })
            },
            |_| String::new(),
        );
        {
            let mut viewer = page.viewer_state();
            viewer.real_pages = pages;
            viewer.reported_total = reported_total;
            viewer.page_height = page_height;
            viewer.viewport = viewport;
            viewer.current_page = 1;
        }
        page
    }

    /// Make every text extraction take `delay`
    pub fn with_extract_delay(self, delay: Duration) -> Self {
        self.inner
            .extract_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
        self
    }

    pub fn viewer_state(&self) -> std::sync::MutexGuard<'_, Viewer> {
        self.inner.viewer.lock().unwrap()
    }

    pub fn navigations(&self) -> usize {
        self.inner.navigations.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn elapsed(&self) -> Duration {
        Instant::now() - self.inner.start
    }

    fn check_open(&self) -> Result<(), RenderError> {
        if self.is_closed() {
            Err(RenderError::WorkerGone)
        } else {
            Ok(())
        }
    }
}

/// A small valid PNG
pub(crate) fn tiny_png() -> Vec<u8> {
    let img = image::GrayImage::from_pixel(8, 8, Luma([200u8]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

#[async_trait]
impl PageDriver for FakePage {
    async fn navigate(&self, _url: &Url) -> Result<(), RenderError> {
        self.check_open()?;
        self.inner.navigations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn probe(&self, _key_selectors: &[String]) -> Result<PageProbe, RenderError> {
        self.check_open()?;
        (self.inner.probe)(self.elapsed())
    }

    async fn extract_text(&self) -> Result<String, RenderError> {
        self.check_open()?;
        let delay = self.inner.extract_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok((self.inner.text)(self.elapsed()))
    }

    async fn suppress_ui(&self, _selectors: &[String], _zoom: f64) -> Result<(), RenderError> {
        self.viewer_state().ui_suppressed = true;
        Ok(())
    }

    async fn page_indicator(&self) -> Result<Option<String>, RenderError> {
        let viewer = self.viewer_state();
        Ok(viewer
            .reported_total
            .map(|total| format!("{} / {}", viewer.current_page, total)))
    }

    async fn scroll_to_top(&self) -> Result<(), RenderError> {
        self.viewer_state().offset = 0;
        Ok(())
    }

    async fn scroll_by(&self, dy: u32) -> Result<u64, RenderError> {
        let mut viewer = self.viewer_state();
        let max_offset = viewer.page_height.saturating_sub(viewer.viewport as u64);
        viewer.offset = (viewer.offset + dy as u64).min(max_offset);
        Ok(viewer.offset)
    }

    async fn viewport_height(&self) -> Result<u32, RenderError> {
        Ok(self.viewer_state().viewport)
    }

    async fn capture(&self) -> Result<Vec<u8>, RenderError> {
        self.check_open()?;
        let mut viewer = self.viewer_state();
        if viewer.broken_page == Some(viewer.current_page) {
            return Err(RenderError::Capture(format!("page {} did not paint", viewer.current_page)));
        }
        let shot = (viewer.current_page, viewer.offset);
        viewer.captures.push(shot);
        Ok(tiny_png())
    }

    async fn advance_page(&self, _selectors: &[String], _fallback_key: &str) -> Result<(), RenderError> {
        let mut viewer = self.viewer_state();
        viewer.advances += 1;
        if viewer.current_page < viewer.real_pages {
            viewer.current_page += 1;
            viewer.offset = 0;
        }
        Ok(())
    }

    async fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }
}

/// Hands out clones of one fake page and counts launches
pub(crate) struct FakeFactory {
    page: Option<FakePage>,
    pub launches: AtomicUsize,
}

impl FakeFactory {
    pub fn new(page: FakePage) -> Self {
        Self {
            page: Some(page),
            launches: AtomicUsize::new(0),
        }
    }

    /// A factory whose browser never starts
    pub fn broken() -> Self {
        Self {
            page: None,
            launches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DriverFactory for FakeFactory {
    async fn launch(&self) -> Result<Box<dyn PageDriver>, RenderError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        match &self.page {
            Some(page) => Ok(Box::new(page.clone())),
            None => Err(RenderError::Launch("no browser in tests".to_string())),
        }
    }
}
