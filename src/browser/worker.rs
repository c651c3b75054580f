use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent, RequestId,
};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, CaptureScreenshotParams};
use chromiumoxide::Page;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::app::error::RenderError;
use crate::browser::{scripts, DriverFactory, PageDriver, PageProbe};
use crate::config::BrowserSettings;

type Reply<T> = oneshot::Sender<Result<T, RenderError>>;

/// Requests understood by the browser worker
enum BrowserCommand {
    Navigate { url: Url, reply: Reply<()> },
    Evaluate { script: String, reply: Reply<serde_json::Value> },
    Capture { reply: Reply<Vec<u8>> },
    PressKey { key: String, reply: Reply<()> },
    NetworkStatus { reply: oneshot::Sender<(usize, Duration)> },
    Close { reply: oneshot::Sender<()> },
}

/// In-flight requests seen through CDP network events
struct NetworkTracker {
    in_flight: HashSet<RequestId>,
    last_activity: Instant,
}

impl NetworkTracker {
    fn new() -> Self {
        Self {
            in_flight: HashSet::new(),
            last_activity: Instant::now(),
        }
    }
}

type SharedTracker = Arc<Mutex<NetworkTracker>>;

fn track(tracker: &SharedTracker, id: RequestId, started: bool) {
    if let Ok(mut t) = tracker.lock() {
        if started {
            t.in_flight.insert(id);
        } else {
            t.in_flight.remove(&id);
        }
        t.last_activity = Instant::now();
    }
}

/// Launches one Chrome process per request
pub struct ChromeFactory {
    settings: BrowserSettings,
    user_agent: String,
}

impl ChromeFactory {
    pub fn new(settings: BrowserSettings, user_agent: String) -> Self {
        Self {
            settings,
            user_agent,
        }
    }
}

#[async_trait]
impl DriverFactory for ChromeFactory {
    async fn launch(&self) -> Result<Box<dyn PageDriver>, RenderError> {
        let driver = BrowserWorker::spawn(&self.settings, &self.user_agent).await?;
        Ok(Box::new(driver))
    }
}

/// Owns the browser, its page and the CDP event tasks
struct BrowserWorker {
    browser: Browser,
    page: Page,
    tracker: SharedTracker,
    tasks: Vec<JoinHandle<()>>,
    rx: mpsc::Receiver<BrowserCommand>,
}

impl BrowserWorker {
    async fn spawn(settings: &BrowserSettings, user_agent: &str) -> Result<ChromeDriver, RenderError> {
        let mut builder = BrowserConfig::builder().window_size(settings.window_width, settings.window_height);
        for arg in &settings.launch_args {
            builder = builder.arg(arg.as_str());
        }
        if !settings.headless {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(|e| RenderError::Launch(format!("Failed to build browser config: {}", e)))?;

        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        let mut tasks = vec![tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {}", e);
                }
            }
        })];

        let page = match Self::prepare_page(&browser, settings, user_agent, &mut tasks).await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                tasks.iter().for_each(JoinHandle::abort);
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::channel(16);
        let worker = Self {
            browser,
            page,
            tracker: Arc::new(Mutex::new(NetworkTracker::new())),
            tasks,
            rx,
        };
        let handle = tokio::spawn(worker.run());
        info!("Browser worker started");

        Ok(ChromeDriver {
            tx,
            command_timeout: settings.command_timeout(),
            worker: Mutex::new(Some(handle)),
        })
    }

    async fn prepare_page(
        browser: &Browser,
        settings: &BrowserSettings,
        user_agent: &str,
        tasks: &mut Vec<JoinHandle<()>>,
    ) -> Result<Page, RenderError> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::Launch(format!("Failed to create page: {}", e)))?;

        page.set_user_agent(user_agent)
            .await
            .map_err(|e| RenderError::Launch(format!("Failed to set user agent: {}", e)))?;

        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(settings.window_width as i64)
            .height(settings.window_height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(RenderError::Launch)?;
        page.execute(metrics)
            .await
            .map_err(|e| RenderError::Launch(format!("Failed to set viewport: {}", e)))?;

        Ok(page)
    }

    /// Subscribe to request lifecycle events so network idleness can be judged
    async fn watch_network(&mut self) -> Result<(), RenderError> {
        let listen_err = |e: chromiumoxide::error::CdpError| {
            RenderError::Launch(format!("Failed to subscribe to network events: {}", e))
        };

        let mut sent = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(listen_err)?;
        let mut finished = self
            .page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(listen_err)?;
        let mut failed = self
            .page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(listen_err)?;

        let tracker = self.tracker.clone();
        self.tasks.push(tokio::spawn(async move {
            while let Some(event) = sent.next().await {
                track(&tracker, event.request_id.clone(), true);
            }
        }));
        let tracker = self.tracker.clone();
        self.tasks.push(tokio::spawn(async move {
            while let Some(event) = finished.next().await {
                track(&tracker, event.request_id.clone(), false);
            }
        }));
        let tracker = self.tracker.clone();
        self.tasks.push(tokio::spawn(async move {
            while let Some(event) = failed.next().await {
                track(&tracker, event.request_id.clone(), false);
            }
        }));
        Ok(())
    }

    async fn run(mut self) {
        if let Err(e) = self.watch_network().await {
            warn!("{}; network idle detection disabled", e);
        }

        let mut close_reply = None;
        while let Some(command) = self.rx.recv().await {
            match command {
                BrowserCommand::Navigate { url, reply } => {
                    if let Ok(mut t) = self.tracker.lock() {
                        t.in_flight.clear();
                        t.last_activity = Instant::now();
                    }
                    let result = self
                        .page
                        .goto(url.as_str())
                        .await
                        .map(|_| ())
                        .map_err(|e| RenderError::Navigation(e.to_string()));
                    let _ = reply.send(result);
                }
                BrowserCommand::Evaluate { script, reply } => {
                    let _ = reply.send(self.evaluate(script).await);
                }
                BrowserCommand::Capture { reply } => {
                    let params = CaptureScreenshotParams {
                        format: Some(CaptureScreenshotFormat::Png),
                        ..Default::default()
                    };
                    let result = self
                        .page
                        .screenshot(params)
                        .await
                        .map_err(|e| RenderError::Capture(e.to_string()));
                    let _ = reply.send(result);
                }
                BrowserCommand::PressKey { key, reply } => {
                    let _ = reply.send(self.press_key(&key).await);
                }
                BrowserCommand::NetworkStatus { reply } => {
                    let status = match self.tracker.lock() {
                        Ok(t) => (t.in_flight.len(), t.last_activity.elapsed()),
                        Err(_) => (0, Duration::ZERO),
                    };
                    let _ = reply.send(status);
                }
                BrowserCommand::Close { reply } => {
                    close_reply = Some(reply);
                    break;
                }
            }
        }

        self.shutdown().await;
        if let Some(reply) = close_reply {
            let _ = reply.send(());
        }
    }

    async fn evaluate(&self, script: String) -> Result<serde_json::Value, RenderError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| RenderError::Script(e.to_string()))?
            .into_value()
            .map_err(|e| RenderError::Script(format!("Failed to parse result: {:?}", e)))
    }

    async fn press_key(&self, key: &str) -> Result<(), RenderError> {
        let body = self
            .page
            .find_element("body")
            .await
            .map_err(|e| RenderError::Script(e.to_string()))?;
        body.press_key(key)
            .await
            .map_err(|e| RenderError::Script(e.to_string()))?;
        Ok(())
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.browser.close().await {
            debug!("Browser close failed: {}", e);
        }
        let _ = self.browser.wait().await;
        for task in &self.tasks {
            task.abort();
        }
        info!("Browser worker stopped");
    }
}

/// Handle used by the tiers. Dropping it kills the worker.
pub struct ChromeDriver {
    tx: mpsc::Sender<BrowserCommand>,
    command_timeout: Duration,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ChromeDriver {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> BrowserCommand) -> Result<T, RenderError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| RenderError::WorkerGone)?;

        match tokio::time::timeout(self.command_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RenderError::WorkerGone),
            Err(_) => Err(RenderError::Timeout(format!(
                "no reply within {:?}",
                self.command_timeout
            ))),
        }
    }

    async fn evaluate(&self, script: String) -> Result<serde_json::Value, RenderError> {
        self.request(|reply| BrowserCommand::Evaluate { script, reply }).await
    }

    async fn network_status(&self) -> Result<(usize, Duration), RenderError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(BrowserCommand::NetworkStatus { reply: reply_tx })
            .await
            .map_err(|_| RenderError::WorkerGone)?;
        match tokio::time::timeout(self.command_timeout, reply_rx).await {
            Ok(Ok(status)) => Ok(status),
            Ok(Err(_)) => Err(RenderError::WorkerGone),
            Err(_) => Err(RenderError::Timeout("network status".to_string())),
        }
    }

    fn kill(&self) {
        if let Ok(mut worker) = self.worker.lock() {
            if let Some(handle) = worker.take() {
                handle.abort();
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProbeResult {
    key_found: bool,
    text_len: usize,
    height: f64,
}

#[derive(Deserialize)]
struct ExtractionResult {
    text: String,
    selector: Option<String>,
}

#[derive(Deserialize)]
struct IndicatorResult {
    indicator: Option<String>,
}

#[derive(Deserialize)]
struct ClickResult {
    clicked: Option<String>,
}

fn parse<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, RenderError> {
    serde_json::from_value(value).map_err(|e| RenderError::Script(format!("Unexpected script result: {}", e)))
}

fn as_number(value: &serde_json::Value) -> Result<f64, RenderError> {
    value
        .as_f64()
        .ok_or_else(|| RenderError::Script(format!("Expected a number, got {}", value)))
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn navigate(&self, url: &Url) -> Result<(), RenderError> {
        debug!("Navigating to {}", url);
        let url = url.clone();
        self.request(|reply| BrowserCommand::Navigate { url, reply }).await
    }

    async fn probe(&self, key_selectors: &[String]) -> Result<PageProbe, RenderError> {
        let result: ProbeResult = parse(self.evaluate(scripts::probe_script(key_selectors)).await?)?;
        let (in_flight, idle_for) = self.network_status().await?;
        Ok(PageProbe {
            in_flight,
            idle_for,
            key_element_found: result.key_found,
            text_len: result.text_len,
            height: result.height.max(0.0) as u64,
        })
    }

    async fn extract_text(&self) -> Result<String, RenderError> {
        let result: ExtractionResult = parse(self.evaluate(scripts::extraction_script()).await?)?;
        debug!(
            "Extracted {} chars from {}",
            result.text.chars().count(),
            result.selector.as_deref().unwrap_or("nothing")
        );
        Ok(result.text)
    }

    async fn suppress_ui(&self, selectors: &[String], zoom: f64) -> Result<(), RenderError> {
        let hidden = self.evaluate(scripts::suppress_ui_script(selectors, zoom)).await?;
        debug!("Hid {} viewer elements", hidden);
        Ok(())
    }

    async fn page_indicator(&self) -> Result<Option<String>, RenderError> {
        let result: IndicatorResult = parse(self.evaluate(scripts::page_indicator_script()).await?)?;
        Ok(result.indicator)
    }

    async fn scroll_to_top(&self) -> Result<(), RenderError> {
        self.evaluate(scripts::SCROLL_TO_TOP.to_string()).await?;
        Ok(())
    }

    async fn scroll_by(&self, dy: u32) -> Result<u64, RenderError> {
        let offset = as_number(&self.evaluate(scripts::scroll_by_script(dy)).await?)?;
        Ok(offset.max(0.0) as u64)
    }

    async fn viewport_height(&self) -> Result<u32, RenderError> {
        let height = as_number(&self.evaluate(scripts::VIEWPORT_HEIGHT.to_string()).await?)?;
        Ok(height.max(0.0) as u32)
    }

    async fn capture(&self) -> Result<Vec<u8>, RenderError> {
        self.request(|reply| BrowserCommand::Capture { reply }).await
    }

    async fn advance_page(&self, selectors: &[String], fallback_key: &str) -> Result<(), RenderError> {
        let result: ClickResult = parse(self.evaluate(scripts::click_first_script(selectors)).await?)?;
        match result.clicked {
            Some(selector) => {
                debug!("Clicked next-page control {}", selector);
                Ok(())
            }
            None => {
                debug!("No next-page control, pressing {}", fallback_key);
                let key = fallback_key.to_string();
                self.request(|reply| BrowserCommand::PressKey { key, reply }).await
            }
        }
    }

    async fn close(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(BrowserCommand::Close { reply: reply_tx }).await.is_ok()
            && tokio::time::timeout(self.command_timeout, reply_rx).await.is_ok()
        {
            if let Ok(mut worker) = self.worker.lock() {
                worker.take();
            }
            return;
        }
        warn!("Browser worker did not shut down cleanly, killing it");
        self.kill();
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        self.kill();
    }
}
