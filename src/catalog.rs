// Background catalog: the built-in "no background" entry plus whatever the
// remote service lists as active, with decoded images cached per URL.
// Visual: the sidebar list; entries show "loading" until their image is decoded,
// and a selected entry only replaces the background once its image is ready.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use image::imageops::{self, FilterType};

use crate::api::{BackgroundRecord, KioskService};
use crate::error::Error;
use crate::types::FrameBuffer;

pub const BUILT_IN_ID: &str = "none";
pub const BUILT_IN_NAME: &str = "No background";

/// Fetches the raw bytes behind a background's `source_url`.
pub trait ImageLoader: Send + Sync {
    fn load(&self, source: &str) -> Result<Vec<u8>, Error>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    BuiltIn,
    Remote,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackgroundEntry {
    pub id: String,
    pub name: String,
    /// `None` = show the camera feed as-is.
    pub source_url: Option<String>,
    pub origin: Origin,
}

impl BackgroundEntry {
    pub fn built_in() -> Self {
        Self {
            id: BUILT_IN_ID.to_string(),
            name: BUILT_IN_NAME.to_string(),
            source_url: None,
            origin: Origin::BuiltIn,
        }
    }

    pub fn remote(record: &BackgroundRecord, url: String) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            source_url: Some(url),
            origin: Origin::Remote,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreloadStatus {
    /// Built-in entry, nothing to decode.
    NotNeeded,
    Pending,
    Ready,
    /// Decode failed; permanent for this URL.
    Failed,
}

struct Preloaded {
    url: String,
    result: Result<FrameBuffer, Error>,
}

type FeedResult = Result<Vec<BackgroundEntry>, Error>;

pub struct BackgroundCatalog {
    entries: Vec<BackgroundEntry>,
    selected: usize,
    output: (usize, usize),
    loader: Arc<dyn ImageLoader>,
    images: HashMap<String, FrameBuffer>,
    in_flight: HashSet<String>,
    failed: HashSet<String>,
    tx: Sender<Preloaded>,
    rx: Receiver<Preloaded>,
    feed: Option<Receiver<FeedResult>>,
}

/// Decode `bytes` and stretch to the output size once, off the render path.
pub fn decode_background(bytes: &[u8], width: usize, height: usize) -> Result<FrameBuffer, Error> {
    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    let stretched = if rgb.dimensions() == (width as u32, height as u32) {
        rgb
    } else {
        imageops::resize(&rgb, width as u32, height as u32, FilterType::Triangle)
    };
    Ok(FrameBuffer::from_rgb_image(&stretched))
}

impl BackgroundCatalog {
    /// Catalog with just the built-in entry, selected.
    /// Decoded images are stretched to `output_width` x `output_height`.
    pub fn new(output_width: usize, output_height: usize, loader: Arc<dyn ImageLoader>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            entries: vec![BackgroundEntry::built_in()],
            selected: 0,
            output: (output_width, output_height),
            loader,
            images: HashMap::new(),
            in_flight: HashSet::new(),
            failed: HashSet::new(),
            tx,
            rx,
            feed: None,
        }
    }

    pub fn list_backgrounds(&self) -> &[BackgroundEntry] {
        &self.entries
    }

    /// Fetch the remote feed on a worker thread; `poll` picks the result up.
    pub fn start_fetch(&mut self, service: Arc<dyn KioskService>) {
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("backgrounds-feed".into())
            .spawn(move || {
                let result = service.fetch_backgrounds().map(|records| {
                    records
                        .iter()
                        .filter(|r| r.is_active)
                        .map(|r| BackgroundEntry::remote(r, service.image_url(r)))
                        .collect()
                });
                let _ = tx.send(result);
            });
        match spawned {
            Ok(_) => self.feed = Some(rx),
            Err(e) => tracing::warn!(error = %e, "could not start backgrounds fetch"),
        }
    }

    /// Append active remote records in the order received. Returns how many were added.
    pub fn extend_remote(&mut self, entries: Vec<BackgroundEntry>) -> usize {
        let mut added = 0;
        for entry in entries {
            if entry.source_url.is_none() || self.entries.iter().any(|e| e.id == entry.id) {
                tracing::warn!(id = %entry.id, "skipping background entry (duplicate id or no image)");
                continue;
            }
            self.entries.push(entry);
            added += 1;
        }
        added
    }

    /// Start decoding every image that is not cached, failed or already in flight.
    /// One worker per entry; a failure only affects its own URL.
    pub fn preload(&mut self) {
        let (w, h) = self.output;
        let urls: Vec<String> = self
            .entries
            .iter()
            .filter_map(|e| e.source_url.clone())
            .filter(|u| !self.images.contains_key(u) && !self.failed.contains(u) && !self.in_flight.contains(u))
            .collect();

        for url in urls {
            let loader = Arc::clone(&self.loader);
            let tx = self.tx.clone();
            let job_url = url.clone();
            let spawned = thread::Builder::new()
                .name("background-decode".into())
                .spawn(move || {
                    let result = loader
                        .load(&job_url)
                        .and_then(|bytes| decode_background(&bytes, w, h));
                    // Receiver gone means the catalog was dropped; nothing to do.
                    let _ = tx.send(Preloaded { url: job_url, result });
                });
            match spawned {
                Ok(_) => {
                    self.in_flight.insert(url);
                }
                Err(e) => {
                    tracing::warn!(%url, error = %e, "could not start background decode");
                    self.failed.insert(url);
                }
            }
        }
    }

    /// Collect finished fetches/decodes without blocking. Call once per tick.
    /// Returns true when anything changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;

        if let Some(feed) = &self.feed {
            match feed.try_recv() {
                Ok(Ok(entries)) => {
                    let added = self.extend_remote(entries);
                    tracing::info!(added, "remote backgrounds loaded");
                    self.feed = None;
                    self.preload();
                    changed = true;
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "backgrounds feed unavailable, using built-in only");
                    self.feed = None;
                    changed = true;
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => self.feed = None,
            }
        }

        while let Ok(done) = self.rx.try_recv() {
            self.in_flight.remove(&done.url);
            match done.result {
                Ok(img) => {
                    tracing::debug!(url = %done.url, "background ready");
                    self.images.insert(done.url, img);
                }
                Err(e) => {
                    tracing::warn!(url = %done.url, error = %e, "background failed to load");
                    self.failed.insert(done.url);
                }
            }
            changed = true;
        }

        changed
    }

    pub fn is_fetching(&self) -> bool {
        self.feed.is_some()
    }

    pub fn status(&self, entry: &BackgroundEntry) -> PreloadStatus {
        match &entry.source_url {
            None => PreloadStatus::NotNeeded,
            Some(url) if self.images.contains_key(url) => PreloadStatus::Ready,
            Some(url) if self.failed.contains(url) => PreloadStatus::Failed,
            Some(_) => PreloadStatus::Pending,
        }
    }

    /// Select by id; an unknown id selects (and returns) the built-in entry.
    pub fn select(&mut self, entry_id: &str) -> &BackgroundEntry {
        self.selected = match self.entries.iter().position(|e| e.id == entry_id) {
            Some(idx) => idx,
            None => {
                tracing::warn!(entry_id, "unknown background, falling back to built-in");
                0
            }
        };
        &self.entries[self.selected]
    }

    pub fn select_next(&mut self) -> &BackgroundEntry {
        self.selected = (self.selected + 1) % self.entries.len();
        &self.entries[self.selected]
    }

    pub fn select_previous(&mut self) -> &BackgroundEntry {
        self.selected = (self.selected + self.entries.len() - 1) % self.entries.len();
        &self.entries[self.selected]
    }

    pub fn selected(&self) -> &BackgroundEntry {
        &self.entries[self.selected]
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    /// Decoded image for the current selection, if it is ready.
    pub fn active_image(&self) -> Option<&FrameBuffer> {
        self.selected()
            .source_url
            .as_ref()
            .and_then(|url| self.images.get(url))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    pub(crate) fn png_bytes(w: u32, h: u32, rgb: [u8; 3]) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(w, h, image::Rgb(rgb));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    /// Serves fixed bytes per URL; unknown URLs fail.
    pub(crate) struct MapLoader(pub HashMap<String, Vec<u8>>);

    impl ImageLoader for MapLoader {
        fn load(&self, source: &str) -> Result<Vec<u8>, Error> {
            self.0
                .get(source)
                .cloned()
                .ok_or_else(|| Error::Http(format!("{source} returned 404")))
        }
    }

    /// Blocks every load until the test drops the paired sender.
    pub(crate) struct GatedLoader(pub Mutex<Receiver<()>>);

    impl ImageLoader for GatedLoader {
        fn load(&self, _source: &str) -> Result<Vec<u8>, Error> {
            let _ = self.0.lock().unwrap().recv();
            Ok(png_bytes(2, 2, [0, 0, 255]))
        }
    }

    pub(crate) fn remote(id: &str, url: &str) -> BackgroundEntry {
        BackgroundEntry {
            id: id.into(),
            name: id.to_uppercase(),
            source_url: Some(url.into()),
            origin: Origin::Remote,
        }
    }

    pub(crate) fn wait_until(catalog: &mut BackgroundCatalog, done: impl Fn(&BackgroundCatalog) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(catalog) {
            assert!(Instant::now() < deadline, "catalog did not settle in time");
            catalog.poll();
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn loader_with(urls: &[(&str, Vec<u8>)]) -> Arc<dyn ImageLoader> {
        Arc::new(MapLoader(urls.iter().map(|(u, b)| (u.to_string(), b.clone())).collect()))
    }

    #[test]
    fn new_catalog_has_only_built_in_first() {
        let catalog = BackgroundCatalog::new(8, 8, loader_with(&[]));
        let entries = catalog.list_backgrounds();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].origin, Origin::BuiltIn);
        assert!(entries[0].source_url.is_none());
        assert_eq!(catalog.selected().id, BUILT_IN_ID);
    }

    #[test]
    fn remote_entries_append_in_order_without_duplicates() {
        let mut catalog = BackgroundCatalog::new(8, 8, loader_with(&[]));
        let added = catalog.extend_remote(vec![remote("b", "b.png"), remote("a", "a.png"), remote("b", "b2.png")]);
        assert_eq!(added, 2);
        let ids: Vec<_> = catalog.list_backgrounds().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["none", "b", "a"]);
    }

    #[test]
    fn unknown_id_selects_built_in() {
        let mut catalog = BackgroundCatalog::new(8, 8, loader_with(&[]));
        catalog.extend_remote(vec![remote("a", "a.png")]);
        assert_eq!(catalog.select("a").id, "a");
        assert_eq!(catalog.select("missing").id, BUILT_IN_ID);
        assert_eq!(catalog.selected_index(), 0);
    }

    #[test]
    fn select_next_and_previous_wrap_around() {
        let mut catalog = BackgroundCatalog::new(8, 8, loader_with(&[]));
        catalog.extend_remote(vec![remote("a", "a.png"), remote("b", "b.png")]);
        assert_eq!(catalog.select_next().id, "a");
        assert_eq!(catalog.select_next().id, "b");
        assert_eq!(catalog.select_next().id, BUILT_IN_ID);
        assert_eq!(catalog.select_previous().id, "b");
    }

    #[test]
    fn preload_decodes_and_stretches_to_output_size() {
        let mut catalog = BackgroundCatalog::new(16, 9, loader_with(&[("a.png", png_bytes(4, 4, [10, 200, 30]))]));
        catalog.extend_remote(vec![remote("a", "a.png")]);
        catalog.select("a");
        assert!(catalog.active_image().is_none());

        catalog.preload();
        wait_until(&mut catalog, |c| c.active_image().is_some());

        let img = catalog.active_image().unwrap();
        assert_eq!((img.width, img.height), (16, 9));
        assert!(img.pixels.iter().all(|&p| p == 0x000A_C81E));
        assert_eq!(catalog.status(&catalog.selected().clone()), PreloadStatus::Ready);
    }

    #[test]
    fn one_failure_does_not_block_the_others() {
        let mut catalog = BackgroundCatalog::new(4, 4, loader_with(&[
            ("good.png", png_bytes(2, 2, [1, 2, 3])),
            ("junk.png", b"not an image".to_vec()),
        ]));
        catalog.extend_remote(vec![remote("bad", "missing.png"), remote("junk", "junk.png"), remote("good", "good.png")]);
        catalog.preload();

        let entries: Vec<BackgroundEntry> = catalog.list_backgrounds().to_vec();
        wait_until(&mut catalog, |c| entries.iter().all(|e| c.status(e) != PreloadStatus::Pending));

        assert_eq!(catalog.status(&entries[0]), PreloadStatus::NotNeeded);
        assert_eq!(catalog.status(&entries[1]), PreloadStatus::Failed);
        assert_eq!(catalog.status(&entries[2]), PreloadStatus::Failed);
        assert_eq!(catalog.status(&entries[3]), PreloadStatus::Ready);
    }

    #[test]
    fn failed_urls_are_not_retried() {
        let mut catalog = BackgroundCatalog::new(4, 4, loader_with(&[]));
        catalog.extend_remote(vec![remote("bad", "missing.png")]);
        catalog.preload();
        let entry = catalog.list_backgrounds()[1].clone();
        wait_until(&mut catalog, |c| c.status(&entry) == PreloadStatus::Failed);

        catalog.preload();
        assert!(catalog.in_flight.is_empty());
    }

    #[test]
    fn selected_but_undecoded_background_has_no_image() {
        let (release, gate) = mpsc::channel::<()>();
        let mut catalog = BackgroundCatalog::new(4, 4, Arc::new(GatedLoader(Mutex::new(gate))));
        catalog.extend_remote(vec![remote("slow", "slow.png")]);
        catalog.preload();
        catalog.select("slow");

        catalog.poll();
        assert_eq!(catalog.status(catalog.selected()), PreloadStatus::Pending);
        assert!(catalog.active_image().is_none());

        drop(release);
        wait_until(&mut catalog, |c| c.active_image().is_some());
    }

    struct FakeFeed(Vec<BackgroundRecord>);

    impl KioskService for FakeFeed {
        fn fetch_backgrounds(&self) -> Result<Vec<BackgroundRecord>, Error> {
            Ok(self.0.clone())
        }
        fn submit_capture(&self, _: &crate::api::CaptureRequest) -> Result<crate::api::CaptureReceipt, Error> {
            unreachable!()
        }
        fn trigger_sms(&self, _: &crate::api::SmsRequest) -> Result<(), Error> {
            unreachable!()
        }
        fn image_url(&self, record: &BackgroundRecord) -> String {
            format!("mem://{}", record.file_path)
        }
    }

    #[test]
    fn fetched_feed_keeps_only_active_entries_and_preloads_them() {
        let record = |id: &str, active: bool| BackgroundRecord {
            id: id.into(),
            name: id.into(),
            file_path: format!("{id}.png"),
            is_active: active,
        };
        let service = Arc::new(FakeFeed(vec![record("x", true), record("y", false), record("z", true)]));
        let loader = loader_with(&[("mem://x.png", png_bytes(1, 1, [9, 9, 9]))]);
        let mut catalog = BackgroundCatalog::new(2, 2, loader);

        catalog.start_fetch(service);
        wait_until(&mut catalog, |c| !c.is_fetching());

        let ids: Vec<_> = catalog.list_backgrounds().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["none", "x", "z"]);
        assert_eq!(catalog.list_backgrounds()[1].source_url.as_deref(), Some("mem://x.png"));

        let x = catalog.list_backgrounds()[1].clone();
        wait_until(&mut catalog, |c| c.status(&x) == PreloadStatus::Ready);
    }
}
