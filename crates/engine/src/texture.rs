//! Off-thread image decoding for texture parameters.
//!
//! Each request runs on its own thread and reports back over a channel that
//! the frame loop drains with `TextureLoader::poll`. A request carries a
//! `DecodeToken` holding the shader generation it was issued under plus a
//! cancellation flag; results whose token was cancelled, or whose generation
//! no longer matches the store, are dropped instead of being bound to the
//! wrong program. A failed decode leaves the previous binding in place.
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use image::imageops::flip_vertical_in_place;
use tracing::{debug, warn};

use crate::store::ParameterStore;

/// RGBA8 pixels, bottom row first so uv `(0, 0)` samples the lower-left corner.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

pub fn decode_file(path: &Path) -> Result<DecodedImage> {
    let image = image::open(path)
        .with_context(|| format!("failed to open texture at {}", path.display()))?;
    Ok(into_decoded(image))
}

pub fn decode_bytes(bytes: &[u8]) -> Result<DecodedImage> {
    let image = image::load_from_memory(bytes).context("failed to decode texture bytes")?;
    Ok(into_decoded(image))
}

fn into_decoded(image: image::DynamicImage) -> DecodedImage {
    let mut rgba = image.to_rgba8();
    flip_vertical_in_place(&mut rgba);
    DecodedImage {
        width: rgba.width(),
        height: rgba.height(),
        pixels: rgba.into_raw(),
    }
}

/// A decoded texture ready for upload. Cheap to clone; identity is `id`.
#[derive(Clone)]
pub struct TextureHandle {
    id: u64,
    source: Arc<str>,
    image: Arc<DecodedImage>,
}

impl TextureHandle {
    pub fn new(id: u64, source: impl Into<Arc<str>>, image: DecodedImage) -> Self {
        Self {
            id,
            source: source.into(),
            image: Arc::new(image),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn image(&self) -> &DecodedImage {
        &self.image
    }
}

impl PartialEq for TextureHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureHandle")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("width", &self.image.width)
            .field("height", &self.image.height)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct DecodeToken {
    key: String,
    generation: u64,
    cancelled: Arc<AtomicBool>,
}

impl DecodeToken {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn same_task(&self, other: &DecodeToken) -> bool {
        Arc::ptr_eq(&self.cancelled, &other.cancelled)
    }
}

struct DecodeOutcome {
    token: DecodeToken,
    source: String,
    result: Result<DecodedImage>,
}

pub struct TextureLoader {
    sender: Sender<DecodeOutcome>,
    receiver: Receiver<DecodeOutcome>,
    pending: Vec<DecodeToken>,
    next_id: u64,
}

impl Default for TextureLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureLoader {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            pending: Vec::new(),
            next_id: 1,
        }
    }

    /// Starts decoding `path` for `key` under shader `generation`.
    ///
    /// Any earlier request for the same key is cancelled so a slow decode
    /// can never overwrite a newer pick.
    pub fn request(&mut self, key: &str, path: impl Into<PathBuf>, generation: u64) -> DecodeToken {
        let path = path.into();
        let source = path.display().to_string();
        self.spawn(key, source, generation, move || decode_file(&path))
    }

    pub fn request_bytes(
        &mut self,
        key: &str,
        source: impl Into<String>,
        bytes: Vec<u8>,
        generation: u64,
    ) -> DecodeToken {
        self.spawn(key, source.into(), generation, move || decode_bytes(&bytes))
    }

    fn spawn<F>(&mut self, key: &str, source: String, generation: u64, job: F) -> DecodeToken
    where
        F: FnOnce() -> Result<DecodedImage> + Send + 'static,
    {
        self.cancel_key(key);
        let token = DecodeToken {
            key: key.to_string(),
            generation,
            cancelled: Arc::new(AtomicBool::new(false)),
        };

        let sender = self.sender.clone();
        let task = token.clone();
        let label = source.clone();
        let spawned = thread::Builder::new()
            .name("texture-decode".into())
            .spawn(move || {
                if task.is_cancelled() {
                    return;
                }
                let result = job();
                let _ = sender.send(DecodeOutcome {
                    token: task,
                    source: label,
                    result,
                });
            });

        match spawned {
            Ok(_) => {
                debug!(key = %key, source = %source, generation, "texture decode started");
                self.pending.push(token.clone());
            }
            Err(err) => {
                warn!(key = %key, error = %err, "failed to spawn texture decode");
                token.cancel();
            }
        }
        token
    }

    /// Cancels every in-flight decode for `key`.
    pub fn cancel_key(&mut self, key: &str) {
        for token in self.pending.iter().filter(|token| token.key == key) {
            token.cancel();
        }
    }

    /// Cancels every in-flight decode.
    pub fn cancel_all(&mut self) {
        for token in &self.pending {
            token.cancel();
        }
    }

    /// Cancels every in-flight decode issued under another shader generation.
    pub fn cancel_stale(&mut self, generation: u64) {
        for token in self.pending.iter().filter(|token| token.generation != generation) {
            token.cancel();
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Applies every finished decode to `store`. Returns how many were bound.
    pub fn poll(&mut self, store: &mut ParameterStore) -> usize {
        let mut applied = 0;
        while let Ok(outcome) = self.receiver.try_recv() {
            if self.apply(outcome, store) {
                applied += 1;
            }
        }
        applied
    }

    /// Blocks up to `timeout` for one decode to finish, then drains the rest.
    pub fn wait(&mut self, store: &mut ParameterStore, timeout: Duration) -> usize {
        match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => usize::from(self.apply(outcome, store)) + self.poll(store),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    fn apply(&mut self, outcome: DecodeOutcome, store: &mut ParameterStore) -> bool {
        let DecodeOutcome {
            token,
            source,
            result,
        } = outcome;
        self.pending.retain(|pending| !pending.same_task(&token));

        if token.is_cancelled() || token.generation != store.generation() {
            debug!(key = %token.key, source = %source, "discarding stale texture decode");
            return false;
        }

        let image = match result {
            Ok(image) => image,
            Err(err) => {
                warn!(
                    key = %token.key,
                    source = %source,
                    error = %format!("{err:#}"),
                    "texture decode failed; keeping previous binding"
                );
                return false;
            }
        };

        let handle = TextureHandle::new(self.next_id, source.as_str(), image);
        self.next_id += 1;
        match store.set_texture(&token.key, Some(handle)) {
            Ok(()) => {
                debug!(key = %token.key, source = %source, "texture bound");
                true
            }
            Err(err) => {
                debug!(key = %token.key, error = %err, "decoded texture no longer applies");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::{Catalog, ParameterKind, ParameterSpec, ParameterValue, ShaderDescriptor};
    use image::{ImageBuffer, Rgba};

    const WAIT: Duration = Duration::from_secs(5);

    fn store() -> ParameterStore {
        let mut catalog = Catalog::new();
        for id in ["tex", "other"] {
            catalog.insert(
                ShaderDescriptor::new(
                    id,
                    id,
                    "",
                    "",
                    "uniform sampler2D uTexture;\n",
                    vec![ParameterSpec::new(
                        "uTexture",
                        ParameterKind::Texture,
                        ParameterValue::Empty,
                    )],
                )
                .unwrap(),
            );
        }
        let mut store = ParameterStore::new(Arc::new(catalog));
        store.select_shader("tex");
        store
    }

    fn write_png(dir: &Path) -> PathBuf {
        let path = dir.join("tiny.png");
        let mut buffer = ImageBuffer::<Rgba<u8>, _>::new(2, 2);
        buffer.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        buffer.put_pixel(0, 1, Rgba([0, 0, 255, 255]));
        buffer.save(&path).unwrap();
        path
    }

    #[test]
    fn decoded_texture_is_bound() {
        let temp = tempfile::tempdir().unwrap();
        let path = write_png(temp.path());
        let mut store = store();
        let mut loader = TextureLoader::new();

        loader.request("uTexture", &path, store.generation());
        assert_eq!(loader.wait(&mut store, WAIT), 1);
        let handle = store.texture("uTexture").expect("bound");
        assert_eq!(handle.image().width, 2);
        // bottom row first: the blue pixel from row 1 leads
        assert_eq!(&handle.image().pixels[..4], &[0, 0, 255, 255]);
        assert_eq!(loader.pending(), 0);
    }

    #[test]
    fn decode_after_switch_is_discarded() {
        let temp = tempfile::tempdir().unwrap();
        let path = write_png(temp.path());
        let mut store = store();
        let mut loader = TextureLoader::new();

        loader.request("uTexture", &path, store.generation());
        store.select_shader("other");
        assert_eq!(loader.wait(&mut store, WAIT), 0);
        assert!(store.texture("uTexture").is_none());
    }

    #[test]
    fn failed_decode_keeps_previous_binding() {
        let temp = tempfile::tempdir().unwrap();
        let path = write_png(temp.path());
        let mut store = store();
        let mut loader = TextureLoader::new();

        loader.request("uTexture", &path, store.generation());
        loader.wait(&mut store, WAIT);
        let before = store.texture("uTexture").cloned();

        loader.request_bytes("uTexture", "garbage", b"not an image".to_vec(), store.generation());
        assert_eq!(loader.wait(&mut store, WAIT), 0);
        assert_eq!(store.texture("uTexture").cloned(), before);
    }

    #[test]
    fn newer_request_cancels_older_one() {
        let mut loader = TextureLoader::new();
        let first = loader.request("uTexture", "/missing/a.png", 1);
        let second = loader.request("uTexture", "/missing/b.png", 1);
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        loader.cancel_stale(2);
        assert!(second.is_cancelled());
    }

    #[test]
    fn cancelled_decode_is_not_bound() {
        let temp = tempfile::tempdir().unwrap();
        let path = write_png(temp.path());
        let mut store = store();
        let mut loader = TextureLoader::new();

        let token = loader.request("uTexture", &path, store.generation());
        loader.cancel_all();
        assert!(token.is_cancelled());
        assert_eq!(loader.wait(&mut store, WAIT), 0);
        assert!(store.texture("uTexture").is_none());
    }
}
