#![allow(dead_code)]

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use llama_bridge::assets::{AssetSource, DirAssetSource, ModelStore, MODELS_SUBDIR};
use llama_bridge::native::{NativeError, NativeInference};
use llama_bridge::LlamaBridge;

/// What the scripted engine saw, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    LoadStarted(PathBuf),
    LoadFinished(PathBuf),
    GenerateStarted { prompt: String, max_tokens: u32 },
    GenerateFinished(String),
    Unload,
}

/// How the scripted engine behaves.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub reject_loads: bool,
    pub load_delay: Duration,
    pub generate_delay: Duration,
    /// Generation fails with an engine error for this prompt
    pub fail_prompt: Option<String>,
    /// Generation panics for this prompt
    pub panic_prompt: Option<String>,
}

/// Shared observation points for one test.
#[derive(Clone, Default)]
pub struct Probe {
    pub events: Arc<Mutex<Vec<Event>>>,
    pub engines_built: Arc<AtomicUsize>,
    pub asset_opens: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    pub peak_in_flight: Arc<AtomicUsize>,
}

impl Probe {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory stand-in for the native engine.
pub struct ScriptedEngine {
    script: Script,
    probe: Probe,
    loaded: Option<PathBuf>,
}

impl NativeInference for ScriptedEngine {
    fn load_model(&mut self, path: &Path) -> Result<(), NativeError> {
        self.probe.enter();
        self.probe.record(Event::LoadStarted(path.to_path_buf()));
        thread::sleep(self.script.load_delay);

        let outcome = if self.script.reject_loads {
            Err(NativeError::Load("engine rejected the model file".to_string()))
        } else {
            self.loaded = Some(path.to_path_buf());
            self.probe.record(Event::LoadFinished(path.to_path_buf()));
            Ok(())
        };
        self.probe.exit();
        outcome
    }

    fn generate_text(&mut self, prompt: &str, max_tokens: u32) -> Result<String, NativeError> {
        self.probe.enter();
        self.probe.record(Event::GenerateStarted { prompt: prompt.to_string(), max_tokens });
        thread::sleep(self.script.generate_delay);

        if self.script.panic_prompt.as_deref() == Some(prompt) {
            self.probe.exit();
            panic!("engine fault on '{}'", prompt);
        }

        let outcome = if self.script.fail_prompt.as_deref() == Some(prompt) {
            Err(NativeError::Generation("sampler failed".to_string()))
        } else if self.loaded.is_none() {
            Err(NativeError::NotLoaded)
        } else {
            let text = format!(" {} (max {})", prompt, max_tokens);
            self.probe.record(Event::GenerateFinished(prompt.to_string()));
            Ok(text)
        };
        self.probe.exit();
        outcome
    }

    fn unload_model(&mut self) {
        self.probe.record(Event::Unload);
        self.loaded = None;
    }
}

/// Asset source that counts how often assets are opened.
struct CountingAssets {
    inner: DirAssetSource,
    opens: Arc<AtomicUsize>,
}

impl AssetSource for CountingAssets {
    fn open(&self, name: &str) -> io::Result<Box<dyn Read>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.inner.open(name)
    }
}

/// Scratch asset bundle and storage root, removed on drop.
pub struct Harness {
    pub root: PathBuf,
    pub probe: Probe,
}

impl Harness {
    pub fn new() -> Self {
        let root = std::env::temp_dir().join(format!("llama-bridge-it-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(root.join("assets").join(MODELS_SUBDIR)).unwrap();
        Self { root, probe: Probe::default() }
    }

    pub fn add_asset(&self, name: &str, bytes: &[u8]) {
        fs::write(self.root.join("assets").join(MODELS_SUBDIR).join(name), bytes).unwrap();
    }

    pub fn local_model(&self, name: &str) -> PathBuf {
        self.root.join("storage").join(MODELS_SUBDIR).join(name)
    }

    pub fn bridge(&self, script: Script) -> LlamaBridge {
        let assets = CountingAssets {
            inner: DirAssetSource::new(self.root.join("assets")),
            opens: Arc::clone(&self.probe.asset_opens),
        };
        let store = ModelStore::new(self.root.join("storage"), assets);
        let probe = self.probe.clone();

        LlamaBridge::new(store, move || {
            probe.engines_built.fetch_add(1, Ordering::SeqCst);
            ScriptedEngine { script, probe, loaded: None }
        })
        .unwrap()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        fs::remove_dir_all(&self.root).ok();
    }
}
