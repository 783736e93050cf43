use std::io;
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;

use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, error, info, warn};

use super::promise::Promise;
use super::state::{read_state, write_state, LoadedModel, ModelState, SharedState};
use super::worker::{self, Job, NOTHING_TO_UNLOAD};
use super::BridgeError;
use crate::assets::{DirAssetSource, ModelStore};
use crate::config::Settings;
use crate::native::{LlamaInference, LlamaOptions, NativeFactory, NativeInference};

/// Asynchronous front end to a native inference engine.
///
/// Every native call runs on one background worker, one at a time and in the
/// order it was submitted; callers get a [`Promise`] back immediately. The
/// handle is cheap to share behind an `Arc`.
pub struct LlamaBridge {
    jobs: Option<UnboundedSender<Job>>,
    state: SharedState,
    worker: Option<JoinHandle<()>>,
}

impl LlamaBridge {
    /// Creates a bridge over `store`, starting the worker thread.
    ///
    /// `factory` builds the native engine; it runs once, on the worker, the
    /// first time a model is loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned.
    pub fn new<F, N>(store: ModelStore, factory: F) -> io::Result<Self>
    where
        F: FnOnce() -> N + Send + 'static,
        N: NativeInference + 'static,
    {
        let factory: NativeFactory = Box::new(move || Box::new(factory()) as Box<dyn NativeInference>);
        let state: SharedState = Arc::new(RwLock::new(ModelState::default()));
        let (jobs, receiver) = mpsc::unbounded_channel();

        let worker = worker::spawn(store, factory, Arc::clone(&state), receiver)?;
        info!("Inference bridge started");

        Ok(Self {
            jobs: Some(jobs),
            state,
            worker: Some(worker),
        })
    }

    /// Creates a llama.cpp-backed bridge from application settings.
    pub fn from_settings(settings: &Settings) -> io::Result<Self> {
        let store = ModelStore::new(
            &settings.models.storage_dir,
            DirAssetSource::new(&settings.models.assets_dir),
        );
        info!("Model storage: {}", store.models_dir().display());
        let options = LlamaOptions::from(&settings.inference);
        Self::new(store, move || LlamaInference::new(options))
    }

    /// Loads `model_name`, copying it out of the assets first if there is no
    /// local copy yet. A model that is already loaded is unloaded first.
    ///
    /// Rejects with `LOAD_ERROR`.
    pub fn load_model(&self, model_name: &str) -> Promise<String> {
        let (reply, promise) = Promise::channel(|| {
            Err(BridgeError::Load("inference worker is not running".to_string()))
        });

        write_state(&self.state).pending_loads += 1;
        let job = Job::Load { name: model_name.to_string(), reply };
        if !self.submit(job) {
            let mut state = write_state(&self.state);
            state.pending_loads = state.pending_loads.saturating_sub(1);
        }
        promise
    }

    /// Generates a continuation of `prompt` of at most `max_tokens` tokens.
    ///
    /// With no model loaded and no load queued, the returned promise is
    /// already rejected with `MODEL_NOT_LOADED` and nothing reaches the
    /// worker. Engine failures reject with `GENERATION_ERROR`.
    pub fn generate_text(&self, prompt: &str, max_tokens: u32) -> Promise<String> {
        {
            let state = read_state(&self.state);
            if state.loaded.is_none() && state.pending_loads == 0 {
                debug!("Rejecting generate: no model loaded");
                return Promise::rejected(BridgeError::ModelNotLoaded);
            }
        }

        let (reply, promise) = Promise::channel(|| {
            Err(BridgeError::Generation("inference worker is not running".to_string()))
        });
        self.submit(Job::Generate { prompt: prompt.to_string(), max_tokens, reply });
        promise
    }

    /// Unloads the current model. Never rejects: with nothing loaded the
    /// promise resolves with an informational message.
    pub fn unload_model(&self) -> Promise<String> {
        let (reply, promise) = Promise::channel(|| Ok(NOTHING_TO_UNLOAD.to_string()));
        self.submit(Job::Unload { reply });
        promise
    }

    pub fn is_model_loaded(&self) -> bool {
        read_state(&self.state).loaded.is_some()
    }

    /// Details of the loaded model, if any.
    pub fn loaded_model(&self) -> Option<LoadedModel> {
        read_state(&self.state).loaded.clone()
    }

    /// Stops accepting work, lets the worker finish what is queued, release
    /// the model and exit, then waits for it.
    pub fn shutdown(mut self) {
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Inference worker panicked");
            }
        }
        info!("Bridge shut down");
    }

    /// Queues a job; a dropped job settles its promise through the orphan path.
    fn submit(&self, job: Job) -> bool {
        let delivered = match self.jobs.as_ref() {
            Some(jobs) => jobs.send(job).is_ok(),
            None => false,
        };
        if !delivered {
            warn!("Inference worker is not running; job dropped");
        }
        delivered
    }
}

impl Drop for LlamaBridge {
    fn drop(&mut self) {
        // Closing the queue lets the worker drain and exit on its own.
        self.jobs.take();
    }
}
