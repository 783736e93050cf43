use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use chrono::Utc;
use once_cell::unsync::OnceCell;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use super::promise::Resolver;
use super::state::{read_state, write_state, LoadedModel, SharedState};
use super::BridgeError;
use crate::assets::ModelStore;
use crate::native::{NativeError, NativeFactory, NativeInference};

pub const LOAD_SUCCESS: &str = "Model loaded successfully";
pub const UNLOAD_SUCCESS: &str = "Model unloaded successfully";
pub const NOTHING_TO_UNLOAD: &str = "No model loaded";

const WORKER_THREAD_NAME: &str = "llama-worker";

/// A unit of native work, queued in submission order.
pub(crate) enum Job {
    Load {
        name: String,
        reply: Resolver<String>,
    },
    Generate {
        prompt: String,
        max_tokens: u32,
        reply: Resolver<String>,
    },
    Unload {
        reply: Resolver<String>,
    },
}

impl Job {
    fn kind(&self) -> &'static str {
        match self {
            Job::Load { .. } => "load",
            Job::Generate { .. } => "generate",
            Job::Unload { .. } => "unload",
        }
    }
}

/// Owns the native engine and runs every job on one dedicated thread.
struct Worker {
    store: ModelStore,
    factory: Option<NativeFactory>,
    /// Set once by `ensure_native`; never leaves the worker thread.
    native: OnceCell<Box<dyn NativeInference>>,
    state: SharedState,
}

/// Starts the worker thread. The native engine is built on that thread the
/// first time a load needs it.
pub(crate) fn spawn(
    store: ModelStore,
    factory: NativeFactory,
    state: SharedState,
    jobs: UnboundedReceiver<Job>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(move || {
            let worker = Worker {
                store,
                factory: Some(factory),
                native: OnceCell::new(),
                state,
            };
            worker.run(jobs);
        })
}

impl Worker {
    fn run(mut self, mut jobs: UnboundedReceiver<Job>) {
        info!("Inference worker started");

        while let Some(job) = jobs.blocking_recv() {
            let job_id = Uuid::new_v4();
            let span = info_span!("job", id = %job_id, op = job.kind());
            let _entered = span.enter();
            self.handle(job);
        }

        // Queue closed: the bridge is gone.
        if self.release_current() {
            info!("Released model during worker shutdown");
        }
        info!("Inference worker stopped");
    }

    fn handle(&mut self, job: Job) {
        match job {
            Job::Load { name, reply } => {
                let outcome = self.load(&name);
                reply.settle(outcome);
            }
            Job::Generate { prompt, max_tokens, reply } => {
                let outcome = self.generate(&prompt, max_tokens);
                reply.settle(outcome);
            }
            Job::Unload { reply } => {
                let message = if self.release_current() { UNLOAD_SUCCESS } else { NOTHING_TO_UNLOAD };
                info!("{}", message);
                reply.settle(Ok(message.to_string()));
            }
        }
    }

    fn load(&mut self, name: &str) -> Result<String, BridgeError> {
        let outcome = self.load_model(name);

        let mut state = write_state(&self.state);
        state.pending_loads = state.pending_loads.saturating_sub(1);
        match outcome {
            Ok(model) => {
                info!(copied = model.copied_from_assets, "Loaded model '{}' from {}", model.name, model.path.display());
                state.loaded = Some(model);
                Ok(LOAD_SUCCESS.to_string())
            }
            Err(e) => {
                error!("Error loading model '{}': {}", name, e);
                Err(e)
            }
        }
    }

    fn load_model(&mut self, name: &str) -> Result<LoadedModel, BridgeError> {
        let resolved = self.store.resolve(name).map_err(|e| BridgeError::Load(e.to_string()))?;

        // At most one model lives in the engine; the previous one goes first.
        if self.release_current() {
            info!("Released previous model before loading '{}'", name);
        }

        let native = self.ensure_native()?;
        match guarded(|| native.load_model(&resolved.path)) {
            Ok(Ok(())) => Ok(LoadedModel {
                name: name.to_string(),
                path: resolved.path,
                loaded_at: Utc::now(),
                copied_from_assets: resolved.copied,
            }),
            Ok(Err(e)) => Err(BridgeError::Load(e.to_string())),
            Err(panic) => Err(BridgeError::Load(format!("native engine panicked: {}", panic))),
        }
    }

    fn generate(&mut self, prompt: &str, max_tokens: u32) -> Result<String, BridgeError> {
        // A load queued ahead of this job may have failed, or an unload may have run.
        if read_state(&self.state).loaded.is_none() {
            debug!("No model loaded when generate reached the worker");
            return Err(BridgeError::ModelNotLoaded);
        }
        let native = self.native.get_mut().ok_or(BridgeError::ModelNotLoaded)?;

        debug!(max_tokens, "Generating for prompt of {} bytes", prompt.len());
        match guarded(|| native.generate_text(prompt, max_tokens)) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(NativeError::NotLoaded)) => Err(BridgeError::ModelNotLoaded),
            Ok(Err(e)) => {
                error!("Error generating text: {}", e);
                Err(BridgeError::Generation(e.to_string()))
            }
            Err(panic) => {
                error!("Native engine panicked during generation: {}", panic);
                Err(BridgeError::Generation(format!("native engine panicked: {}", panic)))
            }
        }
    }

    /// Builds the native engine on first use.
    fn ensure_native(&mut self) -> Result<&mut Box<dyn NativeInference>, BridgeError> {
        if self.native.get().is_none() {
            let factory = self.factory.take()
                .ok_or_else(|| BridgeError::Load("native engine is unavailable".to_string()))?;
            let engine = guarded(factory)
                .map_err(|panic| BridgeError::Load(format!("native engine failed to start: {}", panic)))?;
            if self.native.set(engine).is_err() {
                warn!("Native engine was already initialized");
            }
            info!("Native inference engine initialized");
        }

        self.native.get_mut()
            .ok_or_else(|| BridgeError::Load("native engine is unavailable".to_string()))
    }

    /// Unloads the current model, if any. Returns whether one was loaded.
    fn release_current(&mut self) -> bool {
        let previous = write_state(&self.state).loaded.take();
        let Some(model) = previous else {
            return false;
        };

        if let Some(native) = self.native.get_mut() {
            if let Err(panic) = guarded(|| native.unload_model()) {
                warn!("Native engine panicked while unloading '{}': {}", model.name, panic);
            }
        }
        info!("Unloaded model '{}'", model.name);
        true
    }
}

/// Runs a native call, turning a panic into its message.
fn guarded<R>(call: impl FnOnce() -> R) -> Result<R, String> {
    panic::catch_unwind(AssertUnwindSafe(call)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
