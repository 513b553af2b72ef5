//! Serialized script execution on a dedicated engine thread.
//!
//! # Responsibilities
//! - Own the engine lifecycle: initialize, expose API, load, shut down
//! - Accept invocations from any number of request tasks
//! - Run them one at a time, in submission order
//!
//! # Design Decisions
//! - Bounded queue: a full queue fails fast instead of growing without limit
//! - Invocations whose caller gave up, or whose deadline passed while
//!   queued, are dropped without running
//! - Shutdown is queued behind pending work, then the thread is joined

use std::sync::Mutex;
use std::thread::JoinHandle;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};

use crate::bridge::ScriptValue;
use crate::routing::RouteRegistry;
use crate::script::engine::Engine;
use crate::script::{Invocation, InvocationError, InvocationReply, Invoke, ScriptLoadError, ScriptSource};

enum Command {
    Invoke {
        invocation: Invocation,
        reply: oneshot::Sender<Result<ScriptValue, InvocationError>>,
    },
    Shutdown,
}

/// Handle to the engine thread. Cheap to share behind an `Arc`.
pub struct ScriptHost {
    commands: mpsc::Sender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
    script_name: String,
}

impl ScriptHost {
    /// Starts the engine thread and loads `source` on it.
    ///
    /// Resolves once the script has finished loading. On success the frozen
    /// route registry is returned alongside the host; on failure the thread
    /// has already exited.
    pub async fn start(
        source: ScriptSource,
        queue_capacity: usize,
    ) -> Result<(Self, RouteRegistry), ScriptLoadError> {
        let script_name = source.name();
        let (commands, receiver) = mpsc::channel(queue_capacity.max(1));
        let (ready_tx, ready_rx) = oneshot::channel();

        let worker = std::thread::Builder::new()
            .name("script-engine".to_string())
            .spawn(move || run_engine(source, receiver, ready_tx))
            .map_err(|e| ScriptLoadError::Engine(e.to_string()))?;

        let registry = match ready_rx.await {
            Ok(result) => result?,
            Err(_) => {
                let _ = worker.join();
                return Err(ScriptLoadError::Engine("engine thread exited during load".to_string()));
            }
        };

        tracing::info!(
            script = %script_name,
            routes = registry.len(),
            "Script loaded"
        );

        Ok((
            Self {
                commands,
                worker: Mutex::new(Some(worker)),
                script_name,
            },
            registry,
        ))
    }

    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    /// Stops the engine after the invocations already queued, and waits for
    /// the thread to finish. Later submissions fail with `EngineStopped`.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;

        let worker = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(worker) = worker {
            match tokio::task::spawn_blocking(move || worker.join()).await {
                Ok(Ok(())) => tracing::info!(script = %self.script_name, "Script engine stopped"),
                _ => tracing::error!(script = %self.script_name, "Script engine thread panicked"),
            }
        }
    }
}

impl Invoke for ScriptHost {
    fn submit(&self, invocation: Invocation) -> Result<InvocationReply, InvocationError> {
        let (reply, receiver) = oneshot::channel();
        self.commands
            .try_send(Command::Invoke { invocation, reply })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => InvocationError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => InvocationError::EngineStopped,
            })?;
        Ok(receiver)
    }
}

fn run_engine(
    source: ScriptSource,
    mut commands: mpsc::Receiver<Command>,
    ready: oneshot::Sender<Result<RouteRegistry, ScriptLoadError>>,
) {
    let mut engine = Engine::initialize();
    let loaded = engine
        .expose_registration_api()
        .and_then(|()| engine.load_script(&source));

    match loaded {
        Ok(registry) => {
            if ready.send(Ok(registry)).is_err() {
                return;
            }
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    }

    while let Some(command) = commands.blocking_recv() {
        match command {
            Command::Invoke { invocation, reply } => {
                if reply.is_closed() {
                    tracing::debug!(callback = %invocation.callback, "Caller gone, skipping invocation");
                    continue;
                }
                if Instant::now() >= invocation.deadline {
                    let _ = reply.send(Err(InvocationError::Timeout));
                    continue;
                }
                let result = engine.invoke(invocation.callback, &invocation.args, invocation.deadline);
                let _ = reply.send(result);
            }
            Command::Shutdown => break,
        }
    }
    commands.close();
}
