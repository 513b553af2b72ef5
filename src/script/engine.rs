//! The Lua engine owned by the engine thread.
//!
//! Not `Send`: an `Engine` is created, used and dropped on one thread.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use mlua::{Function, HookTriggers, Lua, MultiValue, RegistryKey, VmState};

use crate::bridge::ScriptValue;
use crate::routing::{RegistrationError, RouteRegistry};
use crate::script::api::{self, Registration};
use crate::script::convert;
use crate::script::{CallbackHandle, InvocationError, ScriptLoadError, ScriptSource};

/// VM instructions between deadline checks.
const DEADLINE_CHECK_INTERVAL: u32 = 1_000;

const DEADLINE_MESSAGE: &str = "callback exceeded its deadline";

pub struct Engine {
    lua: Lua,
    callbacks: Vec<RegistryKey>,
    deadline: Rc<Cell<Option<Instant>>>,
    tripped: Rc<Cell<bool>>,
}

impl Engine {
    /// Creates the Lua state with the safe standard libraries and the
    /// deadline hook.
    pub fn initialize() -> Self {
        let lua = Lua::new();
        let deadline: Rc<Cell<Option<Instant>>> = Rc::new(Cell::new(None));
        let tripped = Rc::new(Cell::new(false));
        install_deadline_hook(&lua, Rc::clone(&deadline), Rc::clone(&tripped), DEADLINE_CHECK_INTERVAL);

        Self {
            lua,
            callbacks: Vec::new(),
            deadline,
            tripped,
        }
    }

    /// Installs `app` and `json` and opens route registration.
    pub fn expose_registration_api(&self) -> Result<(), ScriptLoadError> {
        api::install_app(&self.lua).map_err(|e| ScriptLoadError::Engine(e.to_string()))?;
        api::install_json(&self.lua).map_err(|e| ScriptLoadError::Engine(e.to_string()))?;
        self.lua.set_app_data(Registration::default());
        Ok(())
    }

    /// Runs the script's top level and closes registration, returning the
    /// routes it registered.
    pub fn load_script(&mut self, source: &ScriptSource) -> Result<RouteRegistry, ScriptLoadError> {
        let (name, code) = match source {
            ScriptSource::File(path) => {
                let code = std::fs::read(path).map_err(|e| ScriptLoadError::Io {
                    path: path.clone(),
                    source: e,
                })?;
                (path.display().to_string(), code)
            }
            ScriptSource::Inline { name, source } => (name.clone(), source.clone().into_bytes()),
        };

        let executed = self.lua.load(&code[..]).set_name(format!("@{}", name)).exec();

        // Registration closes whether or not the script succeeded.
        let registration = self
            .lua
            .remove_app_data::<Registration>()
            .ok_or_else(|| ScriptLoadError::Engine("registration state missing".to_string()))?;

        if let Some(error) = registration.first_error {
            return Err(ScriptLoadError::Registration(error));
        }
        executed.map_err(classify_load_error)?;

        self.callbacks = registration.callbacks;
        Ok(registration.registry)
    }

    /// Calls a stored callback with positional arguments.
    pub fn invoke(
        &self,
        callback: CallbackHandle,
        args: &[ScriptValue],
        deadline: Instant,
    ) -> Result<ScriptValue, InvocationError> {
        let key = self
            .callbacks
            .get(callback.index())
            .ok_or(InvocationError::UnknownCallback(callback))?;
        let function: Function = self
            .lua
            .registry_value(key)
            .map_err(|e| InvocationError::Script(e.to_string()))?;
        let args = args
            .iter()
            .map(|arg| convert::to_lua(&self.lua, arg))
            .collect::<mlua::Result<Vec<_>>>()
            .map_err(|e| InvocationError::Script(e.to_string()))?;

        self.deadline.set(Some(deadline));
        let result = function.call::<mlua::Value>(MultiValue::from_vec(args));
        self.deadline.set(None);
        if self.tripped.replace(false) {
            install_deadline_hook(
                &self.lua,
                Rc::clone(&self.deadline),
                Rc::clone(&self.tripped),
                DEADLINE_CHECK_INTERVAL,
            );
        }

        match result {
            Ok(value) => Ok(convert::from_lua(&value)),
            Err(_) if Instant::now() >= deadline => Err(InvocationError::Timeout),
            Err(e) => Err(InvocationError::Script(e.to_string())),
        }
    }

    /// Number of callbacks stored by the script.
    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }
}

/// Fails the running callback once the deadline has passed.
///
/// After the first failure the hook re-arms itself to run on every
/// instruction, so a `pcall` in the callback cannot swallow the error and
/// keep going. `invoke` restores the sparse hook when the call returns.
fn install_deadline_hook(lua: &Lua, deadline: Rc<Cell<Option<Instant>>>, tripped: Rc<Cell<bool>>, interval: u32) {
    lua.set_hook(
        HookTriggers::new().every_nth_instruction(interval),
        move |lua, _debug| match deadline.get() {
            Some(at) if Instant::now() >= at => {
                if !tripped.replace(true) {
                    install_deadline_hook(lua, Rc::clone(&deadline), Rc::clone(&tripped), 1);
                }
                Err(mlua::Error::RuntimeError(DEADLINE_MESSAGE.to_string()))
            }
            _ => Ok(VmState::Continue),
        },
    );
}

/// Maps an engine error from the script's top level to a load error.
fn classify_load_error(error: mlua::Error) -> ScriptLoadError {
    if let Some(registration) = find_registration_error(&error) {
        return ScriptLoadError::Registration(registration);
    }
    match error {
        mlua::Error::SyntaxError { message, .. } => ScriptLoadError::Syntax(message),
        other => ScriptLoadError::Runtime(other.to_string()),
    }
}

fn find_registration_error(error: &mlua::Error) -> Option<RegistrationError> {
    match error {
        mlua::Error::ExternalError(inner) => inner.downcast_ref::<RegistrationError>().cloned(),
        mlua::Error::CallbackError { cause, .. } => find_registration_error(cause),
        mlua::Error::WithContext { cause, .. } => find_registration_error(cause),
        _ => None,
    }
}
