//! Script-facing API: route registration and JSON helpers.
//!
//! ```lua
//! app.get("/hello/:name", function(req, name)
//!     return { status = 200, body = "Hi " .. name }
//! end)
//! app.route("PUT", "/items/{id}", handler)
//! local doc = json.decode(req.body)
//! ```

use mlua::{Function, Lua, LuaSerdeExt, RegistryKey, Value};

use crate::routing::{RegistrationError, RouteRegistry};
use crate::script::CallbackHandle;

/// Method shorthands installed on the `app` table.
const SHORTHANDS: [(&str, &str); 7] = [
    ("get", "GET"),
    ("post", "POST"),
    ("put", "PUT"),
    ("patch", "PATCH"),
    ("delete", "DELETE"),
    ("head", "HEAD"),
    ("options", "OPTIONS"),
];

/// Registration state, stored as engine app data while the script loads.
#[derive(Default)]
pub(crate) struct Registration {
    pub registry: RouteRegistry,
    pub callbacks: Vec<RegistryKey>,
    /// First rejected registration; reported even if the script caught it.
    pub first_error: Option<RegistrationError>,
}

/// Installs the global `app` table.
pub fn install_app(lua: &Lua) -> mlua::Result<()> {
    let app = lua.create_table()?;

    app.set(
        "route",
        lua.create_function(|lua, (method, pattern, callback): (Value, Value, Value)| {
            let method = match method {
                Value::String(s) => String::from(s.to_string_lossy()),
                other => return Err(reject(lua, RegistrationError::InvalidMethod(format!("<{}>", other.type_name())))),
            };
            register(lua, &method, pattern, callback)
        })?,
    )?;

    for (name, method) in SHORTHANDS {
        app.set(
            name,
            lua.create_function(move |lua, (pattern, callback): (Value, Value)| {
                register(lua, method, pattern, callback)
            })?,
        )?;
    }

    lua.globals().set("app", app)
}

/// Installs the global `json` table with `encode` and `decode`.
pub fn install_json(lua: &Lua) -> mlua::Result<()> {
    let json = lua.create_table()?;
    json.set(
        "encode",
        lua.create_function(|_, value: Value| {
            serde_json::to_string(&value).map_err(mlua::Error::external)
        })?,
    )?;
    json.set(
        "decode",
        lua.create_function(|lua, text: mlua::String| {
            let parsed: serde_json::Value =
                serde_json::from_slice(&text.as_bytes()).map_err(mlua::Error::external)?;
            lua.to_value(&parsed)
        })?,
    )?;
    lua.globals().set("json", json)
}

fn register(lua: &Lua, method: &str, pattern: Value, callback: Value) -> mlua::Result<()> {
    if lua.app_data_ref::<Registration>().is_none() {
        return Err(mlua::Error::external(RegistrationError::Closed));
    }
    let pattern = match pattern {
        Value::String(s) => String::from(s.to_string_lossy()),
        other => {
            return Err(reject(lua, RegistrationError::PatternNotText { found: other.type_name() }));
        }
    };
    let callback: Function = match callback {
        Value::Function(f) => f,
        other => {
            return Err(reject(lua, RegistrationError::InvalidCallback { found: other.type_name() }));
        }
    };
    let key = lua.create_registry_value(callback)?;

    let result = {
        let Some(mut registration) = lua.app_data_mut::<Registration>() else {
            return Err(mlua::Error::external(RegistrationError::Closed));
        };
        let handle = CallbackHandle::new(registration.callbacks.len());
        let result = registration.registry.register(method, &pattern, handle);
        if result.is_ok() {
            registration.callbacks.push(key);
        }
        result
    };

    match result {
        Ok(_) => Ok(()),
        Err(e) => Err(reject(lua, e)),
    }
}

/// Records the first registration failure and turns it into a Lua error.
fn reject(lua: &Lua, error: RegistrationError) -> mlua::Error {
    match lua.app_data_mut::<Registration>() {
        Some(mut registration) => {
            registration.first_error.get_or_insert_with(|| error.clone());
        }
        None => return mlua::Error::external(RegistrationError::Closed),
    }
    mlua::Error::external(error)
}
