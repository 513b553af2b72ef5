//! Conversion between `ScriptValue` and Lua values.

use axum::body::Bytes;
use mlua::{Lua, Value};

use crate::bridge::{ScriptTable, ScriptValue};

/// Nesting limit when reading tables out of the engine. Deeper tables (and
/// self-referencing ones) are cut off as opaque.
pub const MAX_TABLE_DEPTH: usize = 32;

/// Builds a Lua value from a host value.
pub fn to_lua(lua: &Lua, value: &ScriptValue) -> mlua::Result<Value> {
    Ok(match value {
        ScriptValue::Nil | ScriptValue::Opaque(_) => Value::Nil,
        ScriptValue::Boolean(b) => Value::Boolean(*b),
        ScriptValue::Integer(i) => Value::Integer(*i),
        ScriptValue::Number(n) => Value::Number(*n),
        ScriptValue::String(s) => Value::String(lua.create_string(s)?),
        ScriptValue::Table(table) => {
            let out = lua.create_table_with_capacity(0, table.len())?;
            for (k, v) in table.iter() {
                if k.is_nil() {
                    continue;
                }
                out.raw_set(to_lua(lua, k)?, to_lua(lua, v)?)?;
            }
            Value::Table(out)
        }
    })
}

/// Reads a Lua value into a host value.
pub fn from_lua(value: &Value) -> ScriptValue {
    from_lua_depth(value, MAX_TABLE_DEPTH)
}

fn from_lua_depth(value: &Value, depth: usize) -> ScriptValue {
    match value {
        Value::Nil => ScriptValue::Nil,
        Value::Boolean(b) => ScriptValue::Boolean(*b),
        Value::Integer(i) => ScriptValue::Integer(*i),
        Value::Number(n) => ScriptValue::Number(*n),
        Value::String(s) => ScriptValue::String(Bytes::copy_from_slice(&s.as_bytes())),
        Value::Table(table) if depth > 0 => {
            let mut out = ScriptTable::new();
            for pair in table.clone().pairs::<Value, Value>() {
                match pair {
                    Ok((k, v)) => out.push(from_lua_depth(&k, depth - 1), from_lua_depth(&v, depth - 1)),
                    Err(e) => {
                        tracing::warn!(error = %e, "Stopped reading script table");
                        break;
                    }
                }
            }
            ScriptValue::Table(out)
        }
        other => ScriptValue::Opaque(other.type_name()),
    }
}
