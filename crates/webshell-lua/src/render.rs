//! Lua value ⇄ text and JSON.

use mlua::{Function, Lua, LuaSerdeExt, SerializeOptions, Table, Value};

/// Nesting limit when converting tables to JSON; also stops cycles.
const MAX_JSON_DEPTH: usize = 64;

/// Converts a Lua value to JSON.
///
/// Tables with a non-empty sequence part become arrays; everything else
/// becomes an object with stringified keys.
///
/// # Errors
///
/// Fails for functions, userdata, threads, non-finite numbers and tables
/// nested deeper than the limit.
pub fn lua_to_json(value: &Value) -> mlua::Result<serde_json::Value> {
    to_json(value, 0)
}

fn to_json(value: &Value, depth: usize) -> mlua::Result<serde_json::Value> {
    match value {
        Value::Nil => Ok(serde_json::Value::Null),
        Value::Boolean(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Integer(i) => Ok(serde_json::Value::from(*i)),
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .ok_or_else(|| mlua::Error::SerializeError(format!("cannot encode number {n}"))),
        Value::String(s) => Ok(serde_json::Value::String(lossy(s))),
        Value::Table(table) => {
            if depth >= MAX_JSON_DEPTH {
                return Err(mlua::Error::SerializeError(
                    "table nested too deeply (or cyclic)".into(),
                ));
            }
            table_to_json(table, depth + 1)
        }
        other => Err(mlua::Error::SerializeError(format!(
            "cannot encode {}",
            other.type_name()
        ))),
    }
}

fn table_to_json(table: &Table, depth: usize) -> mlua::Result<serde_json::Value> {
    let len = table.raw_len();
    if len > 0 {
        let mut arr = Vec::with_capacity(len);
        for i in 1..=len {
            let v: Value = table.raw_get(i)?;
            arr.push(to_json(&v, depth)?);
        }
        return Ok(serde_json::Value::Array(arr));
    }

    let mut map = serde_json::Map::new();
    for pair in table.pairs::<Value, Value>() {
        let (k, v) = pair?;
        let key = match &k {
            Value::String(s) => lossy(s),
            Value::Integer(i) => i.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Boolean(b) => b.to_string(),
            other => {
                return Err(mlua::Error::SerializeError(format!(
                    "cannot encode {} key",
                    other.type_name()
                )))
            }
        };
        map.insert(key, to_json(&v, depth)?);
    }
    Ok(serde_json::Value::Object(map))
}

/// Converts JSON to a Lua value. `null` becomes `nil`.
///
/// # Errors
///
/// Fails only if the interpreter cannot allocate.
pub fn json_to_lua(lua: &Lua, value: &serde_json::Value) -> mlua::Result<Value> {
    let options = SerializeOptions::new()
        .serialize_none_to_null(false)
        .serialize_unit_to_null(false)
        .set_array_metatable(false);
    lua.to_value_with(value, options)
}

/// Renders the values an expression evaluated to, one line.
///
/// Returns `None` when there is nothing to show: no values, or a single
/// `nil`. Strings are quoted, tables are shown as JSON when they can be,
/// everything else goes through `tostring`.
///
/// # Errors
///
/// Propagates errors raised by `__tostring` metamethods.
pub fn render_result(tostring: &Function, values: &[Value]) -> mlua::Result<Option<String>> {
    match values {
        [] | [Value::Nil] => Ok(None),
        _ => {
            let parts = values
                .iter()
                .map(|v| render_value(tostring, v))
                .collect::<mlua::Result<Vec<_>>>()?;
            Ok(Some(parts.join("\t")))
        }
    }
}

/// Renders one value the way [`render_result`] does.
///
/// # Errors
///
/// Propagates errors raised by `__tostring` metamethods.
pub fn render_value(tostring: &Function, value: &Value) -> mlua::Result<String> {
    match value {
        Value::String(s) => Ok(format!("{:?}", lossy(s))),
        Value::Table(t) if t.metatable().is_none() => match lua_to_json(value) {
            Ok(json) => Ok(json.to_string()),
            Err(_) => display(tostring, value),
        },
        _ => display(tostring, value),
    }
}

/// `tostring(value)` as Rust text.
///
/// # Errors
///
/// Propagates errors raised by `__tostring` metamethods.
pub fn display(tostring: &Function, value: &Value) -> mlua::Result<String> {
    let s: mlua::String = tostring.call(value.clone())?;
    Ok(lossy(&s))
}

pub(crate) fn lossy(s: &mlua::String) -> String {
    s.to_string_lossy().into()
}
