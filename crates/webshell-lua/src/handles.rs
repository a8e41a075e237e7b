//! Capability handles exposed to snippets: `env`, `self` and `json`.
//!
//! Handles are created for one request and revoked when it ends. A handle
//! that outlives its request (stored in a session variable, captured by a
//! persisted function) fails with "handle expired" on use.
//!
//! ```lua
//! local id = env["res.partner"]:create({ name = "Ada" })
//! env["res.partner"]:browse(id)            -- { id = 1, name = "Ada" }
//! env["res.partner"]:search({ name = "Ada" }, 10)
//! env["res.partner"]:search_count()
//! env["res.partner"]:write(id, { name = "Ada L." })
//! env["res.partner"]:unlink(id)
//! env.user                                 -- { id = 2, login = "admin" }
//! self.name, self:operator()
//! json.encode({ a = 1 }), json.decode('{"a": 1}')
//! ```

use crate::render::{json_to_lua, lua_to_json};
use mlua::{Lua, MetaMethod, Table, UserData, UserDataFields, UserDataMethods, Value};
use serde_json::Map;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use webshell_runtime::{Connection, Operation, OperationResult, Record};
use webshell_types::Operator;

/// Name reported by `self.name`.
pub const CONSOLE_NAME: &str = "webshell.console";

#[derive(Debug, Clone, Copy, Error)]
#[error("handle expired: capability handles are only valid during the request that created them")]
pub struct HandleExpired;

/// Validity of every handle issued for one request.
#[derive(Debug, Clone)]
pub struct Lease(Arc<AtomicBool>);

impl Lease {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn revoke(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> mlua::Result<()> {
        if self.is_live() {
            Ok(())
        } else {
            Err(mlua::Error::external(HandleExpired))
        }
    }
}

impl Default for Lease {
    fn default() -> Self {
        Self::new()
    }
}

/// What the handles of one request are bound to.
#[derive(Clone)]
pub struct Bindings {
    pub lease: Lease,
    pub connection: Arc<dyn Connection>,
    pub operator: Operator,
}

/// Sets `env`, `self` and `json` on `scope`.
///
/// # Errors
///
/// Fails only if the interpreter cannot allocate.
pub fn install(lua: &Lua, scope: &Table, bindings: &Bindings) -> mlua::Result<()> {
    scope.set(
        "env",
        EnvHandle {
            lease: bindings.lease.clone(),
            connection: Arc::clone(&bindings.connection),
            operator: bindings.operator.clone(),
        },
    )?;
    scope.set(
        "self",
        SelfHandle {
            lease: bindings.lease.clone(),
            operator: bindings.operator.clone(),
        },
    )?;
    scope.set("json", json_table(lua, &bindings.lease)?)?;
    Ok(())
}

fn operator_table(lua: &Lua, operator: &Operator) -> mlua::Result<Table> {
    let t = lua.create_table()?;
    t.set("id", operator.id.get())?;
    t.set("login", operator.login.as_str())?;
    Ok(t)
}

fn to_fields(values: Table) -> mlua::Result<Record> {
    match lua_to_json(&Value::Table(values))? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(mlua::Error::external(
            "expected a table of field values, got a list",
        )),
    }
}

fn run(connection: &dyn Connection, operation: &Operation) -> mlua::Result<OperationResult> {
    connection.execute(operation).map_err(mlua::Error::external)
}

fn unexpected(result: &OperationResult) -> mlua::Error {
    mlua::Error::external(format!("unexpected persistence result: {result:?}"))
}

struct EnvHandle {
    lease: Lease,
    connection: Arc<dyn Connection>,
    operator: Operator,
}

impl UserData for EnvHandle {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        // env.user / env["model.name"]
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: String| {
            this.lease.check()?;
            if key == "user" {
                return Ok(Value::Table(operator_table(lua, &this.operator)?));
            }
            let model = ModelHandle {
                lease: this.lease.clone(),
                connection: Arc::clone(&this.connection),
                model: key,
            };
            Ok(Value::UserData(lua.create_userdata(model)?))
        });

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(format!("env({})", this.operator.login))
        });
    }
}

struct ModelHandle {
    lease: Lease,
    connection: Arc<dyn Connection>,
    model: String,
}

impl ModelHandle {
    fn search_op(&self, filter: Option<Table>, limit: Option<usize>) -> mlua::Result<Operation> {
        Ok(Operation::Search {
            model: self.model.clone(),
            filter: filter.map(to_fields).transpose()?.unwrap_or_default(),
            limit,
        })
    }
}

impl UserData for ModelHandle {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("_name", |_, this| Ok(this.model.clone()));
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        // m:create(values) → id
        methods.add_method("create", |_, this, values: Table| {
            this.lease.check()?;
            let op = Operation::Create {
                model: this.model.clone(),
                values: to_fields(values)?,
            };
            match run(this.connection.as_ref(), &op)? {
                OperationResult::Created(id) => Ok(id),
                other => Err(unexpected(&other)),
            }
        });

        // m:browse(id) → record or nil
        methods.add_method("browse", |lua, this, id: i64| {
            this.lease.check()?;
            let op = Operation::Read {
                model: this.model.clone(),
                ids: vec![id],
            };
            match run(this.connection.as_ref(), &op)? {
                OperationResult::Records(mut rows) => match rows.pop() {
                    Some(row) => json_to_lua(lua, &serde_json::Value::Object(row)),
                    None => Ok(Value::Nil),
                },
                other => Err(unexpected(&other)),
            }
        });

        // m:search(filter?, limit?) → { records }
        methods.add_method(
            "search",
            |lua, this, (filter, limit): (Option<Table>, Option<usize>)| {
                this.lease.check()?;
                let op = this.search_op(filter, limit)?;
                match run(this.connection.as_ref(), &op)? {
                    OperationResult::Records(rows) => {
                        let out = lua.create_table()?;
                        for (i, row) in rows.into_iter().enumerate() {
                            out.raw_set(i + 1, json_to_lua(lua, &serde_json::Value::Object(row))?)?;
                        }
                        Ok(out)
                    }
                    other => Err(unexpected(&other)),
                }
            },
        );

        // m:search_count(filter?) → n
        methods.add_method("search_count", |_, this, filter: Option<Table>| {
            this.lease.check()?;
            let op = Operation::Count {
                model: this.model.clone(),
                filter: filter.map(to_fields).transpose()?.unwrap_or_else(Map::new),
            };
            match run(this.connection.as_ref(), &op)? {
                OperationResult::Count(n) => Ok(n),
                other => Err(unexpected(&other)),
            }
        });

        // m:write(id, values) → bool
        methods.add_method("write", |_, this, (id, values): (i64, Table)| {
            this.lease.check()?;
            let op = Operation::Write {
                model: this.model.clone(),
                ids: vec![id],
                values: to_fields(values)?,
            };
            match run(this.connection.as_ref(), &op)? {
                OperationResult::Affected(n) => Ok(n > 0),
                other => Err(unexpected(&other)),
            }
        });

        // m:unlink(id) → bool
        methods.add_method("unlink", |_, this, id: i64| {
            this.lease.check()?;
            let op = Operation::Unlink {
                model: this.model.clone(),
                ids: vec![id],
            };
            match run(this.connection.as_ref(), &op)? {
                OperationResult::Affected(n) => Ok(n > 0),
                other => Err(unexpected(&other)),
            }
        });

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(format!("{}()", this.model))
        });
    }
}

struct SelfHandle {
    lease: Lease,
    operator: Operator,
}

impl UserData for SelfHandle {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("name", |_, this| {
            this.lease.check()?;
            Ok(CONSOLE_NAME)
        });
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("operator", |lua, this, ()| {
            this.lease.check()?;
            operator_table(lua, &this.operator)
        });

        methods.add_meta_method(MetaMethod::ToString, |_, _, ()| Ok(CONSOLE_NAME));
    }
}

fn json_table(lua: &Lua, lease: &Lease) -> mlua::Result<Table> {
    let json = lua.create_table()?;

    let l = lease.clone();
    json.set(
        "encode",
        lua.create_function(move |_, value: Value| {
            l.check()?;
            let encoded = lua_to_json(&value)?;
            Ok(encoded.to_string())
        })?,
    )?;

    let l = lease.clone();
    json.set(
        "decode",
        lua.create_function(move |lua, text: String| {
            l.check()?;
            let decoded: serde_json::Value =
                serde_json::from_str(&text).map_err(mlua::Error::external)?;
            json_to_lua(lua, &decoded)
        })?,
    )?;

    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use webshell_runtime::{MemoryPersistence, Persistence};

    fn setup() -> (Lua, Table, Lease, MemoryPersistence) {
        let lua = Lua::new();
        let db = MemoryPersistence::new();
        let lease = Lease::new();
        let bindings = Bindings {
            lease: lease.clone(),
            connection: db.ambient(),
            operator: Operator::new(2, "admin"),
        };
        let scope = lua.create_table().expect("scope");
        install(&lua, &scope, &bindings).expect("install");
        (lua, scope, lease, db)
    }

    fn eval<T: mlua::FromLuaMulti>(lua: &Lua, scope: &Table, code: &str) -> mlua::Result<T> {
        lua.load(code).set_environment(scope.clone()).eval()
    }

    #[test]
    fn model_crud_round_trip() {
        let (lua, scope, _lease, _db) = setup();
        let name: String = eval(
            &lua,
            &scope,
            r#"
            local p = env["res.partner"]
            local id = p:create({ name = "Ada" })
            p:write(id, { name = "Ada L." })
            return p:browse(id).name
            "#,
        )
        .expect("eval");
        assert_eq!(name, "Ada L.");

        let (count, gone, missing): (usize, bool, bool) = eval(
            &lua,
            &scope,
            r#"
            local p = env["res.partner"]
            local gone = p:unlink(1)
            return p:search_count(), gone, p:browse(1) == nil
            "#,
        )
        .expect("eval");
        assert_eq!(count, 0);
        assert!(gone);
        assert!(missing);
    }

    #[test]
    fn search_with_filter_and_limit() {
        let (lua, scope, _lease, _db) = setup();
        let n: usize = eval(
            &lua,
            &scope,
            r#"
            local p = env["res.partner"]
            p:create({ name = "a", city = "X" })
            p:create({ name = "b", city = "X" })
            p:create({ name = "c", city = "Y" })
            return #p:search({ city = "X" }, 1) + p:search_count({ city = "X" })
            "#,
        )
        .expect("eval");
        assert_eq!(n, 3);
    }

    #[test]
    fn user_and_self() {
        let (lua, scope, _lease, _db) = setup();
        let (login, name, id): (String, String, u64) = eval(
            &lua,
            &scope,
            "return env.user.login, self.name, self:operator().id",
        )
        .expect("eval");
        assert_eq!(login, "admin");
        assert_eq!(name, CONSOLE_NAME);
        assert_eq!(id, 2);
    }

    #[test]
    fn json_encode_decode() {
        let (lua, scope, _lease, _db) = setup();
        let s: String = eval(
            &lua,
            &scope,
            r#"local t = json.decode('{"a": [1, 2]}'); return json.encode(t)"#,
        )
        .expect("eval");
        assert_eq!(s, r#"{"a":[1,2]}"#);
    }

    #[test]
    fn revoked_handles_expire() {
        let (lua, scope, lease, _db) = setup();
        eval::<()>(&lua, &scope, r#"kept = env["res.partner"]; enc = json.encode"#)
            .expect("eval");
        lease.revoke();

        let err = eval::<usize>(&lua, &scope, "return kept:search_count()").expect_err("expired");
        assert!(err.to_string().contains("handle expired"), "got {err}");
        let err = eval::<String>(&lua, &scope, "return enc({})").expect_err("expired");
        assert!(err.to_string().contains("handle expired"), "got {err}");
    }

    #[test]
    fn list_values_are_rejected() {
        let (lua, scope, _lease, _db) = setup();
        let err = eval::<i64>(&lua, &scope, r#"return env["res.partner"]:create({ 1, 2 })"#)
            .expect_err("list");
        assert!(err.to_string().contains("table of field values"), "got {err}");
    }
}
