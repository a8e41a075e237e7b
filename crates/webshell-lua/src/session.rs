//! Per-operator interpreter state.

use crate::context;
use mlua::{Lua, LuaOptions, StdLib, Table, Value};
use webshell_runtime::{Namespace, SessionError, SessionState, SessionStore};
use webshell_types::OperatorId;

/// Standard libraries loaded into every interpreter. Only the whitelisted
/// parts reach a snippet.
fn stdlib() -> StdLib {
    StdLib::MATH | StdLib::STRING | StdLib::TABLE | StdLib::UTF8 | StdLib::OS
}

/// Creates a fresh interpreter.
///
/// # Errors
///
/// Fails if the interpreter cannot be initialised.
pub fn new_interpreter() -> mlua::Result<Lua> {
    Lua::new_with(stdlib(), LuaOptions::default())
}

/// One operator's interpreter, namespace and context table.
///
/// The context table is kept between runs so functions defined in one
/// call resolve globals (including fresh capability handles) in later
/// calls. It is rebuilt from the namespace after a deadline abort.
pub struct OperatorSession {
    lua: Lua,
    namespace: Namespace<Value>,
    scope: Option<Table>,
}

impl OperatorSession {
    /// # Errors
    ///
    /// Fails if the interpreter cannot be initialised.
    pub fn new() -> mlua::Result<Self> {
        Ok(Self {
            lua: new_interpreter()?,
            namespace: Namespace::new(),
            scope: None,
        })
    }

    #[must_use]
    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// The context table, created on first use.
    ///
    /// # Errors
    ///
    /// Fails if the interpreter cannot allocate.
    pub fn scope(&mut self) -> mlua::Result<Table> {
        if let Some(scope) = &self.scope {
            return Ok(scope.clone());
        }
        let scope = self.lua.create_table()?;
        self.scope = Some(scope.clone());
        Ok(scope)
    }

    /// Forgets the context table; the next run starts from the namespace.
    pub fn discard_scope(&mut self) {
        self.scope = None;
    }
}

impl SessionState for OperatorSession {
    type Value = Value;

    fn namespace(&self) -> &Namespace<Value> {
        &self.namespace
    }

    fn namespace_mut(&mut self) -> &mut Namespace<Value> {
        &mut self.namespace
    }
}

/// Session store whose sessions own an interpreter each.
pub type LuaSessionStore = SessionStore<OperatorSession>;

/// Builds a [`LuaSessionStore`] that reserves every context binding name.
#[must_use]
pub fn new_store() -> LuaSessionStore {
    SessionStore::new(|operator: OperatorId| {
        OperatorSession::new().map_err(|e| SessionError::init(operator, e.to_string()))
    })
    .with_reserved(context::reserved_names())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpreter_lacks_io_and_debug() {
        let lua = new_interpreter().expect("lua");
        let globals = lua.globals();
        assert!(globals.get::<Value>("io").expect("io").is_nil());
        assert!(globals.get::<Value>("debug").expect("debug").is_nil());
        assert!(!globals.get::<Value>("os").expect("os").is_nil());
    }

    #[test]
    fn store_rejects_reserved_names() {
        let store = new_store();
        let mut update = Namespace::new();
        update.insert("env", Value::Integer(1));
        assert!(store.put(OperatorId::new(1), update).is_err());
    }

    #[test]
    fn scope_is_reused_until_discarded() {
        let mut session = OperatorSession::new().expect("session");
        let a = session.scope().expect("scope");
        let b = session.scope().expect("scope");
        assert_eq!(a, b);
        session.discard_scope();
        let c = session.scope().expect("scope");
        assert_ne!(a, c);
    }
}
