//! Execution context construction.
//!
//! A context is a Lua table used as the `_ENV` of the compiled snippet.
//! It never exposes the interpreter's real globals. Each run refreshes:
//!
//! - whitelisted standard functions and libraries ([`STDLIB_NAMES`],
//!   [`LIBRARY_NAMES`], a read-only `os` subset);
//! - a `setmetatable` that refuses `__gc` metamethods, since finalizers run
//!   with debug hooks suspended and so escape the deadline;
//! - `pcall`/`xpcall` wrappers that re-raise a fired deadline;
//! - output functions `print` and `eprint`;
//! - capability handles `env`, `self`, `json`;
//! - the operator's namespace.
//!
//! Every name in the first four groups is reserved: namespace entries may
//! not shadow them, and they are never copied back into the namespace.

use crate::capture::{OutputCapture, Stream};
use crate::deadline::{DeadlineFault, DeadlineFlag};
use crate::handles::{self, Bindings};
use crate::render;
use mlua::{Function, Lua, MultiValue, Table, Value};
use std::time::Duration;
use webshell_runtime::Namespace;

/// Standard functions copied from the interpreter globals.
pub const STDLIB_NAMES: &[&str] = &[
    "assert",
    "error",
    "ipairs",
    "next",
    "pairs",
    "select",
    "tonumber",
    "tostring",
    "type",
    "rawequal",
    "rawget",
    "rawlen",
    "rawset",
    "getmetatable",
];

/// Standard libraries copied from the interpreter globals.
pub const LIBRARY_NAMES: &[&str] = &["math", "string", "table", "utf8"];

/// Functions exposed from `os`.
pub const OS_SUBSET: &[&str] = &["time", "clock", "date"];

/// Names installed by the console rather than copied from globals.
pub const CONSOLE_NAMES: &[&str] = &[
    "os",
    "unpack",
    "setmetatable",
    "pcall",
    "xpcall",
    "print",
    "eprint",
    "env",
    "self",
    "json",
    "_G",
];

/// Every reserved binding name.
pub fn reserved_names() -> impl Iterator<Item = &'static str> {
    STDLIB_NAMES
        .iter()
        .chain(LIBRARY_NAMES)
        .chain(CONSOLE_NAMES)
        .copied()
}

#[must_use]
pub fn is_reserved(name: &str) -> bool {
    reserved_names().any(|n| n == name)
}

/// Per-run inputs for [`prepare`].
pub struct RunContext<'a> {
    pub bindings: &'a Bindings,
    pub capture: &'a OutputCapture,
    pub deadline: &'a DeadlineFlag,
    pub budget: Duration,
}

/// Refreshes the reserved bindings of `scope`, then loads `namespace`.
///
/// Namespace entries overwrite whatever `scope` holds under the same name.
/// The caller must have rejected reserved names in `namespace` already.
///
/// # Errors
///
/// Fails only if the interpreter cannot allocate or lacks a standard
/// library.
pub fn prepare(
    lua: &Lua,
    scope: &Table,
    run: &RunContext<'_>,
    namespace: &Namespace<Value>,
) -> mlua::Result<()> {
    let globals = lua.globals();

    for name in STDLIB_NAMES.iter().chain(LIBRARY_NAMES) {
        let value: Value = globals.get(*name)?;
        if !value.is_nil() {
            scope.set(*name, value)?;
        }
    }

    let table_lib: Table = globals.get("table")?;
    scope.set("unpack", table_lib.get::<Value>("unpack")?)?;
    scope.set("os", os_subset(lua, &globals)?)?;
    scope.set("_G", scope.clone())?;

    install_setmetatable(lua, scope, &globals)?;
    install_guarded_pcall(lua, scope, &globals, run.deadline, run.budget)?;
    install_output(lua, scope, &globals, run.capture)?;
    handles::install(lua, scope, run.bindings)?;

    for (name, value) in namespace {
        scope.set(name.as_str(), value.clone())?;
    }
    Ok(())
}

/// Copies every non-reserved string-keyed entry of `scope`.
///
/// # Errors
///
/// Fails if iterating the table fails.
pub fn collect(scope: &Table) -> mlua::Result<Namespace<Value>> {
    let mut out = Namespace::new();
    for pair in scope.pairs::<Value, Value>() {
        let (key, value) = pair?;
        if let Value::String(key) = key {
            let name = render::lossy(&key);
            if !is_reserved(&name) {
                out.insert(name, value);
            }
        }
    }
    Ok(out)
}

fn os_subset(lua: &Lua, globals: &Table) -> mlua::Result<Table> {
    let os: Table = globals.get("os")?;
    let subset = lua.create_table()?;
    for name in OS_SUBSET {
        subset.set(*name, os.get::<Value>(*name)?)?;
    }
    Ok(subset)
}

fn install_setmetatable(lua: &Lua, scope: &Table, globals: &Table) -> mlua::Result<()> {
    let raw: Function = globals.get("setmetatable")?;
    let guarded = lua.create_function(move |_, (target, mt): (Value, Value)| {
        if let Value::Table(mt) = &mt {
            if !mt.raw_get::<Value>("__gc")?.is_nil() {
                return Err(mlua::Error::runtime("__gc metamethods are not allowed"));
            }
        }
        raw.call::<Value>((target, mt))
    })?;
    scope.set("setmetatable", guarded)
}

fn install_guarded_pcall(
    lua: &Lua,
    scope: &Table,
    globals: &Table,
    flag: &DeadlineFlag,
    budget: Duration,
) -> mlua::Result<()> {
    for name in ["pcall", "xpcall"] {
        let raw: Function = globals.get(name)?;
        let flag = flag.clone();
        let guarded = lua.create_function(move |_, args: MultiValue| {
            let results: MultiValue = raw.call(args)?;
            if flag.is_fired() {
                return Err(mlua::Error::external(DeadlineFault { budget }));
            }
            Ok(results)
        })?;
        scope.set(name, guarded)?;
    }
    Ok(())
}

fn install_output(
    lua: &Lua,
    scope: &Table,
    globals: &Table,
    capture: &OutputCapture,
) -> mlua::Result<()> {
    for (name, stream) in [("print", Stream::Out), ("eprint", Stream::Err)] {
        let tostring: Function = globals.get("tostring")?;
        let capture = capture.clone();
        let f = lua.create_function(move |_, args: MultiValue| {
            let parts = args
                .iter()
                .map(|v| render::display(&tostring, v))
                .collect::<mlua::Result<Vec<_>>>()?;
            let mut line = parts.join("\t");
            line.push('\n');
            capture.write(stream, &line);
            Ok(())
        })?;
        scope.set(name, f)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handles::Lease;
    use webshell_runtime::{MemoryPersistence, Persistence};
    use webshell_types::Operator;

    fn run_in_scope(code: &str, namespace: &Namespace<Value>, lua: &Lua) -> (Table, String) {
        let db = MemoryPersistence::new();
        let bindings = Bindings {
            lease: Lease::new(),
            connection: db.ambient(),
            operator: Operator::new(2, "admin"),
        };
        let capture = OutputCapture::new(4096);
        let flag = DeadlineFlag::new();
        let scope = lua.create_table().expect("scope");
        prepare(
            lua,
            &scope,
            &RunContext {
                bindings: &bindings,
                capture: &capture,
                deadline: &flag,
                budget: Duration::from_secs(5),
            },
            namespace,
        )
        .expect("prepare");
        lua.load(code)
            .set_environment(scope.clone())
            .exec()
            .expect("exec");
        (scope, capture.combined())
    }

    #[test]
    fn print_and_eprint_go_to_their_sinks() {
        let lua = Lua::new();
        let (_, out) = run_in_scope(
            r#"eprint("warn", 1); print("a", 2, true, nil)"#,
            &Namespace::new(),
            &lua,
        );
        assert_eq!(out, "a\t2\ttrue\tnil\nwarn\t1\n");
    }

    #[test]
    fn dangerous_globals_are_absent() {
        let lua = Lua::new();
        let (_, out) = run_in_scope(
            r#"print(io, load, dofile, loadfile, require, debug, os.execute, os.remove, package)"#,
            &Namespace::new(),
            &lua,
        );
        assert_eq!(out, "nil\tnil\tnil\tnil\tnil\tnil\tnil\tnil\tnil\n");
    }

    #[test]
    fn os_subset_and_unpack_available() {
        let lua = Lua::new();
        let (_, out) = run_in_scope(
            r##"print(type(os.time()), type(os.clock()), select("#", unpack({1, 2, 3})))"##,
            &Namespace::new(),
            &lua,
        );
        assert_eq!(out, "number\tnumber\t3\n");
    }

    #[test]
    fn namespace_loaded_and_collected_without_reserved_names() {
        let lua = Lua::new();
        let mut ns = Namespace::new();
        ns.insert("x", Value::Integer(5));
        let (scope, out) = run_in_scope("print(x); y = x * 2; print = nil", &ns, &lua);
        assert_eq!(out, "5\n");

        let collected = collect(&scope).expect("collect");
        assert_eq!(collected.names().collect::<Vec<_>>(), vec!["x", "y"]);
        assert!(matches!(collected.get("y"), Some(Value::Integer(10))));
    }

    #[test]
    fn setmetatable_refuses_finalizers() {
        let lua = Lua::new();
        let (_, out) = run_in_scope(
            r#"
            local t = setmetatable({}, { __index = function(_, k) return k .. "!" end })
            print(t.hi)
            local ok, err = pcall(setmetatable, {}, { __gc = function() end })
            print(ok, string.find(tostring(err), "__gc metamethods are not allowed", 1, true) ~= nil)
            print((pcall(setmetatable, {}, { __gc = false })))
            "#,
            &Namespace::new(),
            &lua,
        );
        assert_eq!(out, "hi!\nfalse\ttrue\nfalse\n");
    }

    #[test]
    fn reserved_names_cover_every_binding() {
        for name in [
            "env", "self", "json", "print", "eprint", "pcall", "setmetatable", "math", "os", "_G",
        ] {
            assert!(is_reserved(name), "{name} should be reserved");
        }
        assert!(!is_reserved("x"));
    }
}
