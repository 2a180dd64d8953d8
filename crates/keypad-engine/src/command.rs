//! Name to behaviour tables shared by every command target.
//!
//! A [`CommandTable`] is built once per target type from a fixed list of
//! [`CommandDef`]s. It only routes: lookups are case-insensitive, parameter
//! checks are delegated to the definition, and execution errors are passed
//! through untouched.

use std::{collections::HashMap, fmt, result::Result as StdResult};

use futures::{FutureExt, future::BoxFuture};

use crate::{Error, Result, Value};

/// Parameter shape check. Returns a human-readable reason on mismatch.
pub type CheckFn = fn(&[Value]) -> StdResult<(), String>;

/// Command body, run against the owning value.
pub type ExecFn<C> = for<'a> fn(&'a C, &'a [Value]) -> BoxFuture<'a, Result<()>>;

/// A single named command.
pub struct CommandDef<C> {
    /// Command name. Stored lowercased in the table.
    pub name: &'static str,
    /// Parameter check run at bind time.
    pub check: CheckFn,
    /// Body run on every matching event.
    pub exec: ExecFn<C>,
}

impl<C> CommandDef<C> {
    /// Create a definition.
    pub const fn new(name: &'static str, check: CheckFn, exec: ExecFn<C>) -> Self {
        Self { name, check, exec }
    }
}

impl<C> Clone for CommandDef<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for CommandDef<C> {}

impl<C> fmt::Debug for CommandDef<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDef")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Immutable command registry for one target type.
pub struct CommandTable<C> {
    /// Definitions keyed by lowercased name.
    defs: HashMap<String, CommandDef<C>>,
}

impl<C> fmt::Debug for CommandTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.defs.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("CommandTable").field("names", &names).finish()
    }
}

impl<C> CommandTable<C> {
    /// Build a table. Names must be unique ignoring case.
    pub fn new(defs: impl IntoIterator<Item = CommandDef<C>>) -> Result<Self> {
        let mut map = HashMap::new();
        for def in defs {
            let key = def.name.to_ascii_lowercase();
            if map.insert(key, def).is_some() {
                return Err(Error::Config(format!(
                    "command '{}' registered twice",
                    def.name
                )));
            }
        }
        Ok(Self { defs: map })
    }

    /// Look up a definition by name, ignoring case.
    fn lookup(&self, name: &str) -> Result<&CommandDef<C>> {
        self.defs
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| Error::UnknownCommand(name.to_string()))
    }

    /// True if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_ok()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.defs.values().map(|d| d.name).collect();
        names.sort_unstable();
        names
    }

    /// Validate `params` for `name`.
    pub fn check(&self, name: &str, params: &[Value]) -> Result<()> {
        let def = self.lookup(name)?;
        (def.check)(params).map_err(|reason| Error::InvalidParameters {
            command: name.to_string(),
            reason,
        })
    }

    /// Run `name` against `owner`. Errors from the command body are returned as is.
    pub fn execute<'a>(
        &self,
        owner: &'a C,
        name: &str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Result<()>> {
        match self.lookup(name) {
            Ok(def) => (def.exec)(owner, params),
            Err(e) => futures::future::ready(Err(e)).boxed(),
        }
    }
}

/// Check for commands that take no parameters.
pub fn no_params(params: &[Value]) -> StdResult<(), String> {
    expect_arity(params, 0)
}

/// Check for commands that take exactly one string.
pub fn single_str(params: &[Value]) -> StdResult<(), String> {
    expect_arity(params, 1)?;
    expect_str(params, 0).map(|_| ())
}

/// Require exactly `n` parameters.
pub fn expect_arity(params: &[Value], n: usize) -> StdResult<(), String> {
    if params.len() == n {
        Ok(())
    } else {
        Err(format!("expected {n} parameter(s), got {}", params.len()))
    }
}

/// Borrow parameter `idx` as a string.
pub fn expect_str(params: &[Value], idx: usize) -> StdResult<&str, String> {
    match params.get(idx) {
        Some(Value::Str(s)) => Ok(s),
        Some(other) => Err(format!(
            "parameter {} must be a string, got {} {}",
            idx + 1,
            other.kind(),
            other
        )),
        None => Err(format!("missing parameter {}", idx + 1)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct Counter {
        hits: AtomicUsize,
    }

    fn bump<'a>(c: &'a Counter, _params: &'a [Value]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            c.hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn boom<'a>(_c: &'a Counter, params: &'a [Value]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { Err(Error::Execution(format!("boom {}", params[0]))) })
    }

    fn table() -> CommandTable<Counter> {
        CommandTable::new([
            CommandDef::new("Bump", no_params, bump),
            CommandDef::new("boom", single_str, boom),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn lookup_ignores_case() {
        let t = table();
        let c = Counter::default();
        t.check("BUMP", &[]).unwrap();
        t.execute(&c, "bump", &[]).await.unwrap();
        t.execute(&c, "bUmP", &[]).await.unwrap();
        assert_eq!(c.hits.load(Ordering::SeqCst), 2);
        assert_eq!(t.names(), vec!["Bump", "boom"]);
    }

    #[tokio::test]
    async fn unknown_command() {
        let t = table();
        let c = Counter::default();
        assert!(matches!(t.check("nope", &[]), Err(Error::UnknownCommand(n)) if n == "nope"));
        assert!(matches!(
            t.execute(&c, "nope", &[]).await,
            Err(Error::UnknownCommand(_))
        ));
    }

    #[test]
    fn invalid_parameters() {
        let t = table();
        let err = t.check("bump", &[Value::from("x")]).unwrap_err();
        assert!(matches!(err, Error::InvalidParameters { .. }));
        let err = t.check("boom", &[Value::Number(1.0)]).unwrap_err();
        assert!(err.to_string().contains("must be a string"), "{err}");
    }

    #[tokio::test]
    async fn execution_errors_pass_through() {
        let t = table();
        let c = Counter::default();
        let params = [Value::from("now")];
        match t.execute(&c, "boom", &params).await {
            Err(Error::Execution(msg)) => assert_eq!(msg, "boom \"now\""),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn duplicate_names_rejected() {
        let r = CommandTable::new([
            CommandDef::new("bump", no_params, bump),
            CommandDef::new("BUMP", no_params, bump),
        ]);
        assert!(matches!(r, Err(Error::Config(_))));
    }
}
