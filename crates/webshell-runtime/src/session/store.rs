//! The store itself.

use super::{Namespace, SessionError};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use webshell_types::OperatorId;

/// State kept per operator.
///
/// The store only needs access to the namespace; everything else a session
/// carries (an interpreter, caches) is up to the implementor.
pub trait SessionState: Send {
    type Value: Clone;

    fn namespace(&self) -> &Namespace<Self::Value>;

    fn namespace_mut(&mut self) -> &mut Namespace<Self::Value>;
}

type Factory<S> = dyn Fn(OperatorId) -> Result<S, SessionError> + Send + Sync;

/// Process-scoped map from operator to session.
///
/// Sessions are created lazily by a factory on first access.
///
/// # Example
///
/// ```
/// use webshell_runtime::{Namespace, SessionState, SessionStore};
/// use webshell_types::OperatorId;
///
/// #[derive(Default)]
/// struct Vars(Namespace<i64>);
///
/// impl SessionState for Vars {
///     type Value = i64;
///     fn namespace(&self) -> &Namespace<i64> { &self.0 }
///     fn namespace_mut(&mut self) -> &mut Namespace<i64> { &mut self.0 }
/// }
///
/// let store = SessionStore::new(|_| Ok(Vars::default()));
/// let op = OperatorId::new(2);
///
/// let mut update = Namespace::new();
/// update.insert("x", 5);
/// store.put(op, update).expect("put");
///
/// assert_eq!(store.get_namespace(op).expect("get").get("x"), Some(&5));
/// ```
pub struct SessionStore<S: SessionState> {
    sessions: RwLock<HashMap<OperatorId, Arc<Mutex<S>>>>,
    factory: Box<Factory<S>>,
    reserved: BTreeSet<String>,
}

impl<S: SessionState> SessionStore<S> {
    pub fn new(
        factory: impl Fn(OperatorId) -> Result<S, SessionError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            factory: Box::new(factory),
            reserved: BTreeSet::new(),
        }
    }

    /// Names that [`put`](Self::put) refuses to store.
    #[must_use]
    pub fn with_reserved<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.reserved.extend(names.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved.contains(name)
    }

    /// Returns the operator's session, creating it on first access.
    ///
    /// Lock the returned mutex for the duration of a whole request.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Init`] if the factory fails.
    pub fn session(&self, operator: OperatorId) -> Result<Arc<Mutex<S>>, SessionError> {
        if let Some(session) = self.sessions.read().get(&operator) {
            return Ok(Arc::clone(session));
        }

        let mut sessions = self.sessions.write();
        // Another thread may have won the race between the two locks.
        if let Some(session) = sessions.get(&operator) {
            return Ok(Arc::clone(session));
        }
        let session = Arc::new(Mutex::new((self.factory)(operator)?));
        sessions.insert(operator, Arc::clone(&session));
        debug!(operator = %operator, "session created");
        Ok(session)
    }

    /// Returns a copy of the operator's namespace (empty on first access).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Init`] if the session cannot be created.
    pub fn get_namespace(&self, operator: OperatorId) -> Result<Namespace<S::Value>, SessionError> {
        let session = self.session(operator)?;
        let guard = session.lock();
        Ok(guard.namespace().clone())
    }

    /// Merges `update` into the operator's namespace.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ReservedName`] if any entry is reserved; in
    /// that case nothing is stored.
    pub fn put(&self, operator: OperatorId, update: Namespace<S::Value>) -> Result<(), SessionError> {
        self.check_reserved(update.names())?;
        let session = self.session(operator)?;
        session.lock().namespace_mut().merge(update);
        Ok(())
    }

    /// Fails on the first reserved name in `names`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ReservedName`].
    pub fn check_reserved<'a>(
        &self,
        mut names: impl Iterator<Item = &'a str>,
    ) -> Result<(), SessionError> {
        match names.find(|n| self.reserved.contains(*n)) {
            Some(name) => Err(SessionError::reserved(name)),
            None => Ok(()),
        }
    }

    /// Drops one operator's session. Returns whether it existed.
    pub fn clear(&self, operator: OperatorId) -> bool {
        let removed = self.sessions.write().remove(&operator).is_some();
        if removed {
            debug!(operator = %operator, "session cleared");
        }
        removed
    }

    /// Drops every session.
    pub fn reset(&self) {
        self.sessions.write().clear();
        debug!("session store reset");
    }

    #[must_use]
    pub fn contains(&self, operator: OperatorId) -> bool {
        self.sessions.read().contains_key(&operator)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl<S: SessionState> fmt::Debug for SessionStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.len())
            .field("reserved", &self.reserved)
            .finish_non_exhaustive()
    }
}
