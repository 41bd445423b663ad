//! Callback-API wrapping: single functions and named-method tables.
//!
//! [`thunkify`] turns a callback-style function into one returning a fresh
//! thunk per call. [`CallbackTable`] collects named callback-style methods
//! (typically closures over a shared client) and [`CallbackTable::thunkify_all`]
//! wraps every one of them at once.

use crate::error::ThunkError;
use crate::thunk::{Settle, Thunk, ThunkBuilder};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

type Method<A, T, E> = Arc<dyn Fn(A, Settle<T, E>) + Send + Sync>;
type Factory<A, T, E> = Box<dyn Fn(A) -> Thunk<T, E> + Send + Sync>;

/// Wraps a callback-style function into a thunk-returning function.
///
/// Every call runs `f` with a fresh thunk's settle handle and returns that
/// thunk; settlements are never shared between calls. Multi-argument APIs
/// take their arguments as a tuple.
///
/// # Example
///
/// ```
/// use thunklet::{thunkify, Settle};
///
/// let double = thunkify(|n: i32, settle: Settle<i32, String>| {
///     settle.ok(n * 2);
/// });
/// assert_eq!(double(4).value(), Some(8));
/// assert_eq!(double(5).value(), Some(10));
/// ```
pub fn thunkify<A, T, E, F>(f: F) -> impl Fn(A) -> Thunk<T, E>
where
    T: Send + Sync + 'static,
    E: fmt::Debug + Send + Sync + 'static,
    F: Fn(A, Settle<T, E>),
{
    thunkify_with(ThunkBuilder::new(), f)
}

/// [`thunkify`] with an explicit builder template for every created thunk.
pub fn thunkify_with<A, T, E, F>(template: ThunkBuilder, f: F) -> impl Fn(A) -> Thunk<T, E>
where
    T: Send + Sync + 'static,
    E: fmt::Debug + Send + Sync + 'static,
    F: Fn(A, Settle<T, E>),
{
    move |args| template.clone().spawn(|settle| f(args, settle))
}

/// Registry of named callback-style methods with deterministic order.
///
/// Registration is typed, so only callable entries exist; there is no
/// filtering step for non-function members.
pub struct CallbackTable<A, T, E> {
    methods: BTreeMap<&'static str, Method<A, T, E>>,
}

impl<A, T, E> fmt::Debug for CallbackTable<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackTable")
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<A, T, E> Default for CallbackTable<A, T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, T, E> CallbackTable<A, T, E> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            methods: BTreeMap::new(),
        }
    }

    /// Registers a method under `name`, replacing any previous entry.
    #[must_use]
    pub fn register(
        mut self,
        name: &'static str,
        method: impl Fn(A, Settle<T, E>) + Send + Sync + 'static,
    ) -> Self {
        self.methods.insert(name, Arc::new(method));
        self
    }

    /// Number of registered methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Returns true if no methods are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl<A, T, E> CallbackTable<A, T, E>
where
    A: Send + Sync + 'static,
    T: Send + Sync + 'static,
    E: fmt::Debug + Send + Sync + 'static,
{
    /// Wraps every registered method, yielding a table of thunk factories.
    #[must_use]
    pub fn thunkify_all(self) -> ThunkTable<A, T, E> {
        self.thunkify_all_with(ThunkBuilder::new())
    }

    /// [`thunkify_all`](Self::thunkify_all) with an explicit builder
    /// template for every thunk the table will create.
    #[must_use]
    pub fn thunkify_all_with(self, template: ThunkBuilder) -> ThunkTable<A, T, E> {
        let methods = self
            .methods
            .into_iter()
            .map(|(name, method)| {
                let template = template.clone();
                let factory: Factory<A, T, E> =
                    Box::new(move |args| template.clone().spawn(|settle| method(args, settle)));
                (name, factory)
            })
            .collect();
        ThunkTable { methods }
    }
}

/// Named thunk factories produced by [`CallbackTable::thunkify_all`].
pub struct ThunkTable<A, T, E> {
    methods: BTreeMap<&'static str, Factory<A, T, E>>,
}

impl<A, T, E> fmt::Debug for ThunkTable<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThunkTable")
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<A, T, E> ThunkTable<A, T, E> {
    /// Invokes a named method, returning its fresh thunk.
    ///
    /// # Errors
    ///
    /// [`ThunkError::UnknownMethod`] if `name` was never registered.
    pub fn invoke(&self, name: &str, args: A) -> Result<Thunk<T, E>, ThunkError> {
        let factory = self
            .methods
            .get(name)
            .ok_or_else(|| ThunkError::UnknownMethod(name.to_string()))?;
        trace!(method = name, "table method invoked");
        Ok(factory(args))
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Registered method names, in deterministic (sorted) order.
    pub fn method_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.methods.keys().copied()
    }

    /// Number of registered methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Returns true if no methods are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
