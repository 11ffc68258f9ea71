//! Access to the environment variables the loader reads and writes.

use std::collections::BTreeMap;
use std::env;

/// A mutable view of process-style environment variables.
pub trait Environment {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&mut self, name: &str, value: &str);
    fn remove(&mut self, name: &str);

    /// All variables currently set.
    fn snapshot(&self) -> BTreeMap<String, String>;

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// The real process environment.
///
/// Writing the process environment is only sound while no other thread reads
/// or writes it. A [`crate::Loader`] is driven through `&mut self`, so share it
/// behind a `Mutex` and keep loads off threads that touch the environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn get(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }

    fn set(&mut self, name: &str, value: &str) {
        // SAFETY: loads are serialized through `&mut Loader`; callers keep
        // other threads away from the environment while a load runs.
        unsafe {
            env::set_var(name, value);
        }
    }

    fn remove(&mut self, name: &str) {
        // SAFETY: see `set`.
        unsafe {
            env::remove_var(name);
        }
    }

    fn snapshot(&self) -> BTreeMap<String, String> {
        // Non-UTF-8 variables cannot be named by a layer and are left out
        env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }
}

/// An in-memory environment, used in tests and for dry runs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryEnvironment {
    vars: BTreeMap<String, String>,
}

impl MemoryEnvironment {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemoryEnvironment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Environment for MemoryEnvironment {
    fn get(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }

    fn set(&mut self, name: &str, value: &str) {
        self.vars.insert(name.to_string(), value.to_string());
    }

    fn remove(&mut self, name: &str) {
        self.vars.remove(name);
    }

    fn snapshot(&self) -> BTreeMap<String, String> {
        self.vars.clone()
    }
}
