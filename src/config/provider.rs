//! Configuration providers

use std::collections::HashMap;

/// Source of string configuration values keyed by variable name
pub trait ConfigProvider {
    /// Look up a value; `None` when the variable is not set
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvProvider;

impl ConfigProvider for EnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory provider, mainly for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct MapProvider {
    values: HashMap<String, String>,
}

impl MapProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl<K, V> FromIterator<(K, V)> for MapProvider
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl ConfigProvider for MapProvider {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Looks in `top` first, then in `base`
#[derive(Debug, Clone)]
pub struct Overlay<A, B> {
    top: A,
    base: B,
}

impl<A: ConfigProvider, B: ConfigProvider> Overlay<A, B> {
    /// Layer `top` over `base`
    pub fn new(top: A, base: B) -> Self {
        Self { top, base }
    }
}

impl<A: ConfigProvider, B: ConfigProvider> ConfigProvider for Overlay<A, B> {
    fn get(&self, key: &str) -> Option<String> {
        self.top.get(key).or_else(|| self.base.get(key))
    }
}

impl<P: ConfigProvider + ?Sized> ConfigProvider for &P {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }
}
