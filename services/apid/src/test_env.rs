//! Process environment overrides for tests. Callers must be `#[serial]`.

/// Records the prior value of every variable it touches and restores them,
/// in reverse order, when dropped.
#[derive(Default)]
pub(crate) struct ScopedEnv {
    saved: Vec<(&'static str, Option<String>)>,
}

impl ScopedEnv {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Start from a clean slate for `keys`.
    pub(crate) fn cleared(keys: &[&'static str]) -> Self {
        let mut env = Self::new();
        for key in keys {
            env.unset(key);
        }
        env
    }

    pub(crate) fn set(&mut self, key: &'static str, value: &str) -> &mut Self {
        self.remember(key);
        unsafe {
            std::env::set_var(key, value);
        }
        self
    }

    pub(crate) fn unset(&mut self, key: &'static str) -> &mut Self {
        self.remember(key);
        unsafe {
            std::env::remove_var(key);
        }
        self
    }

    fn remember(&mut self, key: &'static str) {
        self.saved.push((key, std::env::var(key).ok()));
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (key, prev) in self.saved.drain(..).rev() {
            match prev {
                Some(value) => unsafe { std::env::set_var(key, value) },
                None => unsafe { std::env::remove_var(key) },
            }
        }
    }
}
