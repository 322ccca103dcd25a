//! Plugin registry.
//!
//! Maps plugin keys to constructor functions. Lookup and argument
//! validation happen once, when the pipeline is built, never per call.

use super::{BuildstepPlugin, Plugin};
use crate::errors::BuildError;
use std::collections::HashMap;
use std::sync::Arc;

type PluginCtor =
    Box<dyn Fn(&serde_json::Value) -> Result<Arc<dyn Plugin>, BuildError> + Send + Sync>;
type BuildstepCtor =
    Box<dyn Fn(&serde_json::Value) -> Result<Arc<dyn BuildstepPlugin>, BuildError> + Send + Sync>;

/// Registry of plugin constructors keyed by plugin name.
///
/// Build-step plugins live in their own namespace because they produce a
/// [`BuildResult`](crate::core::BuildResult) instead of a keyed value.
#[derive(Default)]
pub struct PluginRegistry {
    ctors: HashMap<String, PluginCtor>,
    buildstep_ctors: HashMap<String, BuildstepCtor>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin constructor under a key.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the key is already registered.
    pub fn register<F>(&mut self, key: impl Into<String>, ctor: F) -> Result<(), BuildError>
    where
        F: Fn(&serde_json::Value) -> Result<Arc<dyn Plugin>, BuildError> + Send + Sync + 'static,
    {
        let key = key.into();
        if self.ctors.contains_key(&key) {
            return Err(BuildError::configuration(format!(
                "plugin '{key}' is already registered"
            )));
        }
        self.ctors.insert(key, Box::new(ctor));
        Ok(())
    }

    /// Registers a build-step plugin constructor under a key.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the key is already registered.
    pub fn register_buildstep<F>(
        &mut self,
        key: impl Into<String>,
        ctor: F,
    ) -> Result<(), BuildError>
    where
        F: Fn(&serde_json::Value) -> Result<Arc<dyn BuildstepPlugin>, BuildError>
            + Send
            + Sync
            + 'static,
    {
        let key = key.into();
        if self.buildstep_ctors.contains_key(&key) {
            return Err(BuildError::configuration(format!(
                "buildstep plugin '{key}' is already registered"
            )));
        }
        self.buildstep_ctors.insert(key, Box::new(ctor));
        Ok(())
    }

    /// Returns true if a plugin key is registered.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.ctors.contains_key(key)
    }

    /// Returns true if a build-step plugin key is registered.
    #[must_use]
    pub fn contains_buildstep(&self, key: &str) -> bool {
        self.buildstep_ctors.contains_key(key)
    }

    /// Constructs a plugin from its registered constructor and arguments.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown key or invalid
    /// arguments.
    pub fn build(&self, key: &str, args: &serde_json::Value) -> Result<Arc<dyn Plugin>, BuildError> {
        let ctor = self.ctors.get(key).ok_or_else(|| {
            BuildError::configuration(format!("unknown plugin '{key}'"))
        })?;
        ctor(args)
    }

    /// Constructs a build-step plugin from its registered constructor.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown key or invalid
    /// arguments.
    pub fn build_buildstep(
        &self,
        key: &str,
        args: &serde_json::Value,
    ) -> Result<Arc<dyn BuildstepPlugin>, BuildError> {
        let ctor = self.buildstep_ctors.get(key).ok_or_else(|| {
            BuildError::configuration(format!("unknown buildstep plugin '{key}'"))
        })?;
        ctor(args)
    }

    /// Creates a registry with all built-in plugins registered.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a built-in key collides, which
    /// indicates a programming error in the built-in set.
    pub fn with_builtins() -> Result<Self, BuildError> {
        let mut registry = Self::new();
        crate::plugins::register_builtins(&mut registry)?;
        Ok(registry)
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.ctors.keys().collect::<Vec<_>>())
            .field("buildstep_plugins", &self.buildstep_ctors.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::NoOpPlugin;

    fn noop_ctor(
        key: &'static str,
    ) -> impl Fn(&serde_json::Value) -> Result<Arc<dyn Plugin>, BuildError> {
        move |_args| Ok(Arc::new(NoOpPlugin::new(key)))
    }

    #[test]
    fn test_register_and_build() {
        let mut registry = PluginRegistry::new();
        registry.register("noop", noop_ctor("noop")).unwrap();

        assert!(registry.contains("noop"));
        let plugin = registry.build("noop", &serde_json::Value::Null).unwrap();
        assert_eq!(plugin.key(), "noop");
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut registry = PluginRegistry::new();
        registry.register("noop", noop_ctor("noop")).unwrap();

        let err = registry.register("noop", noop_ctor("noop")).unwrap_err();
        assert!(matches!(err, BuildError::Configuration(_)));
    }

    #[test]
    fn test_unknown_key() {
        let registry = PluginRegistry::new();
        let err = registry.build("missing", &serde_json::Value::Null).unwrap_err();
        assert!(matches!(err, BuildError::Configuration(_)));
    }

    #[test]
    fn test_buildstep_namespace_is_separate() {
        let mut registry = PluginRegistry::new();
        registry.register("shared", noop_ctor("shared")).unwrap();

        assert!(!registry.contains_buildstep("shared"));
        assert!(registry
            .build_buildstep("shared", &serde_json::Value::Null)
            .is_err());
    }

    #[test]
    fn test_builtins_register() {
        let registry = PluginRegistry::with_builtins().unwrap();
        assert!(registry.contains("bump_release"));
        assert!(registry.contains("add_content_manifest"));
        assert!(registry.contains("rpm_manifest"));
        assert!(registry.contains("cancel_build_reservation"));
        assert!(registry.contains("store_metadata"));
        assert!(registry.contains_buildstep("filesystem_builder"));
    }
}
