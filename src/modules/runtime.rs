//! The capability set every loadable module implements.

use serde_json::Value;

use super::error::{ModuleError, ModuleResult};
use crate::options::ModuleOptions;

/// What a module sees when it is loaded.
#[derive(Debug, Clone, Copy)]
pub struct ModuleContext<'a> {
    pub guid: &'a str,
    pub name: &'a str,
    /// The module's current options, defaults already merged in.
    pub options: &'a ModuleOptions,
    /// Hash of the page at load time.
    pub hash: &'a str,
}

impl<'a> ModuleContext<'a> {
    pub fn option(&self, key: &str) -> ModuleResult<&'a Value> {
        self.options.get(key).ok_or_else(|| ModuleError::MissingOption {
            module: self.guid.to_string(),
            key: key.to_string(),
        })
    }

    pub fn option_f64(&self, key: &str) -> ModuleResult<f64> {
        self.option(key)?.as_f64().ok_or_else(|| self.wrong_type(key))
    }

    pub fn option_bool(&self, key: &str) -> ModuleResult<bool> {
        self.option(key)?.as_bool().ok_or_else(|| self.wrong_type(key))
    }

    pub fn option_str(&self, key: &str) -> ModuleResult<&'a str> {
        self.option(key)?.as_str().ok_or_else(|| self.wrong_type(key))
    }

    fn wrong_type(&self, key: &str) -> ModuleError {
        ModuleError::OptionType {
            module: self.guid.to_string(),
            key: key.to_string(),
        }
    }
}

/// Lifecycle hooks of a feature module.
///
/// A soft unload tears down only what the module owns (its own nodes and
/// listeners) and returns `false` when the module changed page-wide state it
/// cannot revert that way. A hard unload must also revert page-wide changes;
/// `false` means the page is left inconsistent.
pub trait ModuleRuntime: Send {
    fn load(&mut self, ctx: &ModuleContext<'_>) -> ModuleResult<()>;

    /// The page navigated and the module stays active and loaded.
    fn refresh(&mut self, _ctx: &ModuleContext<'_>) -> ModuleResult<()> {
        Ok(())
    }

    fn soft_unload(&mut self) -> bool;

    fn hard_unload(&mut self) -> bool;

    fn is_loaded(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_context_option_access() {
        let mut opts = ModuleOptions::new();
        opts.insert("count".to_string(), json!(3));
        opts.insert("label".to_string(), json!("hi"));
        opts.insert("enabled".to_string(), json!(true));

        let ctx = ModuleContext {
            guid: "test",
            name: "Test",
            options: &opts,
            hash: "#",
        };

        assert_eq!(ctx.option_f64("count").unwrap(), 3.0);
        assert_eq!(ctx.option_str("label").unwrap(), "hi");
        assert!(ctx.option_bool("enabled").unwrap());
        assert!(matches!(
            ctx.option_f64("label"),
            Err(ModuleError::OptionType { .. })
        ));
        assert!(matches!(
            ctx.option("missing"),
            Err(ModuleError::MissingOption { .. })
        ));
    }
}
