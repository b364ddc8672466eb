#![forbid(unsafe_code)]

//! Typed resource registry.
//!
//! A resource is a named, typed configuration value with a validating
//! setter hook. The hook runs *before* the stored value is updated, so a
//! rejected assignment leaves the previous, valid value in effect and the
//! component behind the hook untouched. Persisting resource values (and
//! deciding when to) is the embedder's job; this registry only holds the
//! live session state.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceValue {
    Bool(bool),
    Int(i32),
}

impl ResourceValue {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            ResourceValue::Bool(v) => Some(v),
            ResourceValue::Int(_) => None,
        }
    }

    pub fn as_int(self) -> Option<i32> {
        match self {
            ResourceValue::Int(v) => Some(v),
            ResourceValue::Bool(_) => None,
        }
    }

    fn same_type(self, other: ResourceValue) -> bool {
        matches!(
            (self, other),
            (ResourceValue::Bool(_), ResourceValue::Bool(_))
                | (ResourceValue::Int(_), ResourceValue::Int(_))
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("unknown resource {0:?}")]
    UnknownResource(String),

    #[error("type mismatch for resource {0:?}")]
    TypeMismatch(String),

    #[error("invalid value for resource {name:?}: {reason}")]
    InvalidValue { name: String, reason: String },
}

/// Setter hook: validate and apply a new value, or explain the rejection.
pub type ResourceSetter = Box<dyn FnMut(ResourceValue) -> Result<(), String>>;

struct ResourceEntry {
    value: ResourceValue,
    default: ResourceValue,
    setter: ResourceSetter,
}

/// Registry of live resources.
pub struct Resources {
    entries: HashMap<&'static str, ResourceEntry>,
}

impl Resources {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a boolean resource. The default becomes the stored value
    /// without running the setter; components are expected to construct in
    /// their default configuration.
    pub fn register_bool(&mut self, name: &'static str, default: bool, setter: ResourceSetter) {
        self.register(name, ResourceValue::Bool(default), setter);
    }

    /// Register an integer resource.
    pub fn register_int(&mut self, name: &'static str, default: i32, setter: ResourceSetter) {
        self.register(name, ResourceValue::Int(default), setter);
    }

    fn register(&mut self, name: &'static str, default: ResourceValue, setter: ResourceSetter) {
        let prev = self.entries.insert(
            name,
            ResourceEntry {
                value: default,
                default,
                setter,
            },
        );
        assert!(prev.is_none(), "resource {name:?} registered twice");
    }

    /// Assign `value` to `name`.
    ///
    /// The setter hook runs first; only if it accepts is the stored value
    /// updated. Assigning the already-stored value still runs the hook
    /// (hooks are expected to treat that as a no-op, and the ones in this
    /// workspace do).
    pub fn set(&mut self, name: &str, value: ResourceValue) -> Result<(), ResourceError> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| ResourceError::UnknownResource(name.to_owned()))?;
        if !entry.value.same_type(value) {
            return Err(ResourceError::TypeMismatch(name.to_owned()));
        }

        (entry.setter)(value).map_err(|reason| ResourceError::InvalidValue {
            name: name.to_owned(),
            reason,
        })?;
        entry.value = value;
        Ok(())
    }

    pub fn set_bool(&mut self, name: &str, value: bool) -> Result<(), ResourceError> {
        self.set(name, ResourceValue::Bool(value))
    }

    pub fn set_int(&mut self, name: &str, value: i32) -> Result<(), ResourceError> {
        self.set(name, ResourceValue::Int(value))
    }

    pub fn get(&self, name: &str) -> Option<ResourceValue> {
        self.entries.get(name).map(|e| e.value)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(ResourceValue::as_bool)
    }

    pub fn get_int(&self, name: &str) -> Option<i32> {
        self.get(name).and_then(ResourceValue::as_int)
    }

    /// Re-apply every resource's default through its setter.
    pub fn reset_to_defaults(&mut self) -> Result<(), ResourceError> {
        // Collect first: setters may not be re-entrant with the map borrow.
        let names: Vec<&'static str> = self.entries.keys().copied().collect();
        for name in names {
            let default = self
                .entries
                .get(name)
                .expect("resource disappeared")
                .default;
            self.set(name, default)?;
        }
        Ok(())
    }
}

impl Default for Resources {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn set_runs_the_hook_then_stores() {
        let applied = Rc::new(Cell::new(false));
        let mut res = Resources::new();
        res.register_bool("Switch", false, {
            let applied = applied.clone();
            Box::new(move |v| {
                applied.set(v.as_bool().unwrap());
                Ok(())
            })
        });

        assert_eq!(res.get_bool("Switch"), Some(false));
        res.set_bool("Switch", true).unwrap();
        assert!(applied.get());
        assert_eq!(res.get_bool("Switch"), Some(true));
    }

    #[test]
    fn rejected_assignment_leaves_the_previous_value() {
        let mut res = Resources::new();
        res.register_int(
            "Base",
            0xDE40,
            Box::new(|v| {
                let v = v.as_int().unwrap();
                if v == 0xDE40 || v == 0xDE48 {
                    Ok(())
                } else {
                    Err(format!("{v:#x} not allowed"))
                }
            }),
        );

        let err = res.set_int("Base", 0xDE50).unwrap_err();
        assert!(matches!(err, ResourceError::InvalidValue { .. }));
        assert_eq!(res.get_int("Base"), Some(0xDE40));

        res.set_int("Base", 0xDE48).unwrap();
        assert_eq!(res.get_int("Base"), Some(0xDE48));
    }

    #[test]
    fn unknown_and_mistyped_resources_are_errors() {
        let mut res = Resources::new();
        res.register_bool("Switch", false, Box::new(|_| Ok(())));

        assert_eq!(
            res.set_bool("Nope", true),
            Err(ResourceError::UnknownResource("Nope".into()))
        );
        assert_eq!(
            res.set_int("Switch", 1),
            Err(ResourceError::TypeMismatch("Switch".into()))
        );
        assert_eq!(res.get("Nope"), None);
    }

    #[test]
    fn reset_to_defaults_reapplies_through_the_hook() {
        let calls = Rc::new(Cell::new(0u32));
        let mut res = Resources::new();
        res.register_int("Base", 0xDE40, {
            let calls = calls.clone();
            Box::new(move |_| {
                calls.set(calls.get() + 1);
                Ok(())
            })
        });

        res.set_int("Base", 0xDE48).unwrap();
        res.reset_to_defaults().unwrap();
        assert_eq!(res.get_int("Base"), Some(0xDE40));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn double_registration_panics() {
        let result = std::panic::catch_unwind(|| {
            let mut res = Resources::new();
            res.register_bool("Switch", false, Box::new(|_| Ok(())));
            res.register_bool("Switch", true, Box::new(|_| Ok(())));
        });
        assert!(result.is_err());
    }
}
