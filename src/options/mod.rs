//! Named solver options bound to backend state
//!
//! An [`OptionRegistry`] maps case-insensitive option names to typed
//! accessors on a backend `B`. Three kinds of binding are supported:
//!
//! - a field of the backend ([`OptionRegistry::add_stored_option`], or the
//!   [`stored_option!`](crate::stored_option) macro),
//! - a getter/setter method pair ([`OptionRegistry::add_method_option`]),
//! - a native solver parameter key ([`OptionRegistry::add_solver_option`]),
//!   read and written through the backend's [`NativeParameters`] impl.
//!
//! Values are never coerced: reading an `int` option as `f64`, or setting it
//! from a float, is an [`OptionError::OptionTypeMismatch`].
//!
//! ```rust
//! use mpconv::options::OptionRegistry;
//! use mpconv::stored_option;
//!
//! #[derive(Default)]
//! struct Settings {
//!     threads: i64,
//! }
//!
//! let mut registry = OptionRegistry::<Settings>::new();
//! stored_option!(registry, "threads", "Number of threads", threads).unwrap();
//!
//! let mut settings = Settings::default();
//! registry.parse_option_string(&mut settings, "Threads=4").unwrap();
//! assert_eq!(settings.threads, 4);
//! assert_eq!(registry.get::<i64>(&settings, "THREADS").unwrap(), 4);
//! ```

mod value;

pub use value::{OptionKind, OptionType, OptionValue};

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use prettytable::*;
use regex::Regex;

use crate::error::OptionError;

/// Typed access to a backend's native parameters.
///
/// Implemented once per value type a backend supports, mirroring native
/// APIs that have separate int, double and string parameter calls.
pub trait NativeParameters<T: OptionKind> {
    type Key: Clone + 'static;

    fn get_native(&self, key: &Self::Key) -> anyhow::Result<T>;

    fn set_native(&mut self, key: &Self::Key, value: T) -> anyhow::Result<()>;
}

type Getter<B> = Box<dyn Fn(&B) -> Result<OptionValue, OptionError>>;
type Setter<B> = Box<dyn Fn(&mut B, OptionValue) -> Result<(), OptionError>>;

/// A registered option.
pub struct SolverOption<B> {
    name: String,
    description: String,
    option_type: OptionType,
    getter: Getter<B>,
    setter: Setter<B>,
}

impl<B> SolverOption<B> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn option_type(&self) -> OptionType {
        self.option_type
    }
}

impl<B> std::fmt::Debug for SolverOption<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolverOption")
            .field("name", &self.name)
            .field("option_type", &self.option_type)
            .finish()
    }
}

lazy_static! {
    static ref OPTION_ASSIGNMENT: Regex =
        Regex::new(r#"([A-Za-z_][A-Za-z0-9_.]*)(?:\s*=\s*|\s+)("[^"]*"|'[^']*'|[^\s"'=]+)"#)
            .expect("option assignment pattern is valid");
}

fn mismatch(name: &str, expected: OptionType, found: OptionType) -> OptionError {
    OptionError::OptionTypeMismatch {
        name: name.to_string(),
        expected,
        found,
    }
}

fn invalid(name: &str, value: &OptionValue) -> OptionError {
    OptionError::InvalidOptionValue {
        name: name.to_string(),
        value: value.to_string(),
    }
}

/// Option table for backend type `B`.
#[derive(Debug)]
pub struct OptionRegistry<B> {
    options: BTreeMap<String, SolverOption<B>>,
}

impl<B> Default for OptionRegistry<B> {
    fn default() -> Self {
        Self {
            options: BTreeMap::new(),
        }
    }
}

impl<B: 'static> OptionRegistry<B> {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&mut self, option: SolverOption<B>) -> Result<(), OptionError> {
        let key = option.name.to_lowercase();
        if self.options.contains_key(&key) {
            return Err(OptionError::DuplicateOption { name: option.name });
        }
        self.options.insert(key, option);
        Ok(())
    }

    /// Bind an option to a backend field.
    pub fn add_stored_option<T: OptionKind>(
        &mut self,
        name: &str,
        description: &str,
        read: fn(&B) -> &T,
        write: fn(&mut B) -> &mut T,
    ) -> Result<(), OptionError> {
        let option_name = name.to_string();
        self.register(SolverOption {
            name: name.to_string(),
            description: description.to_string(),
            option_type: T::TYPE,
            getter: Box::new(move |backend: &B| Ok(read(backend).clone().into_value())),
            setter: Box::new(move |backend: &mut B, value: OptionValue| {
                let found = value.option_type();
                *write(backend) =
                    T::from_value(value).ok_or_else(|| mismatch(&option_name, T::TYPE, found))?;
                Ok(())
            }),
        })
    }

    /// Bind an option to a getter/setter pair. Setter errors are reported as
    /// invalid values.
    pub fn add_method_option<T: OptionKind>(
        &mut self,
        name: &str,
        description: &str,
        get: fn(&B) -> T,
        set: fn(&mut B, T) -> anyhow::Result<()>,
    ) -> Result<(), OptionError> {
        let option_name = name.to_string();
        self.register(SolverOption {
            name: name.to_string(),
            description: description.to_string(),
            option_type: T::TYPE,
            getter: Box::new(move |backend: &B| Ok(get(backend).into_value())),
            setter: Box::new(move |backend: &mut B, value: OptionValue| {
                let found = value.option_type();
                let typed = T::from_value(value.clone())
                    .ok_or_else(|| mismatch(&option_name, T::TYPE, found))?;
                set(backend, typed).map_err(|_| invalid(&option_name, &value))
            }),
        })
    }

    /// Bind an option to a native parameter key.
    pub fn add_solver_option<T>(
        &mut self,
        name: &str,
        description: &str,
        key: <B as NativeParameters<T>>::Key,
    ) -> Result<(), OptionError>
    where
        T: OptionKind,
        B: NativeParameters<T>,
    {
        let get_name = name.to_string();
        let set_name = name.to_string();
        let get_key = key.clone();
        self.register(SolverOption {
            name: name.to_string(),
            description: description.to_string(),
            option_type: T::TYPE,
            getter: Box::new(move |backend: &B| {
                <B as NativeParameters<T>>::get_native(backend, &get_key)
                    .map(OptionKind::into_value)
                    .map_err(|err| OptionError::Access {
                        name: get_name.clone(),
                        message: err.to_string(),
                    })
            }),
            setter: Box::new(move |backend: &mut B, value: OptionValue| {
                let found = value.option_type();
                let typed = T::from_value(value.clone())
                    .ok_or_else(|| mismatch(&set_name, T::TYPE, found))?;
                <B as NativeParameters<T>>::set_native(backend, &key, typed)
                    .map_err(|_| invalid(&set_name, &value))
            }),
        })
    }

    pub fn find(&self, name: &str) -> Result<&SolverOption<B>, OptionError> {
        self.options
            .get(&name.to_lowercase())
            .ok_or_else(|| OptionError::UnknownOption {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.options.contains_key(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Registered options in name order.
    pub fn iter(&self) -> impl Iterator<Item = &SolverOption<B>> {
        self.options.values()
    }

    pub fn get<T: OptionKind>(&self, backend: &B, name: &str) -> Result<T, OptionError> {
        let option = self.find(name)?;
        if option.option_type != T::TYPE {
            return Err(mismatch(&option.name, option.option_type, T::TYPE));
        }
        let value = (option.getter)(backend)?;
        let found = value.option_type();
        T::from_value(value).ok_or_else(|| mismatch(&option.name, T::TYPE, found))
    }

    pub fn get_value(&self, backend: &B, name: &str) -> Result<OptionValue, OptionError> {
        let option = self.find(name)?;
        (option.getter)(backend)
    }

    pub fn set(
        &self,
        backend: &mut B,
        name: &str,
        value: impl Into<OptionValue>,
    ) -> Result<(), OptionError> {
        let option = self.find(name)?;
        let value = value.into();
        if value.option_type() != option.option_type {
            return Err(mismatch(&option.name, option.option_type, value.option_type()));
        }
        (option.setter)(backend, value)
    }

    /// Parse `text` according to the option's declared type and set it.
    pub fn parse_and_set(&self, backend: &mut B, name: &str, text: &str) -> Result<(), OptionError> {
        let option = self.find(name)?;
        let value = OptionValue::parse(option.option_type, text).ok_or_else(|| {
            OptionError::InvalidOptionValue {
                name: option.name.clone(),
                value: text.to_string(),
            }
        })?;
        (option.setter)(backend, value)
    }

    /// Apply a whitespace separated list of `name=value` (or `name value`)
    /// assignments. Returns the number of options set.
    ///
    /// Stops at the first failing assignment.
    pub fn parse_option_string(&self, backend: &mut B, text: &str) -> Result<usize, OptionError> {
        let mut count = 0;
        let mut consumed = 0;
        for captures in OPTION_ASSIGNMENT.captures_iter(text) {
            let (Some(whole), Some(name), Some(value)) =
                (captures.get(0), captures.get(1), captures.get(2))
            else {
                continue;
            };
            check_gap(&text[consumed..whole.start()])?;
            // `name other=1`: the token after `name` is the next option, not a value.
            if text[whole.end()..].trim_start().starts_with('=') {
                return Err(OptionError::InvalidOptionValue {
                    name: name.as_str().to_string(),
                    value: String::new(),
                });
            }
            consumed = whole.end();
            self.parse_and_set(backend, name.as_str(), value.as_str())?;
            count += 1;
        }
        check_gap(&text[consumed..])?;
        Ok(count)
    }

    /// Table of registered options for help output.
    pub fn format_help(&self) -> String {
        let mut table = Table::new();
        table.set_titles(row!["Option", "Type", "Description"]);
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        for option in self.options.values() {
            table.add_row(row![
                option.name.as_str(),
                option.option_type.to_string(),
                option.description.as_str(),
            ]);
        }
        table.to_string()
    }
}

fn check_gap(gap: &str) -> Result<(), OptionError> {
    let leftover = gap.trim();
    if leftover.is_empty() {
        Ok(())
    } else {
        Err(OptionError::InvalidOptionValue {
            name: leftover.split_whitespace().next().unwrap_or(leftover).to_string(),
            value: leftover.to_string(),
        })
    }
}

/// Register a backend field as a stored option.
///
/// ```rust
/// use mpconv::options::OptionRegistry;
/// use mpconv::stored_option;
///
/// struct Backend {
///     limits: Limits,
/// }
/// struct Limits {
///     time: f64,
/// }
///
/// let mut registry = OptionRegistry::<Backend>::new();
/// stored_option!(registry, "timelim", "Time limit in seconds", limits.time).unwrap();
/// ```
#[macro_export]
macro_rules! stored_option {
    ($registry:expr, $name:expr, $description:expr, $($field:ident).+) => {
        $registry.add_stored_option(
            $name,
            $description,
            |backend| &backend.$($field).+,
            |backend| &mut backend.$($field).+,
        )
    };
}
