//! Property providers
//!
//! A provider is the unit of attachment: a flat map from native property name
//! to [`PropertyValue`], shared through `Rc` by every container it is attached
//! to. It knows nothing about those containers; it only emits its own change
//! signals, which containers forward under formatted names.

use super::error::{DataError, Result};
use super::value::{Property, PropertyKind, PropertyValue};
use crate::events::Signal;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

enum Change {
    None,
    Added,
    Replaced,
}

/// Named, typed key/value store contributed by one data source
pub struct Provider {
    array_name: Option<String>,
    values: RefCell<BTreeMap<String, PropertyValue>>,
    property_added: Signal<str>,
    property_removed: Signal<str>,
    value_changed: Signal<str>,
    reference_changed: Signal<str>,
}

impl Provider {
    fn with_array_name(array_name: Option<String>) -> Self {
        Self {
            array_name,
            values: RefCell::new(BTreeMap::new()),
            property_added: Signal::new(),
            property_removed: Signal::new(),
            value_changed: Signal::new(),
            reference_changed: Signal::new(),
        }
    }

    /// Create a shared plain provider whose names are used verbatim
    pub fn create() -> Rc<Self> {
        Rc::new(Self::with_array_name(None))
    }

    /// Create a shared array provider
    ///
    /// Each container assigns it a slot of `array_name`; a property `priority`
    /// then appears as `array_name[slot].priority`.
    pub fn create_array(array_name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self::with_array_name(Some(array_name.into())))
    }

    /// Set a property and return the provider (builder style)
    #[must_use]
    pub fn with<T: Property>(self: Rc<Self>, name: &str, value: T) -> Rc<Self> {
        self.set(name, value);
        self
    }

    /// Array name, for array providers
    pub fn array_name(&self) -> Option<&str> {
        self.array_name.as_deref()
    }

    /// Whether this provider is array-indexed
    pub const fn is_array(&self) -> bool {
        self.array_name.is_some()
    }

    /// Store `value` under `name`, replacing any previous value
    ///
    /// Emits `property_added` for a new name. Replacing a value with a
    /// different one emits `reference_changed` then `value_changed`; storing an
    /// equal value emits nothing.
    pub fn set<T: Property>(&self, name: &str, value: T) {
        self.set_value(name, value.into_value());
    }

    /// Untyped variant of [`Provider::set`]
    pub fn set_value(&self, name: &str, value: PropertyValue) {
        let change = {
            let mut values = self.values.borrow_mut();
            match values.get_mut(name) {
                None => {
                    values.insert(name.to_owned(), value);
                    Change::Added
                }
                Some(current) if *current == value => Change::None,
                Some(current) => {
                    *current = value;
                    Change::Replaced
                }
            }
        };

        match change {
            Change::None => {}
            Change::Added => self.property_added.emit(name),
            Change::Replaced => {
                self.reference_changed.emit(name);
                self.value_changed.emit(name);
            }
        }
    }

    /// Edit a stored value in place
    ///
    /// Emits only `value_changed`, and only if the value differs afterwards.
    /// `edit` must not access this provider.
    pub fn mutate<F>(&self, name: &str, edit: F) -> Result<()>
    where
        F: FnOnce(&mut PropertyValue),
    {
        let changed = {
            let mut values = self.values.borrow_mut();
            let value = values.get_mut(name).ok_or_else(|| DataError::not_found(name))?;
            let before = value.clone();
            edit(value);
            *value != before
        };

        if changed {
            self.value_changed.emit(name);
        }
        Ok(())
    }

    /// Typed read
    pub fn get<T: Property>(&self, name: &str) -> Result<T> {
        let values = self.values.borrow();
        let value = values.get(name).ok_or_else(|| DataError::not_found(name))?;
        T::from_value(value).ok_or_else(|| DataError::mismatch(name, T::KIND, value.kind()))
    }

    /// Copy of the stored value
    pub fn value(&self, name: &str) -> Option<PropertyValue> {
        self.values.borrow().get(name).cloned()
    }

    /// Run `read` against the stored value without copying it
    pub fn read<R>(&self, name: &str, read: impl FnOnce(&PropertyValue) -> R) -> Option<R> {
        self.values.borrow().get(name).map(read)
    }

    /// Kind of the stored value
    pub fn kind_of(&self, name: &str) -> Option<PropertyKind> {
        self.read(name, PropertyValue::kind)
    }

    /// Whether the stored value is a `T`
    pub fn property_has_type<T: Property>(&self, name: &str) -> Result<bool> {
        self.kind_of(name)
            .map(|kind| kind == T::KIND)
            .ok_or_else(|| DataError::not_found(name))
    }

    /// Whether `name` is stored
    pub fn has_property(&self, name: &str) -> bool {
        self.values.borrow().contains_key(name)
    }

    /// Remove a property, emitting `property_removed`
    pub fn remove(&self, name: &str) -> Option<PropertyValue> {
        let removed = self.values.borrow_mut().remove(name);
        if removed.is_some() {
            self.property_removed.emit(name);
        }
        removed
    }

    /// Native property names, sorted
    pub fn property_names(&self) -> Vec<String> {
        self.values.borrow().keys().cloned().collect()
    }

    /// Number of stored properties
    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    /// Whether no property is stored
    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }

    /// Emitted with the native name after a property is added
    pub const fn property_added(&self) -> &Signal<str> {
        &self.property_added
    }

    /// Emitted with the native name after a property is removed
    pub const fn property_removed(&self) -> &Signal<str> {
        &self.property_removed
    }

    /// Emitted with the native name after a stored value changed
    pub const fn value_changed(&self) -> &Signal<str> {
        &self.value_changed
    }

    /// Emitted with the native name after a stored value was replaced
    pub const fn reference_changed(&self) -> &Signal<str> {
        &self.reference_changed
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("array_name", &self.array_name)
            .field("properties", &self.property_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4;
    use std::cell::Cell;

    fn counter(signal: &Signal<str>) -> (Rc<Cell<u32>>, crate::events::Connection) {
        let count = Rc::new(Cell::new(0));
        let connection = {
            let count = Rc::clone(&count);
            signal.connect(move |_: &str| count.set(count.get() + 1))
        };
        (count, connection)
    }

    #[test]
    fn test_set_new_property_emits_added() {
        let provider = Provider::create();
        let (added, _a) = counter(provider.property_added());
        let (changed, _c) = counter(provider.value_changed());

        provider.set("foo", 1_i32);

        assert_eq!(added.get(), 1);
        assert_eq!(changed.get(), 0);
        assert_eq!(provider.get::<i32>("foo").unwrap(), 1);
    }

    #[test]
    fn test_replace_emits_reference_and_value_changed() {
        let provider = Provider::create().with("foo", 1_i32);
        let (changed, _c) = counter(provider.value_changed());
        let (replaced, _r) = counter(provider.reference_changed());

        provider.set("foo", 2_i32);
        provider.set("foo", 2_i32);

        assert_eq!(changed.get(), 1);
        assert_eq!(replaced.get(), 1);
    }

    #[test]
    fn test_rewriting_nan_emits_nothing() {
        let provider = Provider::create().with("fog.density", f32::NAN);
        let (changed, _c) = counter(provider.value_changed());
        let (replaced, _r) = counter(provider.reference_changed());

        provider.set("fog.density", f32::NAN);

        assert_eq!(changed.get(), 0);
        assert_eq!(replaced.get(), 0);
    }

    #[test]
    fn test_mutate_emits_value_changed_only() {
        let provider = Provider::create().with("transform.modelToWorldMatrix", Mat4::identity());
        let (changed, _c) = counter(provider.value_changed());
        let (replaced, _r) = counter(provider.reference_changed());

        provider
            .mutate("transform.modelToWorldMatrix", |value| {
                if let PropertyValue::Mat4(m) = value {
                    m[(0, 3)] = 5.0;
                }
            })
            .unwrap();

        assert_eq!(changed.get(), 1);
        assert_eq!(replaced.get(), 0);
        assert_eq!(provider.get::<Mat4>("transform.modelToWorldMatrix").unwrap()[(0, 3)], 5.0);
    }

    #[test]
    fn test_mutate_missing_property() {
        let provider = Provider::create();
        let result = provider.mutate("missing", |_| {});
        assert_eq!(result, Err(DataError::not_found("missing")));
    }

    #[test]
    fn test_get_type_mismatch() {
        let provider = Provider::create().with("foo", 1_i32);

        assert_eq!(
            provider.get::<f32>("foo"),
            Err(DataError::mismatch("foo", PropertyKind::Float, PropertyKind::Int))
        );
        assert!(provider.property_has_type::<i32>("foo").unwrap());
        assert!(!provider.property_has_type::<bool>("foo").unwrap());
    }

    #[test]
    fn test_remove_emits_removed() {
        let provider = Provider::create().with("foo", true).with("bar", 2_u32);
        let (removed, _r) = counter(provider.property_removed());

        assert_eq!(provider.remove("foo"), Some(PropertyValue::Bool(true)));
        assert_eq!(provider.remove("foo"), None);

        assert_eq!(removed.get(), 1);
        assert_eq!(provider.property_names(), vec!["bar".to_owned()]);
        assert_eq!(provider.len(), 1);
    }

    #[test]
    fn test_array_provider() {
        let provider = Provider::create_array("material");
        assert!(provider.is_array());
        assert_eq!(provider.array_name(), Some("material"));
        assert!(provider.is_empty());
        assert!(!Provider::create().is_array());
    }
}
