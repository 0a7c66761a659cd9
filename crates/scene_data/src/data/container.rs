//! Property containers
//!
//! A [`Container`] merges the properties of every attached [`Provider`] into a
//! single namespace and is the only thing consumers query or subscribe to.
//!
//! ## Ownership rules
//!
//! - Each formatted name maps to exactly one attached provider. A provider
//!   supplying a name that is already present shadows the previous supplier;
//!   when it leaves, the most recently attached remaining supplier takes the
//!   name back.
//! - Per-name channels belong to the container, not to providers, so
//!   subscribers survive shadowing and detach/re-attach cycles.
//! - Container state is never borrowed while a signal is emitted: handlers may
//!   re-enter the container freely.

use super::error::{DataError, Result};
use super::filter::Filter;
use super::format::{
    format_property_name, length_property_array, length_property_name, unformat_property_name,
};
use super::provider::Provider;
use super::value::{Property, PropertyKind, PropertyValue};
use crate::config::ContainerConfig;
use crate::events::{Connection, Signal};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};

/// Container identifier, unique per [`ContainerFactory`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(pub u32);

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Creates containers sharing one configuration and one id counter
#[derive(Debug)]
pub struct ContainerFactory {
    config: ContainerConfig,
    next_id: Cell<u32>,
}

impl ContainerFactory {
    /// Create a factory
    pub fn new(config: ContainerConfig) -> Rc<Self> {
        Rc::new(Self {
            config,
            next_id: Cell::new(0),
        })
    }

    /// Create an empty container
    pub fn create(self: &Rc<Self>) -> Rc<Container> {
        let id = ContainerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        log::trace!("Creating container {}", id);

        Rc::new_cyclic(|weak_self| Container {
            id,
            factory: Rc::clone(self),
            weak_self: weak_self.clone(),
            state: RefCell::new(ContainerState::default()),
            property_added: Signal::new(),
            property_removed: Signal::new(),
            provider_added: Signal::new(),
            provider_removed: Signal::new(),
        })
    }

    /// Configuration applied to every container of this factory
    pub const fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Number of containers created so far
    pub fn containers_created(&self) -> u32 {
        self.next_id.get()
    }
}

/// An attached provider and its per-container bookkeeping
struct Attachment {
    provider: Rc<Provider>,
    uses: usize,
    index: Option<usize>,
    _forwarding: Vec<Connection>,
}

impl Attachment {
    fn native_name<'a>(&self, formatted: &'a str) -> Option<&'a str> {
        unformat_property_name(self.provider.array_name(), self.index, formatted)
    }
}

/// Provider currently answering for a formatted name
struct Owner {
    provider: Rc<Provider>,
    index: Option<usize>,
}

/// Event to emit once the state borrow is released
enum Notification {
    Added(String),
    Removed(String),
    ValueChanged(String),
    ReferenceChanged(String),
}

#[derive(Default)]
struct ContainerState {
    attachments: Vec<Attachment>,
    owners: HashMap<String, Owner>,
    lengths: BTreeMap<String, u32>,
    value_changed: HashMap<String, Signal<str>>,
    reference_changed: HashMap<String, Signal<str>>,
}

impl ContainerState {
    fn position(&self, provider: &Rc<Provider>) -> Option<usize> {
        self.attachments
            .iter()
            .position(|a| Rc::ptr_eq(&a.provider, provider))
    }

    fn attachment(&self, provider: &Rc<Provider>) -> Option<&Attachment> {
        self.position(provider).map(|pos| &self.attachments[pos])
    }

    /// Lowest slot of `array` not held by another provider, preferring
    /// `requested`
    fn free_index(&self, array: &str, requested: Option<usize>) -> usize {
        let taken: Vec<usize> = self
            .attachments
            .iter()
            .filter(|a| a.provider.array_name() == Some(array))
            .filter_map(|a| a.index)
            .collect();

        match requested {
            Some(index) if !taken.contains(&index) => index,
            _ => (0..).find(|i| !taken.contains(i)).unwrap_or(taken.len()),
        }
    }

    fn length_of(&self, name: &str) -> Option<u32> {
        length_property_array(name).and_then(|array| self.lengths.get(array).copied())
    }

    /// Map `formatted` to `provider` unless a later-attached provider
    /// already supplies it
    fn register(
        &mut self,
        formatted: String,
        provider: &Rc<Provider>,
        index: Option<usize>,
        notes: &mut Vec<Notification>,
    ) {
        let shadows = match self.owners.get(&formatted) {
            None => false,
            Some(current) if Rc::ptr_eq(&current.provider, provider) => return,
            Some(current) => {
                if self.position(provider) < self.position(&current.provider) {
                    log::trace!("Property {} stays with a later provider", formatted);
                    return;
                }
                true
            }
        };

        let owner = Owner {
            provider: Rc::clone(provider),
            index,
        };
        self.owners.insert(formatted.clone(), owner);

        if shadows {
            log::debug!("Property {} is now supplied by a later provider", formatted);
            notes.push(Notification::ReferenceChanged(formatted.clone()));
            notes.push(Notification::ValueChanged(formatted));
        } else {
            notes.push(Notification::Added(formatted));
        }
    }

    /// `leaving` no longer supplies `formatted`: hand the name back to a
    /// shadowed provider, or drop it
    fn release(&mut self, formatted: &str, leaving: &Rc<Provider>, notes: &mut Vec<Notification>) {
        match self.owners.get(formatted) {
            Some(owner) if Rc::ptr_eq(&owner.provider, leaving) => {}
            _ => return,
        }

        let fallback = self
            .attachments
            .iter()
            .rev()
            .filter(|a| !Rc::ptr_eq(&a.provider, leaving))
            .find(|a| {
                a.native_name(formatted)
                    .is_some_and(|native| a.provider.has_property(native))
            })
            .map(|a| Owner {
                provider: Rc::clone(&a.provider),
                index: a.index,
            });

        if let Some(owner) = fallback {
            log::debug!("Property {} falls back to a shadowed provider", formatted);
            self.owners.insert(formatted.to_owned(), owner);
            notes.push(Notification::ReferenceChanged(formatted.to_owned()));
            notes.push(Notification::ValueChanged(formatted.to_owned()));
        } else {
            self.owners.remove(formatted);
            notes.push(Notification::Removed(formatted.to_owned()));
        }
    }

    /// Recompute `<array>.length` after a slot was taken or freed
    fn refresh_length(&mut self, array: &str, notes: &mut Vec<Notification>) {
        let length = self
            .attachments
            .iter()
            .filter(|a| a.provider.array_name() == Some(array))
            .filter_map(|a| a.index)
            .max()
            .map(|highest| u32::try_from(highest + 1).unwrap_or(u32::MAX));
        let name = length_property_name(array);

        match (self.lengths.get(array).copied(), length) {
            (None, Some(length)) => {
                self.lengths.insert(array.to_owned(), length);
                notes.push(Notification::Added(name));
            }
            (Some(previous), Some(length)) if previous != length => {
                self.lengths.insert(array.to_owned(), length);
                notes.push(Notification::ValueChanged(name));
            }
            (Some(_), None) => {
                self.lengths.remove(array);
                notes.push(Notification::Removed(name));
            }
            _ => {}
        }
    }
}

/// Aggregated, observable namespace over a set of providers
pub struct Container {
    id: ContainerId,
    factory: Rc<ContainerFactory>,
    weak_self: Weak<Container>,
    state: RefCell<ContainerState>,
    property_added: Signal<str>,
    property_removed: Signal<str>,
    provider_added: Signal<Rc<Provider>>,
    provider_removed: Signal<Rc<Provider>>,
}

impl Container {
    /// Identifier assigned by the factory
    pub const fn id(&self) -> ContainerId {
        self.id
    }

    /// Factory this container was created from
    pub const fn factory(&self) -> &Rc<ContainerFactory> {
        &self.factory
    }

    /// Attach a provider, or increment its usage count if already attached
    ///
    /// Array providers are given the lowest free slot of their array.
    pub fn add_provider(&self, provider: Rc<Provider>) -> Result<()> {
        self.attach(provider, None)
    }

    /// Attach a provider, asking for a specific array slot
    ///
    /// Falls back to the lowest free slot when `index` is taken. Plain
    /// providers ignore `index`.
    pub fn add_provider_at(&self, provider: Rc<Provider>, index: usize) -> Result<()> {
        self.attach(provider, Some(index))
    }

    fn attach(&self, provider: Rc<Provider>, requested: Option<usize>) -> Result<()> {
        let mut notes = Vec::new();
        {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;

            if let Some(pos) = state.position(&provider) {
                let attachment = &mut state.attachments[pos];
                attachment.uses += 1;
                log::trace!(
                    "Container {}: provider use count raised to {}",
                    self.id,
                    attachment.uses
                );
                return Ok(());
            }

            let index = provider
                .array_name()
                .map(|array| state.free_index(array, requested));

            let forwarding = vec![
                self.forward(&provider, provider.property_added(), Self::on_provider_property_added),
                self.forward(&provider, provider.property_removed(), Self::on_provider_property_removed),
                self.forward(&provider, provider.value_changed(), Self::on_provider_value_changed),
                self.forward(&provider, provider.reference_changed(), Self::on_provider_reference_changed),
            ];

            state.attachments.push(Attachment {
                provider: Rc::clone(&provider),
                uses: 1,
                index,
                _forwarding: forwarding,
            });

            for native in provider.property_names() {
                let formatted = format_property_name(provider.array_name(), index, &native);
                state.register(formatted, &provider, index, &mut notes);
            }

            if let Some(array) = provider.array_name() {
                state.refresh_length(array, &mut notes);
            }

            log::debug!(
                "Container {}: attached provider {:?} at slot {:?} ({} providers)",
                self.id,
                provider.array_name(),
                index,
                state.attachments.len()
            );
        }

        self.dispatch(notes);
        self.provider_added.emit(&provider);
        Ok(())
    }

    /// Decrement a provider's usage count, detaching it at zero
    ///
    /// Detaching emits `property_removed` for every name the provider owned
    /// alone, then `provider_removed`.
    pub fn remove_provider(&self, provider: &Rc<Provider>) -> Result<()> {
        let mut notes = Vec::new();
        let detached = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;

            let Some(pos) = state.position(provider) else {
                let message = format!("provider is not attached to container {}", self.id);
                if self.factory.config.validate_providers {
                    return Err(DataError::InvalidProviderState(message));
                }
                log::warn!("{}", message);
                return Ok(());
            };

            let attachment = &mut state.attachments[pos];
            attachment.uses -= 1;
            if attachment.uses > 0 {
                log::trace!(
                    "Container {}: provider use count lowered to {}",
                    self.id,
                    attachment.uses
                );
                return Ok(());
            }

            let detached = state.attachments.remove(pos);

            let mut owned: Vec<String> = state
                .owners
                .iter()
                .filter(|(_, owner)| Rc::ptr_eq(&owner.provider, provider))
                .map(|(name, _)| name.clone())
                .collect();
            owned.sort();
            for name in &owned {
                state.release(name, provider, &mut notes);
            }

            if let Some(array) = provider.array_name() {
                state.refresh_length(array, &mut notes);
            }

            log::debug!(
                "Container {}: detached provider {:?} ({} providers left)",
                self.id,
                provider.array_name(),
                state.attachments.len()
            );
            detached
        };

        drop(detached);
        self.dispatch(notes);
        self.provider_removed.emit(provider);
        Ok(())
    }

    /// Whether the provider is attached
    pub fn has_provider(&self, provider: &Rc<Provider>) -> bool {
        self.state.borrow().position(provider).is_some()
    }

    /// Array slot of an attached array provider
    pub fn provider_index(&self, provider: &Rc<Provider>) -> Option<usize> {
        self.state.borrow().attachment(provider).and_then(|a| a.index)
    }

    /// How many times the provider is currently attached
    pub fn usage_count(&self, provider: &Rc<Provider>) -> usize {
        self.state.borrow().attachment(provider).map_or(0, |a| a.uses)
    }

    /// Attached providers, in attachment order
    pub fn providers(&self) -> Vec<Rc<Provider>> {
        self.state
            .borrow()
            .attachments
            .iter()
            .map(|a| Rc::clone(&a.provider))
            .collect()
    }

    /// Formatted names supplied by attached providers, sorted
    ///
    /// Synthetic length properties are listed by
    /// [`Container::length_properties`].
    pub fn properties(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.borrow().owners.keys().cloned().collect();
        names.sort();
        names
    }

    /// Names of the synthetic `<array>.length` properties, sorted
    pub fn length_properties(&self) -> Vec<String> {
        self.state
            .borrow()
            .lengths
            .keys()
            .map(|array| length_property_name(array))
            .collect()
    }

    /// Whether `name` resolves in this namespace
    pub fn has_property(&self, name: &str) -> bool {
        let state = self.state.borrow();
        state.owners.contains_key(name) || state.length_of(name).is_some()
    }

    /// Whether `name` is a synthetic array length property
    pub fn is_length_property(&self, name: &str) -> bool {
        self.state.borrow().length_of(name).is_some()
    }

    /// Owning provider and native name behind a formatted name
    fn resolve(&self, name: &str) -> Result<(Rc<Provider>, String)> {
        let state = self.state.borrow();
        let owner = state.owners.get(name).ok_or_else(|| DataError::not_found(name))?;
        let native = unformat_property_name(owner.provider.array_name(), owner.index, name)
            .ok_or_else(|| {
                DataError::InvalidProviderState(format!(
                    "{} does not match the slot of its provider",
                    name
                ))
            })?;

        Ok((Rc::clone(&owner.provider), native.to_owned()))
    }

    /// Typed read
    pub fn get<T: Property>(&self, name: &str) -> Result<T> {
        if let Some(length) = self.state.borrow().length_of(name) {
            return T::from_value(&PropertyValue::UInt(length))
                .ok_or_else(|| DataError::mismatch(name, T::KIND, PropertyKind::UInt));
        }

        let (provider, native) = self.resolve(name)?;
        provider
            .read(&native, |value| {
                T::from_value(value).ok_or_else(|| DataError::mismatch(name, T::KIND, value.kind()))
            })
            .unwrap_or_else(|| Err(DataError::not_found(name)))
    }

    /// Untyped read
    pub fn value(&self, name: &str) -> Result<PropertyValue> {
        if let Some(length) = self.state.borrow().length_of(name) {
            return Ok(PropertyValue::UInt(length));
        }

        let (provider, native) = self.resolve(name)?;
        provider.value(&native).ok_or_else(|| DataError::not_found(name))
    }

    /// Typed write through to the owning provider
    ///
    /// The stored value must already be a `T`; the provider then emits the
    /// change, which this container re-emits under `name`.
    pub fn set<T: Property>(&self, name: &str, value: T) -> Result<()> {
        if self.is_length_property(name) {
            return Err(DataError::ReadOnlyProperty {
                name: name.to_owned(),
            });
        }

        let (provider, native) = self.resolve(name)?;
        let found = provider
            .kind_of(&native)
            .ok_or_else(|| DataError::not_found(name))?;
        if found != T::KIND {
            return Err(DataError::mismatch(name, T::KIND, found));
        }

        provider.set(&native, value);
        Ok(())
    }

    /// Whether the value stored under `name` is a `T`
    pub fn property_has_type<T: Property>(&self, name: &str) -> Result<bool> {
        if self.is_length_property(name) {
            return Ok(T::KIND == PropertyKind::UInt);
        }

        let (provider, native) = self.resolve(name)?;
        provider
            .kind_of(&native)
            .map(|kind| kind == T::KIND)
            .ok_or_else(|| DataError::not_found(name))
    }

    /// Emitted with the formatted name after a property appears
    pub const fn property_added(&self) -> &Signal<str> {
        &self.property_added
    }

    /// Emitted with the formatted name after a property disappears
    pub const fn property_removed(&self) -> &Signal<str> {
        &self.property_removed
    }

    /// Emitted after a provider is attached (not on usage count increments)
    pub const fn provider_added(&self) -> &Signal<Rc<Provider>> {
        &self.provider_added
    }

    /// Emitted after a provider is detached
    pub const fn provider_removed(&self) -> &Signal<Rc<Provider>> {
        &self.provider_removed
    }

    /// Channel fired when the value under `name` changes
    ///
    /// Created on first request and kept for the container's lifetime, whether
    /// or not `name` currently exists.
    pub fn property_value_changed(&self, name: &str) -> Signal<str> {
        self.state
            .borrow_mut()
            .value_changed
            .entry(name.to_owned())
            .or_default()
            .clone()
    }

    /// Channel fired when the value under `name` is replaced wholesale
    pub fn property_reference_changed(&self, name: &str) -> Signal<str> {
        self.state
            .borrow_mut()
            .reference_changed
            .entry(name.to_owned())
            .or_default()
            .clone()
    }

    /// Container holding the attached providers accepted by every filter
    ///
    /// Providers are added to `output` when given, otherwise to a new
    /// container from the same factory. Array providers keep their slot when
    /// it is free, so formatted names match between the two namespaces.
    pub fn filter(&self, filters: &[&dyn Filter], output: Option<Rc<Self>>) -> Result<Rc<Self>> {
        let output = output.unwrap_or_else(|| self.factory.create());
        let candidates: Vec<(Rc<Provider>, Option<usize>)> = self
            .state
            .borrow()
            .attachments
            .iter()
            .map(|a| (Rc::clone(&a.provider), a.index))
            .collect();

        for (provider, index) in candidates {
            if output.has_provider(&provider) || !filters.iter().all(|f| f.accepts(&provider)) {
                continue;
            }
            match index {
                Some(index) => output.add_provider_at(provider, index)?,
                None => output.add_provider(provider)?,
            }
        }

        log::trace!(
            "Container {}: filtered {} of its providers into container {}",
            self.id,
            output.state.borrow().attachments.len(),
            output.id
        );
        Ok(output)
    }

    /// Connect one provider signal to a container handler
    fn forward(
        &self,
        provider: &Rc<Provider>,
        signal: &Signal<str>,
        handler: fn(&Self, &Rc<Provider>, &str),
    ) -> Connection {
        let container = self.weak_self.clone();
        let source = Rc::downgrade(provider);

        signal.connect(move |native: &str| {
            if let (Some(container), Some(provider)) = (container.upgrade(), source.upgrade()) {
                handler(&container, &provider, native);
            }
        })
    }

    /// Formatted name of `native` if `provider` currently owns it
    fn owned_name(&self, provider: &Rc<Provider>, native: &str) -> Option<String> {
        let state = self.state.borrow();
        let index = state.attachment(provider)?.index;
        let formatted = format_property_name(provider.array_name(), index, native);

        state
            .owners
            .get(&formatted)
            .filter(|owner| Rc::ptr_eq(&owner.provider, provider))
            .map(|_| formatted)
    }

    fn on_provider_property_added(&self, provider: &Rc<Provider>, native: &str) {
        let mut notes = Vec::new();
        {
            let mut state = self.state.borrow_mut();
            let Some(index) = state.attachment(provider).map(|a| a.index) else {
                return;
            };
            let formatted = format_property_name(provider.array_name(), index, native);
            state.register(formatted, provider, index, &mut notes);
        }
        self.dispatch(notes);
    }

    fn on_provider_property_removed(&self, provider: &Rc<Provider>, native: &str) {
        let mut notes = Vec::new();
        {
            let mut state = self.state.borrow_mut();
            let Some(index) = state.attachment(provider).map(|a| a.index) else {
                return;
            };
            let formatted = format_property_name(provider.array_name(), index, native);
            state.release(&formatted, provider, &mut notes);
        }
        self.dispatch(notes);
    }

    fn on_provider_value_changed(&self, provider: &Rc<Provider>, native: &str) {
        if let Some(formatted) = self.owned_name(provider, native) {
            self.dispatch(vec![Notification::ValueChanged(formatted)]);
        }
    }

    fn on_provider_reference_changed(&self, provider: &Rc<Provider>, native: &str) {
        if let Some(formatted) = self.owned_name(provider, native) {
            self.dispatch(vec![Notification::ReferenceChanged(formatted)]);
        }
    }

    fn dispatch(&self, notes: Vec<Notification>) {
        for note in notes {
            match note {
                Notification::Added(name) => self.property_added.emit(&name),
                Notification::Removed(name) => self.property_removed.emit(&name),
                Notification::ValueChanged(name) => {
                    let channel = self.state.borrow().value_changed.get(&name).cloned();
                    if let Some(channel) = channel {
                        channel.emit(&name);
                    }
                }
                Notification::ReferenceChanged(name) => {
                    let channel = self.state.borrow().reference_changed.get(&name).cloned();
                    if let Some(channel) = channel {
                        channel.emit(&name);
                    }
                }
            }
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Container")
            .field("id", &self.id)
            .field("providers", &state.attachments.len())
            .field("properties", &state.owners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ArrayNameFilter, PropertyFilter};
    use crate::foundation::math::Mat4;

    fn factory() -> Rc<ContainerFactory> {
        ContainerFactory::new(ContainerConfig::default().with_validation(true))
    }

    fn record(signal: &Signal<str>) -> (Rc<RefCell<Vec<String>>>, Connection) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let connection = {
            let log = Rc::clone(&log);
            signal.connect(move |name: &str| log.borrow_mut().push(name.to_owned()))
        };
        (log, connection)
    }

    #[test]
    fn test_empty_container() {
        let container = factory().create();

        assert!(!container.has_property("x"));
        assert_eq!(container.get::<i32>("x"), Err(DataError::not_found("x")));
        assert!(container.properties().is_empty());
    }

    #[test]
    fn test_factory_assigns_sequential_ids() {
        let factory = factory();
        let first = factory.create();
        let second = factory.create();

        assert_eq!(first.id(), ContainerId(0));
        assert_eq!(second.id(), ContainerId(1));
        assert_eq!(factory.containers_created(), 2);
    }

    #[test]
    fn test_get_set_and_value_changed() {
        let container = factory().create();
        let provider = Provider::create().with("foo", 1_i32);
        container.add_provider(Rc::clone(&provider)).unwrap();

        let (changed, _c) = record(&container.property_value_changed("foo"));

        assert_eq!(container.get::<i32>("foo").unwrap(), 1);
        container.set("foo", 2_i32).unwrap();

        assert_eq!(*changed.borrow(), vec!["foo".to_owned()]);
        assert_eq!(container.get::<i32>("foo").unwrap(), 2);
        assert_eq!(provider.get::<i32>("foo").unwrap(), 2);
    }

    #[test]
    fn test_set_type_mismatch() {
        let container = factory().create();
        container
            .add_provider(Provider::create().with("foo", 1_i32))
            .unwrap();

        assert_eq!(
            container.set("foo", 1.0_f32),
            Err(DataError::mismatch("foo", PropertyKind::Float, PropertyKind::Int))
        );
        assert_eq!(
            container.get::<bool>("foo"),
            Err(DataError::mismatch("foo", PropertyKind::Bool, PropertyKind::Int))
        );
        assert!(container.property_has_type::<i32>("foo").unwrap());
        assert_eq!(container.set("missing", 1_i32), Err(DataError::not_found("missing")));
    }

    #[test]
    fn test_array_providers_get_distinct_slots() {
        let container = factory().create();
        let first = Provider::create_array("item").with("v", 10_i32);
        let second = Provider::create_array("item").with("v", 20_i32);

        container.add_provider(Rc::clone(&first)).unwrap();
        container.add_provider(Rc::clone(&second)).unwrap();

        assert_eq!(container.get::<i32>("item[0].v").unwrap(), 10);
        assert_eq!(container.get::<i32>("item[1].v").unwrap(), 20);
        assert_eq!(container.provider_index(&first), Some(0));
        assert_eq!(container.provider_index(&second), Some(1));
        assert_eq!(container.properties(), vec!["item[0].v", "item[1].v"]);

        container.set("item[1].v", 21_i32).unwrap();
        assert_eq!(first.get::<i32>("v").unwrap(), 10);
        assert_eq!(second.get::<i32>("v").unwrap(), 21);
    }

    #[test]
    fn test_length_property() {
        let container = factory().create();
        let (added, _a) = record(container.property_added());
        let (removed, _r) = record(container.property_removed());
        let first = Provider::create_array("material").with("priority", 1.0_f32);
        let second = Provider::create_array("material").with("priority", 2.0_f32);

        container.add_provider(Rc::clone(&first)).unwrap();
        let (length_changed, _l) = record(&container.property_value_changed("material.length"));
        container.add_provider(Rc::clone(&second)).unwrap();

        assert!(container.is_length_property("material.length"));
        assert!(!container.is_length_property("material[0].priority"));
        assert_eq!(container.get::<u32>("material.length").unwrap(), 2);
        assert_eq!(container.length_properties(), vec!["material.length"]);
        assert_eq!(*length_changed.borrow(), vec!["material.length"]);
        assert_eq!(
            container.set("material.length", 5_u32),
            Err(DataError::ReadOnlyProperty {
                name: "material.length".to_owned()
            })
        );

        container.remove_provider(&first).unwrap();
        assert_eq!(container.get::<u32>("material.length").unwrap(), 2);
        container.remove_provider(&second).unwrap();
        assert!(!container.has_property("material.length"));

        assert!(added.borrow().contains(&"material.length".to_owned()));
        assert!(removed.borrow().contains(&"material.length".to_owned()));
    }

    #[test]
    fn test_freed_slot_is_reused() {
        let container = factory().create();
        let a = Provider::create_array("geometry").with("position", 1_i32);
        let b = Provider::create_array("geometry").with("position", 2_i32);
        let c = Provider::create_array("geometry").with("position", 3_i32);

        container.add_provider(Rc::clone(&a)).unwrap();
        container.add_provider(Rc::clone(&b)).unwrap();
        container.remove_provider(&a).unwrap();
        container.add_provider(Rc::clone(&c)).unwrap();

        assert_eq!(container.provider_index(&c), Some(0));
        assert_eq!(container.get::<i32>("geometry[0].position").unwrap(), 3);
        assert_eq!(container.get::<i32>("geometry[1].position").unwrap(), 2);
    }

    #[test]
    fn test_usage_count() {
        let container = factory().create();
        let provider = Provider::create().with("foo", 1_i32);
        let (removed, _r) = record(container.property_removed());

        container.add_provider(Rc::clone(&provider)).unwrap();
        container.add_provider(Rc::clone(&provider)).unwrap();
        assert_eq!(container.usage_count(&provider), 2);
        assert_eq!(container.providers().len(), 1);

        container.remove_provider(&provider).unwrap();
        assert!(container.has_property("foo"));
        assert!(removed.borrow().is_empty());

        container.remove_provider(&provider).unwrap();
        assert!(!container.has_property("foo"));
        assert_eq!(*removed.borrow(), vec!["foo"]);
        assert_eq!(container.usage_count(&provider), 0);
    }

    #[test]
    fn test_remove_absent_provider() {
        let provider = Provider::create();

        let strict = factory().create();
        assert!(matches!(
            strict.remove_provider(&provider),
            Err(DataError::InvalidProviderState(_))
        ));

        let lenient = ContainerFactory::new(ContainerConfig::default().with_validation(false)).create();
        assert_eq!(lenient.remove_provider(&provider), Ok(()));
    }

    #[test]
    fn test_remove_emits_only_own_names() {
        let container = factory().create();
        let camera = Provider::create().with("camera.position", 1_i32);
        let transform = Provider::create()
            .with("transform.modelToWorldMatrix", Mat4::identity())
            .with("transform.worldToModelMatrix", Mat4::identity());
        container.add_provider(Rc::clone(&camera)).unwrap();
        container.add_provider(Rc::clone(&transform)).unwrap();

        let (removed, _r) = record(container.property_removed());
        let (providers_removed, _p) = {
            let count = Rc::new(Cell::new(0));
            let c = Rc::clone(&count);
            (count, container.provider_removed().connect(move |_| c.set(c.get() + 1)))
        };
        container.remove_provider(&transform).unwrap();

        assert_eq!(
            *removed.borrow(),
            vec!["transform.modelToWorldMatrix", "transform.worldToModelMatrix"]
        );
        assert_eq!(providers_removed.get(), 1);
        assert_eq!(container.properties(), vec!["camera.position"]);
    }

    #[test]
    fn test_provider_mutations_are_forwarded() {
        let container = factory().create();
        let material = Provider::create_array("material");
        container.add_provider(Rc::clone(&material)).unwrap();

        let (added, _a) = record(container.property_added());
        let (removed, _r) = record(container.property_removed());
        let (changed, _c) = record(&container.property_value_changed("material[0].zSort"));
        let (replaced, _rc) = record(&container.property_reference_changed("material[0].zSort"));

        material.set("zSort", false);
        material.set("zSort", true);
        material.remove("zSort");

        assert_eq!(*added.borrow(), vec!["material[0].zSort"]);
        assert_eq!(*changed.borrow(), vec!["material[0].zSort"]);
        assert_eq!(*replaced.borrow(), vec!["material[0].zSort"]);
        assert_eq!(*removed.borrow(), vec!["material[0].zSort"]);
    }

    #[test]
    fn test_detached_provider_is_not_forwarded() {
        let container = factory().create();
        let provider = Provider::create().with("foo", 1_i32);
        container.add_provider(Rc::clone(&provider)).unwrap();
        container.remove_provider(&provider).unwrap();

        let (added, _a) = record(container.property_added());
        let (changed, _c) = record(&container.property_value_changed("foo"));
        provider.set("foo", 2_i32);
        provider.set("bar", 3_i32);

        assert!(added.borrow().is_empty());
        assert!(changed.borrow().is_empty());
        assert!(!container.has_property("bar"));
    }

    #[test]
    fn test_shadowing_falls_back_to_earlier_provider() {
        let container = factory().create();
        let base = Provider::create().with("color", 1_i32);
        let overlay = Provider::create().with("color", 2_i32);
        container.add_provider(Rc::clone(&base)).unwrap();

        let (changed, _c) = record(&container.property_value_changed("color"));
        let (removed, _r) = record(container.property_removed());

        container.add_provider(Rc::clone(&overlay)).unwrap();
        assert_eq!(container.get::<i32>("color").unwrap(), 2);

        base.set("color", 10_i32);
        assert_eq!(changed.borrow().len(), 1);

        container.remove_provider(&overlay).unwrap();
        assert_eq!(container.get::<i32>("color").unwrap(), 10);
        assert_eq!(changed.borrow().len(), 2);
        assert!(removed.borrow().is_empty());
        assert_eq!(container.properties(), vec!["color"]);
    }

    #[test]
    fn test_name_added_by_shadowed_provider_stays_with_later_provider() {
        let container = factory().create();
        let base = Provider::create().with("color", 1_i32);
        let overlay = Provider::create().with("color", 2_i32).with("x", 20_i32);
        container.add_provider(Rc::clone(&base)).unwrap();
        container.add_provider(Rc::clone(&overlay)).unwrap();

        let (added, _a) = record(container.property_added());
        let (changed, _c) = record(&container.property_value_changed("x"));

        base.set("x", 10_i32);
        assert_eq!(container.get::<i32>("x").unwrap(), 20);
        assert!(added.borrow().is_empty());
        assert!(changed.borrow().is_empty());

        overlay.set("x", 21_i32);
        assert_eq!(container.get::<i32>("x").unwrap(), 21);
        assert_eq!(changed.borrow().len(), 1);

        container.remove_provider(&overlay).unwrap();
        assert_eq!(container.get::<i32>("x").unwrap(), 10);
        assert_eq!(container.get::<i32>("color").unwrap(), 1);
    }

    #[test]
    fn test_value_channel_survives_reattach() {
        let container = factory().create();
        let provider = Provider::create().with("foo", 1_i32);
        let (changed, _c) = record(&container.property_value_changed("foo"));

        container.add_provider(Rc::clone(&provider)).unwrap();
        container.remove_provider(&provider).unwrap();
        container.add_provider(Rc::clone(&provider)).unwrap();
        provider.set("foo", 5_i32);

        assert_eq!(*changed.borrow(), vec!["foo"]);
        assert_eq!(container.get::<i32>("foo").unwrap(), 5);
    }

    #[test]
    fn test_handler_can_reenter_container() {
        let container = factory().create();
        let provider = Provider::create().with("foo", 1_i32);
        let seen = Rc::new(Cell::new(0));

        let _connection = {
            let weak = Rc::downgrade(&container);
            let seen = Rc::clone(&seen);
            container.property_added().connect(move |name: &str| {
                if let Some(container) = weak.upgrade() {
                    seen.set(container.get::<i32>(name).unwrap());
                    let _ = container.property_value_changed(name);
                }
            })
        };
        container.add_provider(provider).unwrap();

        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn test_filter_preserves_slots() {
        let factory = factory();
        let container = factory.create();
        let camera = Provider::create().with("camera.position", 0_i32);
        let first = Provider::create_array("material").with("priority", 1.0_f32);
        let second = Provider::create_array("material").with("priority", 2.0_f32);
        container.add_provider(Rc::clone(&camera)).unwrap();
        container.add_provider(Rc::clone(&first)).unwrap();
        container.add_provider(Rc::clone(&second)).unwrap();

        let by_array = ArrayNameFilter::new("material");
        let has_priority = PropertyFilter::new("priority");
        let filters: [&dyn Filter; 2] = [&by_array, &has_priority];
        let scoped = container.filter(&filters, None).unwrap();

        assert_ne!(scoped.id(), container.id());
        assert!(!scoped.has_provider(&camera));
        assert_eq!(scoped.get::<f32>("material[1].priority").unwrap(), 2.0);
        assert_eq!(scoped.properties(), vec!["material[0].priority", "material[1].priority"]);

        let output = factory.create();
        let populated = container.filter(&[], Some(Rc::clone(&output))).unwrap();
        assert!(Rc::ptr_eq(&populated, &output));
        assert_eq!(output.providers().len(), 3);
    }
}
