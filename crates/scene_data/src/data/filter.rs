//! Provider filters for [`Container::filter`](super::Container::filter)

use super::provider::Provider;

/// Predicate over providers
pub trait Filter {
    /// Whether `provider` passes the filter
    fn accepts(&self, provider: &Provider) -> bool;
}

/// Accepts array providers of one array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayNameFilter {
    array_name: String,
}

impl ArrayNameFilter {
    /// Filter on `array_name`
    pub fn new(array_name: impl Into<String>) -> Self {
        Self {
            array_name: array_name.into(),
        }
    }
}

impl Filter for ArrayNameFilter {
    fn accepts(&self, provider: &Provider) -> bool {
        provider.array_name() == Some(self.array_name.as_str())
    }
}

/// Accepts providers storing a property under the given native name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyFilter {
    name: String,
}

impl PropertyFilter {
    /// Filter on the native property `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Filter for PropertyFilter {
    fn accepts(&self, provider: &Provider) -> bool {
        provider.has_property(&self.name)
    }
}

/// Filter from a closure
pub struct FnFilter<F>(pub F);

impl<F> Filter for FnFilter<F>
where
    F: Fn(&Provider) -> bool,
{
    fn accepts(&self, provider: &Provider) -> bool {
        (self.0)(provider)
    }
}
