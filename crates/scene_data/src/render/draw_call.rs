//! Draw calls as seen by the property system

use crate::data::format::substitute_variables;
use crate::events::Signal;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;

/// Draw call identifier, unique per [`DrawCallPool`](super::DrawCallPool)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawCallId(pub u32);

impl fmt::Display for DrawCallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "draw#{}", self.0)
    }
}

/// One draw of one geometry with one material
///
/// Carries the `${variable}` bindings used to resolve templated property
/// names (`materialId`, `geometryId`) and the signal through which its
/// z-sorter asks for re-ordering.
pub struct DrawCall {
    id: DrawCallId,
    variables: RefCell<HashMap<String, String>>,
    z_sorted: Cell<bool>,
    zsort_needed: Signal<DrawCallId>,
}

impl DrawCall {
    /// Create a draw call that is not z-sorted and has no variables
    pub fn new(id: DrawCallId) -> Self {
        Self {
            id,
            variables: RefCell::new(HashMap::new()),
            z_sorted: Cell::new(false),
            zsort_needed: Signal::new(),
        }
    }

    /// Set a variable and return the draw call (builder style)
    #[must_use]
    pub fn with_variable(self, name: &str, value: impl ToString) -> Self {
        self.set_variable(name, value);
        self
    }

    /// Enable or disable z-sorting (builder style)
    #[must_use]
    pub fn with_z_sorted(self, z_sorted: bool) -> Self {
        self.z_sorted.set(z_sorted);
        self
    }

    /// Identifier
    pub const fn id(&self) -> DrawCallId {
        self.id
    }

    /// Bind `${name}` to `value`
    pub fn set_variable(&self, name: &str, value: impl ToString) {
        self.variables
            .borrow_mut()
            .insert(name.to_owned(), value.to_string());
    }

    /// Current value of `${name}`
    pub fn variable(&self, name: &str) -> Option<String> {
        self.variables.borrow().get(name).cloned()
    }

    /// Resolve a property name template against this draw call's variables
    pub fn format_property_name(&self, template: &str) -> String {
        substitute_variables(template, &self.variables.borrow())
    }

    /// Whether this draw call takes part in depth ordering
    pub fn z_sorted(&self) -> bool {
        self.z_sorted.get()
    }

    /// Enable or disable depth ordering
    pub fn set_z_sorted(&self, z_sorted: bool) {
        self.z_sorted.set(z_sorted);
    }

    /// Emitted with this draw call's id when it needs re-ordering
    pub const fn zsort_needed(&self) -> &Signal<DrawCallId> {
        &self.zsort_needed
    }
}

impl fmt::Debug for DrawCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawCall")
            .field("id", &self.id)
            .field("variables", &self.variables.borrow())
            .field("z_sorted", &self.z_sorted.get())
            .finish()
    }
}
