use std::any::{Any, TypeId};
use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use crate::error::NamerError;
use crate::namer::ObjectNamer;

/// Upcasts to [`Any`] so that named objects can be downcast to their
/// concrete types.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// A shared handle to a named object of any type.
pub type ObjectRef = Rc<dyn NamedObject>;

/// Where a named object is in its deletion lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Live,
    /// Deletion was requested and the object is waiting for dependent
    /// work to finish before calling [`NamedObjectCore::complete_deletion`].
    DeletionPending,
    Deleted,
}

/// An object that carries a name and, when interned, is registered with an
/// [`ObjectNamer`] under that name.
///
/// Implementors embed a [`NamedObjectCore`] and return it from
/// [`core`](NamedObject::core); everything else has default behavior.
///
/// Deletion is two-phase. [`delete`](NamedObject::delete) checks that the
/// object may be deleted, marks it pending, and calls
/// [`on_delete`](NamedObject::on_delete). The default `on_delete` finishes
/// immediately; an override may instead defer until its own cleanup is done
/// and then call [`NamedObjectCore::complete_deletion`].
pub trait NamedObject: AsAny + fmt::Debug {
    fn core(&self) -> &NamedObjectCore;

    fn name(&self) -> &str {
        self.core().name()
    }

    fn is_interned(&self) -> bool {
        self.core().is_interned()
    }

    /// The fully qualified name of the concrete type.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Whether the object may be deleted right now: it is live and
    /// [`may_delete`](NamedObject::may_delete) allows it.
    fn can_delete(&self) -> bool {
        self.core().lifecycle() == Lifecycle::Live && self.may_delete()
    }

    /// Type-specific veto consulted by
    /// [`can_delete`](NamedObject::can_delete).
    fn may_delete(&self) -> bool {
        true
    }

    /// Called once deletion has been accepted.
    fn on_delete(&self) {
        self.core().complete_deletion();
    }

    /// Requests deletion.
    ///
    /// Returns `false` without side effects if the object may not be
    /// deleted, is already deleted or pending, or (for interned objects) is
    /// no longer the object registered under its name. An interned object
    /// whose namer has been dropped has no registration left to check.
    fn delete(&self) -> bool {
        let core = self.core();
        if !self.can_delete() || core.lifecycle() != Lifecycle::Live {
            return false;
        }
        if core.is_interned()
            && let Some(namer) = core.namer()
        {
            let current =
                namer.local_object(core.name()).is_some_and(|registered| {
                    std::ptr::addr_eq(Rc::as_ptr(&registered), self as *const Self)
                });
            if !current {
                debug!(name = core.name(), "stale object not deleted");
                return false;
            }
        }
        core.state.set(Lifecycle::DeletionPending);
        trace!(name = core.name(), "deletion pending");
        self.on_delete();
        true
    }

    fn is_deleted(&self) -> bool {
        self.core().lifecycle() == Lifecycle::Deleted
    }

    fn is_deletion_pending(&self) -> bool {
        self.core().lifecycle() == Lifecycle::DeletionPending
    }
}

impl dyn NamedObject {
    /// The [`TypeId`] of the concrete type behind the handle.
    pub fn type_id_of(&self) -> TypeId {
        self.as_any().type_id()
    }

    pub fn is<T: NamedObject>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: NamedObject>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Downcasts a shared handle to its concrete type.
pub fn downcast_object<T: NamedObject>(object: ObjectRef) -> Option<Rc<T>> {
    <dyn NamedObject as AsAny>::into_any_rc(object).downcast::<T>().ok()
}

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// The next value of the process-wide id counter, wrapping to zero on
/// overflow.
fn next_id() -> u64 {
    NEXT_ID
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| {
            Some(id.checked_add(1).unwrap_or(0))
        })
        .unwrap_or_else(|id| id)
}

/// Generates a name of the form `[<type name><id>]` for an object of type
/// `T`.
pub fn generated_name<T: ?Sized + 'static>() -> String {
    format!("[{}{}]", std::any::type_name::<T>(), next_id())
}

/// The state every named object embeds: name, interning, deletion state,
/// and a back-reference to the namer that owns the name.
pub struct NamedObjectCore {
    name: String,
    interned: bool,
    state: Cell<Lifecycle>,
    namer: Weak<ObjectNamer>,
}

impl NamedObjectCore {
    pub(crate) fn new(
        name: String,
        interned: bool,
        namer: &Rc<ObjectNamer>,
    ) -> Self {
        Self {
            name,
            interned,
            state: Cell::new(Lifecycle::Live),
            namer: Rc::downgrade(namer),
        }
    }

    /// Creates the core of an object that is not registered with any namer.
    ///
    /// Without a name, one is generated from `T`.
    pub fn detached<T: NamedObject>(name: Option<&str>) -> Self {
        Self {
            name: name.map_or_else(generated_name::<T>, str::to_string),
            interned: false,
            state: Cell::new(Lifecycle::Live),
            namer: Weak::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_interned(&self) -> bool {
        self.interned
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.get()
    }

    /// The namer this object was created through, if it is still alive.
    pub fn namer(&self) -> Option<Rc<ObjectNamer>> {
        self.namer.upgrade()
    }

    /// Finishes a pending deletion: unregisters an interned object and marks
    /// the object deleted. Does nothing unless deletion is pending.
    pub fn complete_deletion(&self) {
        if self.state.get() != Lifecycle::DeletionPending {
            return;
        }
        if self.interned
            && let Some(namer) = self.namer()
        {
            namer.remove_object(&self.name);
        }
        self.state.set(Lifecycle::Deleted);
        debug!(name = %self.name, "object deleted");
    }

    /// Copies the core for a cloned object.
    ///
    /// Interned objects cannot be cloned because the copy would share the
    /// original's registered name. The copy of a non-interned object is a
    /// live, non-interned object with the same name.
    pub fn try_clone(&self) -> Result<Self, NamerError> {
        if self.interned {
            return Err(NamerError::CloneInterned(self.name.clone()));
        }
        Ok(Self {
            name: self.name.clone(),
            interned: false,
            state: Cell::new(Lifecycle::Live),
            namer: self.namer.clone(),
        })
    }
}

impl fmt::Debug for NamedObjectCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedObjectCore")
            .field("name", &self.name)
            .field("interned", &self.interned)
            .field("state", &self.state.get())
            .finish()
    }
}

impl fmt::Display for dyn NamedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
