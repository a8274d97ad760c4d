use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use crate::error::{NamerError, ParmError};
use crate::key::ParmKey;
use crate::manager::{ParmManager, ParmSummary};
use crate::named_object::{AsAny, ObjectRef};
use crate::namer::ObjectNamer;
use crate::value::ParmValue;

/// The operations a factory accepts for a parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FactoryOp {
    Set,
    Add,
    Unset,
    Remove,
    Clear,
}

impl fmt::Display for FactoryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FactoryOp::Set => "set",
            FactoryOp::Add => "add",
            FactoryOp::Unset => "unset",
            FactoryOp::Remove => "remove",
            FactoryOp::Clear => "clear",
        })
    }
}

/// One operation on one named parameter.
#[derive(Debug)]
pub struct ParmRequest {
    pub op: FactoryOp,
    pub name: String,
    pub key: Option<ParmKey>,
    pub value: Option<ParmValue>,
}

impl ParmRequest {
    fn new(
        op: FactoryOp,
        name: &str,
        key: Option<ParmKey>,
        value: Option<ParmValue>,
    ) -> Self {
        Self { op, name: name.to_string(), key, value }
    }

    pub fn set(name: &str, value: impl Into<ParmValue>) -> Self {
        Self::new(FactoryOp::Set, name, None, Some(value.into()))
    }

    pub fn set_keyed(
        name: &str,
        key: impl Into<ParmKey>,
        value: impl Into<ParmValue>,
    ) -> Self {
        Self::new(FactoryOp::Set, name, Some(key.into()), Some(value.into()))
    }

    pub fn add(name: &str, value: impl Into<ParmValue>) -> Self {
        Self::new(FactoryOp::Add, name, None, Some(value.into()))
    }

    pub fn add_keyed(
        name: &str,
        key: impl Into<ParmKey>,
        value: impl Into<ParmValue>,
    ) -> Self {
        Self::new(FactoryOp::Add, name, Some(key.into()), Some(value.into()))
    }

    pub fn unset(name: &str, key: impl Into<ParmKey>) -> Self {
        Self::new(FactoryOp::Unset, name, Some(key.into()), None)
    }

    pub fn remove(name: &str, value: impl Into<ParmValue>) -> Self {
        Self::new(FactoryOp::Remove, name, None, Some(value.into()))
    }

    pub fn remove_keyed(name: &str, key: impl Into<ParmKey>) -> Self {
        Self::new(FactoryOp::Remove, name, Some(key.into()), None)
    }

    pub fn clear(name: &str) -> Self {
        Self::new(FactoryOp::Clear, name, None, None)
    }
}

/// A factory that creates named objects and is configured through named
/// parameters.
///
/// The trait is object safe so that factories created by type name can be
/// handled uniformly. The typed conveniences live in [`FactoryOps`], and
/// most factories get this trait by implementing [`ParmFactory`].
pub trait NamedObjectFactory: AsAny {
    fn namer(&self) -> &Rc<ObjectNamer>;

    /// Applies one parameter operation.
    fn apply(&mut self, request: ParmRequest) -> Result<(), ParmError>;

    /// Applies a JSON configuration tree. See [`ParmManager::configure`].
    fn configure(&mut self, tree: &Value) -> Result<(), ParmError>;

    /// Restores every parameter to its default.
    fn set_defaults(&mut self);

    /// Describes the factory's parameters.
    fn describe(&self) -> Vec<ParmSummary>;

    /// Creates an interned object from the current parameter values.
    ///
    /// Without a name, one is generated.
    fn create_object(
        &mut self,
        name: Option<&str>,
    ) -> Result<ObjectRef, NamerError>;
}

impl dyn NamedObjectFactory {
    pub fn downcast_ref<T: NamedObjectFactory>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: NamedObjectFactory>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// A factory whose parameters are declared in a [`ParmManager`].
///
/// Implementing this trait provides [`NamedObjectFactory`].
pub trait ParmFactory: Sized + 'static {
    fn object_namer(&self) -> &Rc<ObjectNamer>;

    fn parm_manager(&self) -> &Rc<ParmManager<Self>>;

    /// Builds and interns an object from the current parameter values.
    fn build_object(
        &mut self,
        name: Option<&str>,
    ) -> Result<ObjectRef, NamerError>;
}

impl<T: ParmFactory> NamedObjectFactory for T {
    fn namer(&self) -> &Rc<ObjectNamer> {
        self.object_namer()
    }

    fn apply(&mut self, request: ParmRequest) -> Result<(), ParmError> {
        let manager = Rc::clone(self.parm_manager());
        let namer = Rc::clone(self.object_namer());
        manager.dispatch(self, &namer, request)
    }

    fn configure(&mut self, tree: &Value) -> Result<(), ParmError> {
        let manager = Rc::clone(self.parm_manager());
        let namer = Rc::clone(self.object_namer());
        manager.configure(self, &namer, tree)
    }

    fn set_defaults(&mut self) {
        let manager = Rc::clone(self.parm_manager());
        manager.set_defaults(self);
    }

    fn describe(&self) -> Vec<ParmSummary> {
        self.parm_manager().describe()
    }

    fn create_object(
        &mut self,
        name: Option<&str>,
    ) -> Result<ObjectRef, NamerError> {
        let object = self.build_object(name)?;
        debug!(
            factory = std::any::type_name::<T>(),
            name = object.name(),
            "object created"
        );
        Ok(object)
    }
}

/// A factory type that can be constructed from a namer, so that it can be
/// registered with [`ObjectNamer::register_factory`].
pub trait FactoryType: NamedObjectFactory + Sized {
    fn with_namer(namer: Rc<ObjectNamer>) -> Self;
}

/// Typed conveniences over [`NamedObjectFactory::apply`].
pub trait FactoryOps: NamedObjectFactory {
    fn set(
        &mut self,
        name: &str,
        value: impl Into<ParmValue>,
    ) -> Result<(), ParmError> {
        self.apply(ParmRequest::set(name, value))
    }

    fn set_keyed(
        &mut self,
        name: &str,
        key: impl Into<ParmKey>,
        value: impl Into<ParmValue>,
    ) -> Result<(), ParmError> {
        self.apply(ParmRequest::set_keyed(name, key, value))
    }

    fn add(
        &mut self,
        name: &str,
        value: impl Into<ParmValue>,
    ) -> Result<(), ParmError> {
        self.apply(ParmRequest::add(name, value))
    }

    fn add_keyed(
        &mut self,
        name: &str,
        key: impl Into<ParmKey>,
        value: impl Into<ParmValue>,
    ) -> Result<(), ParmError> {
        self.apply(ParmRequest::add_keyed(name, key, value))
    }

    fn unset(
        &mut self,
        name: &str,
        key: impl Into<ParmKey>,
    ) -> Result<(), ParmError> {
        self.apply(ParmRequest::unset(name, key))
    }

    fn remove(
        &mut self,
        name: &str,
        value: impl Into<ParmValue>,
    ) -> Result<(), ParmError> {
        self.apply(ParmRequest::remove(name, value))
    }

    fn remove_keyed(
        &mut self,
        name: &str,
        key: impl Into<ParmKey>,
    ) -> Result<(), ParmError> {
        self.apply(ParmRequest::remove_keyed(name, key))
    }

    fn clear(&mut self, name: &str) -> Result<(), ParmError> {
        self.apply(ParmRequest::clear(name))
    }

    /// Clears every parameter whose parser supports clearing, in
    /// declaration order. Stops at the first other failure.
    fn clear_all(&mut self) -> Result<(), ParmError> {
        for summary in self.describe() {
            match self.clear(&summary.name) {
                Ok(()) | Err(ParmError::Unsupported(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

impl<T: NamedObjectFactory + ?Sized> FactoryOps for T {}
