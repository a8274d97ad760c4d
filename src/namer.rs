use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::NamerError;
use crate::factory::{FactoryType, NamedObjectFactory};
use crate::named_object::{
    NamedObject, NamedObjectCore, ObjectRef, downcast_object, generated_name,
};

/// Builds a factory bound to a namer.
pub type FactoryConstructor =
    Rc<dyn Fn(&Rc<ObjectNamer>) -> Box<dyn NamedObjectFactory>>;

/// A registry that maps names to interned objects.
///
/// A namer may consult a list of *alternate* namers when a name is not
/// found locally, searching them depth first in the order they were added.
/// The alternate graph is kept acyclic.
///
/// A namer also keeps a table of factory constructors so that factories can
/// be created by type name, for example from a definition file.
///
/// ```
/// use object_namer::{NamedObject, NamedObjectCore, ObjectNamer};
///
/// #[derive(Debug)]
/// struct Widget {
///     core: NamedObjectCore,
/// }
///
/// impl NamedObject for Widget {
///     fn core(&self) -> &NamedObjectCore {
///         &self.core
///     }
/// }
///
/// let namer = ObjectNamer::new();
/// let widget =
///     namer.create_object(Some("w1"), true, |core| Widget { core }).unwrap();
/// assert_eq!(widget.name(), "w1");
/// assert!(namer.get_object_as::<Widget>("w1").is_some());
/// assert!(namer.create_object(Some("w1"), true, |core| Widget { core }).is_err());
/// ```
pub struct ObjectNamer {
    objects: RefCell<HashMap<String, ObjectRef>>,
    alternates: RefCell<Vec<Rc<ObjectNamer>>>,
    factory_types: RefCell<HashMap<String, FactoryConstructor>>,
}

impl ObjectNamer {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            objects: RefCell::new(HashMap::new()),
            alternates: RefCell::new(Vec::new()),
            factory_types: RefCell::new(HashMap::new()),
        })
    }

    /// Creates a named object through this namer.
    ///
    /// `build` receives the object's core and returns the finished object.
    /// When `intern` is set the object is registered under its name: an
    /// explicit name that is already registered is rejected with
    /// [`NamerError::NameInUse`], and a generated name is regenerated until
    /// it is free. Non-interned objects are never registered, so their names
    /// need not be unique.
    pub fn create_object<T: NamedObject>(
        self: &Rc<Self>,
        name: Option<&str>,
        intern: bool,
        build: impl FnOnce(NamedObjectCore) -> T,
    ) -> Result<Rc<T>, NamerError> {
        let name = match name {
            Some(name) => {
                if intern && self.objects.borrow().contains_key(name) {
                    return Err(NamerError::NameInUse(name.to_string()));
                }
                name.to_string()
            }
            None if intern => loop {
                let candidate = generated_name::<T>();
                if !self.objects.borrow().contains_key(&candidate) {
                    break candidate;
                }
            },
            None => generated_name::<T>(),
        };

        let object = Rc::new(build(NamedObjectCore::new(
            name.clone(),
            intern,
            self,
        )));
        if intern {
            let mut objects = self.objects.borrow_mut();
            if objects.contains_key(&name) {
                return Err(NamerError::NameInUse(name));
            }
            let handle: ObjectRef = object.clone();
            objects.insert(name.clone(), handle);
            debug!(name = %name, ty = std::any::type_name::<T>(), "object interned");
        }
        Ok(object)
    }

    /// Looks up a name in this namer only.
    pub(crate) fn local_object(&self, name: &str) -> Option<ObjectRef> {
        self.objects.borrow().get(name).cloned()
    }

    pub(crate) fn remove_object(&self, name: &str) -> Option<ObjectRef> {
        self.objects.borrow_mut().remove(name)
    }

    /// Looks up an object by name, here first and then in each alternate
    /// namer, depth first.
    pub fn get_object(&self, name: &str) -> Option<ObjectRef> {
        if let Some(object) = self.local_object(name) {
            return Some(object);
        }
        self.alternates
            .borrow()
            .iter()
            .find_map(|alternate| alternate.get_object(name))
    }

    /// Looks up an object by name and type. Returns `None` if the name is
    /// unknown or registered to an object of another type.
    pub fn get_object_as<T: NamedObject>(&self, name: &str) -> Option<Rc<T>> {
        self.get_object(name).and_then(downcast_object::<T>)
    }

    /// Names of all objects registered in this namer, sorted.
    ///
    /// Alternate namers are not included.
    pub fn get_object_names(&self) -> BTreeSet<String> {
        self.objects.borrow().keys().cloned().collect()
    }

    /// Names of the objects of type `T` registered in this namer, sorted.
    pub fn get_object_names_of<T: NamedObject>(&self) -> BTreeSet<String> {
        self.objects
            .borrow()
            .iter()
            .filter(|(_, object)| object.is::<T>())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// All objects registered in this namer, ordered by name.
    pub fn get_objects(&self) -> Vec<ObjectRef> {
        let objects = self.objects.borrow();
        let mut result: Vec<ObjectRef> = objects.values().cloned().collect();
        result.sort_by(|a, b| a.name().cmp(b.name()));
        result
    }

    /// The objects of type `T` registered in this namer, ordered by name.
    pub fn get_objects_of<T: NamedObject>(&self) -> Vec<Rc<T>> {
        self.get_objects()
            .into_iter()
            .filter_map(downcast_object::<T>)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.objects.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.borrow().is_empty()
    }

    /// Adds a namer to consult when a name is not found here.
    ///
    /// Fails with [`NamerError::AlternateCycle`] if `alternate` is this namer
    /// or already consults it, directly or indirectly.
    pub fn add_object_namer(
        &self,
        alternate: Rc<ObjectNamer>,
    ) -> Result<(), NamerError> {
        if !self.check_alt_list(&alternate) {
            warn!("rejected alternate object namer that would form a cycle");
            return Err(NamerError::AlternateCycle);
        }
        self.alternates.borrow_mut().push(alternate);
        Ok(())
    }

    /// True if `alternate` can be added without creating a cycle.
    pub fn check_alt_list(&self, alternate: &ObjectNamer) -> bool {
        !alternate.reaches(self)
    }

    fn reaches(&self, target: &ObjectNamer) -> bool {
        std::ptr::eq(self, target)
            || self
                .alternates
                .borrow()
                .iter()
                .any(|alternate| alternate.reaches(target))
    }

    /// The alternates of this namer, in search order.
    pub fn alternates(&self) -> Vec<Rc<ObjectNamer>> {
        self.alternates.borrow().clone()
    }

    /// Registers a factory type under `type_name`.
    pub fn register_factory<F: FactoryType>(&self, type_name: &str) {
        self.register_factory_fn(type_name, |namer| {
            Box::new(F::with_namer(Rc::clone(namer)))
        });
    }

    /// Registers a factory constructor under `type_name`, replacing any
    /// earlier registration.
    pub fn register_factory_fn(
        &self,
        type_name: &str,
        constructor: impl Fn(&Rc<ObjectNamer>) -> Box<dyn NamedObjectFactory>
        + 'static,
    ) {
        let previous = self
            .factory_types
            .borrow_mut()
            .insert(type_name.to_string(), Rc::new(constructor));
        if previous.is_some() {
            debug!(type_name, "factory type re-registered");
        }
    }

    /// Names of the registered factory types, sorted.
    pub fn factory_types(&self) -> BTreeSet<String> {
        self.factory_types.borrow().keys().cloned().collect()
    }

    /// Creates a factory of a registered type, bound to this namer.
    pub fn create_factory(
        self: &Rc<Self>,
        type_name: &str,
    ) -> Result<Box<dyn NamedObjectFactory>, NamerError> {
        let constructor = self
            .factory_types
            .borrow()
            .get(type_name)
            .cloned()
            .ok_or_else(|| NamerError::UnknownFactory(type_name.to_string()))?;
        Ok(constructor(self))
    }

    /// Creates a factory of a known type, bound to this namer.
    pub fn create_factory_of<F: FactoryType>(self: &Rc<Self>) -> F {
        F::with_namer(Rc::clone(self))
    }

    /// Whether [`configure_factory`](Self::configure_factory) is available.
    pub fn configure_factory_supported(&self) -> bool {
        true
    }

    /// Applies a JSON configuration tree to a factory.
    ///
    /// See [`NamedObjectFactory::configure`] for the tree's format.
    pub fn configure_factory(
        &self,
        factory: &mut dyn NamedObjectFactory,
        tree: &Value,
    ) -> Result<(), NamerError> {
        factory.configure(tree)?;
        Ok(())
    }
}

impl fmt::Debug for ObjectNamer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectNamer")
            .field("objects", &self.get_object_names())
            .field("alternates", &self.alternates.borrow().len())
            .field("factory_types", &self.factory_types())
            .finish()
    }
}
