//! Object Namer: named-object registries and typed, validated factory
//! parameters.
//!
//! This crate lets a program build objects through *factories* that are
//! configured by name. A factory declares its configuration surface as a
//! set of [`Parm`]s, each with a name, an optional key, a value type, and
//! bounds, and a [`ParmParser`] that applies values to the factory. An
//! [`ObjectNamer`] keeps the resulting objects in a namespace so that other
//! configuration can refer to them by name.
//!
//! # Basic Usage
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use object_namer::*;
//!
//! #[derive(Debug)]
//! struct Source {
//!     core: NamedObjectCore,
//!     rate: f64,
//! }
//!
//! impl NamedObject for Source {
//!     fn core(&self) -> &NamedObjectCore {
//!         &self.core
//!     }
//! }
//!
//! struct SourceFactory {
//!     namer: Rc<ObjectNamer>,
//!     parms: Rc<ParmManager<SourceFactory>>,
//!     rate: f64,
//! }
//!
//! impl ParmFactory for SourceFactory {
//!     fn object_namer(&self) -> &Rc<ObjectNamer> {
//!         &self.namer
//!     }
//!
//!     fn parm_manager(&self) -> &Rc<ParmManager<Self>> {
//!         &self.parms
//!     }
//!
//!     fn build_object(
//!         &mut self,
//!         name: Option<&str>,
//!     ) -> Result<ObjectRef, NamerError> {
//!         let rate = self.rate;
//!         let source = self
//!             .namer
//!             .create_object(name, true, |core| Source { core, rate })?;
//!         Ok(source)
//!     }
//! }
//!
//! let rate = ClosureParser::<SourceFactory>::new().on_parse(
//!     |binding, factory, key, value| match (key, value) {
//!         (None, ParmValue::Double(rate)) => {
//!             factory.rate = rate;
//!             Ok(())
//!         }
//!         (key, value) => Err(binding.unsupported_parse(key, &value)),
//!     },
//! );
//! let mut parms = ParmManager::<SourceFactory>::new();
//! parms.add_parm(
//!     Parm::unkeyed_bounded(
//!         "rate",
//!         None,
//!         Rc::new(rate),
//!         ValueType::Double,
//!         Bounds::unbounded().with_lower(0, true),
//!     )
//!     .unwrap(),
//! );
//!
//! let namer = ObjectNamer::new();
//! let mut factory =
//!     SourceFactory { namer: namer.clone(), parms: Rc::new(parms), rate: 1.0 };
//!
//! factory.set("rate", "2.5").unwrap();
//! assert!(factory.set("rate", -1.0).is_err());
//! factory.create_object(Some("gate")).unwrap();
//!
//! let gate = namer.get_object_as::<Source>("gate").unwrap();
//! assert_eq!(gate.rate, 2.5);
//! ```
//!
//! # Directory Loading Feature
//!
//! When the `directory-loading` feature is enabled (default), a namer can
//! create factories and objects from JSON definition files. See
//! [`DirectoryConfig`] and [`ObjectNamer::apply_definitions`].
//!
//! ```json
//! {
//!   "factories": [{"name": "sources", "type": "pkg.Foo"}],
//!   "objects": [{"factory": "sources", "name": "gate", "parameters": {"rate": 2.5}}]
//! }
//! ```
//!
//! ## Disabling Directory Loading
//!
//! To disable at compile time:
//!
//! ```toml
//! [dependencies]
//! object-namer = { version = "0.4", default-features = false }
//! ```

mod error;
pub use error::{NamerError, ParmError};

mod types;
pub use types::{EnumConstant, EnumType, ParmEnum, TypeTag};

mod key;
pub use key::{KeyComponent, KeyKind, ParmKey, ParmKeyType, key_string};

mod random;
pub use random::{
    BoolRv, BoolRvRv, DoubleRv, DoubleRvRv, FixedRv, FixedRvRv, IntRv, IntRvRv,
    LongRv, LongRvRv, RandomVariable, RvKind, Sample,
};

mod value;
pub use value::{Bound, Bounds, Number, ParmValue, ValueType};

mod named_object;
pub use named_object::{
    AsAny, Lifecycle, NamedObject, NamedObjectCore, ObjectRef, downcast_object,
    generated_name,
};

mod namer;
pub use namer::{FactoryConstructor, ObjectNamer};

mod parser;
pub use parser::{ClosureParser, ParmBinding, ParmParser};

mod parm;
pub use parm::{Parm, ParmShape};

mod manager;
pub use manager::{ParmManager, ParmSummary, ResourceBundle};

mod factory;
pub use factory::{
    FactoryOp, FactoryOps, FactoryType, NamedObjectFactory, ParmFactory,
    ParmRequest,
};

#[cfg(feature = "directory-loading")]
mod directory_loader;

#[cfg(feature = "directory-loading")]
pub use directory_loader::{
    DefinitionFile, DirectoryConfig, FactoryDefinition, LoadError, LoadResult,
    ObjectDefinition, load_from_config, load_from_directory,
};
