use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::ParmError;
use crate::factory::{FactoryOp, ParmRequest};
use crate::key::{KeyComponent, ParmKey};
use crate::namer::ObjectNamer;
use crate::parm::{Parm, ParmShape};
use crate::types::TypeTag;
use crate::value::{ParmValue, ValueType};

/// A table of localized strings keyed by parameter name.
///
/// Bundles are plain JSON objects mapping keys to strings:
///
/// ```
/// use object_namer::ResourceBundle;
///
/// let bundle =
///     ResourceBundle::from_json(r#"{"rate": "Arrival rate per second"}"#)
///         .unwrap();
/// assert_eq!(bundle.get("rate"), Some("Arrival rate per second"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceBundle {
    entries: HashMap<String, String>,
}

impl ResourceBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with(mut self, key: &str, text: &str) -> Self {
        self.entries.insert(key.to_string(), text.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ResourceBundle {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(key, text)| (key.into(), text.into()))
                .collect(),
        }
    }
}

#[derive(Clone, Debug)]
struct AttachedBundle {
    /// Prefix and delimiter for bundles that describe compound entries.
    prefix: Option<(String, String)>,
    bundle: ResourceBundle,
}

impl AttachedBundle {
    fn lookup(&self, parm_name: &str) -> Option<&str> {
        match &self.prefix {
            None => self.bundle.get(parm_name),
            Some((prefix, delimiter)) => parm_name
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix(delimiter.as_str()))
                .and_then(|rest| self.bundle.get(rest)),
        }
    }
}

fn lookup<'a>(bundles: &'a [AttachedBundle], parm_name: &str) -> Option<&'a str> {
    bundles.iter().rev().find_map(|bundle| bundle.lookup(parm_name))
}

/// A serializable description of one parameter.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParmSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub random: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<String>,
    pub clear_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

type Defaults<F> = Box<dyn Fn(&mut F)>;

/// The parameters of a factory type `F`, with their defaults and
/// documentation.
///
/// Parameters are kept in insertion order. When two share a name, lookups
/// find the one added last.
pub struct ParmManager<F> {
    parms: Vec<Parm<F>>,
    index: HashMap<String, usize>,
    defaults: Vec<Defaults<F>>,
    tips: Vec<AttachedBundle>,
    docs: Vec<AttachedBundle>,
    labels: Vec<AttachedBundle>,
}

impl<F: 'static> ParmManager<F> {
    pub fn new() -> Self {
        Self {
            parms: Vec::new(),
            index: HashMap::new(),
            defaults: Vec::new(),
            tips: Vec::new(),
            docs: Vec::new(),
            labels: Vec::new(),
        }
    }

    pub fn add_parm(&mut self, mut parm: Parm<F>) {
        parm.set_factory_type(TypeTag::of::<F>());
        if self.index.contains_key(parm.name()) {
            debug!(parm = parm.name(), "parameter redeclared");
        }
        self.index.insert(parm.name().to_string(), self.parms.len());
        self.parms.push(parm);
    }

    pub fn add_all(&mut self, parms: impl IntoIterator<Item = Parm<F>>) {
        for parm in parms {
            self.add_parm(parm);
        }
    }
}

impl<F> ParmManager<F> {
    pub fn get_parm(&self, name: &str) -> Option<&Parm<F>> {
        self.index.get(name).map(|&i| &self.parms[i])
    }

    /// All parameters in insertion order, including redeclared ones.
    pub fn parms(&self) -> &[Parm<F>] {
        &self.parms
    }

    /// The parameters a lookup can reach, in insertion order.
    pub fn active_parms(&self) -> impl Iterator<Item = &Parm<F>> {
        self.parms
            .iter()
            .enumerate()
            .filter(|(i, parm)| self.index.get(parm.name()) == Some(i))
            .map(|(_, parm)| parm)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Registers a function that restores default values. Functions run in
    /// registration order.
    pub fn add_defaults(&mut self, defaults: impl Fn(&mut F) + 'static) {
        self.defaults.push(Box::new(defaults));
    }

    /// Restores a factory's default values.
    pub fn set_defaults(&self, target: &mut F) {
        for defaults in &self.defaults {
            defaults(target);
        }
    }

    pub fn add_tip_bundle(&mut self, bundle: ResourceBundle) {
        self.tips.push(AttachedBundle { prefix: None, bundle });
    }

    /// Adds tips for compound entries named `<prefix><delimiter><key>`.
    pub fn add_keyed_tip_bundle(
        &mut self,
        prefix: &str,
        delimiter: &str,
        bundle: ResourceBundle,
    ) {
        self.tips.push(keyed(prefix, delimiter, bundle));
    }

    pub fn add_doc_bundle(&mut self, bundle: ResourceBundle) {
        self.docs.push(AttachedBundle { prefix: None, bundle });
    }

    pub fn add_keyed_doc_bundle(
        &mut self,
        prefix: &str,
        delimiter: &str,
        bundle: ResourceBundle,
    ) {
        self.docs.push(keyed(prefix, delimiter, bundle));
    }

    pub fn add_label_bundle(&mut self, bundle: ResourceBundle) {
        self.labels.push(AttachedBundle { prefix: None, bundle });
    }

    pub fn add_keyed_label_bundle(
        &mut self,
        prefix: &str,
        delimiter: &str,
        bundle: ResourceBundle,
    ) {
        self.labels.push(keyed(prefix, delimiter, bundle));
    }

    pub fn tip(&self, name: &str) -> Option<&str> {
        lookup(&self.tips, name)
    }

    pub fn doc(&self, name: &str) -> Option<&str> {
        lookup(&self.docs, name)
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        lookup(&self.labels, name)
    }

    /// Summaries of the reachable parameters, in insertion order.
    pub fn describe(&self) -> Vec<ParmSummary> {
        self.active_parms()
            .map(|parm| ParmSummary {
                name: parm.name().to_string(),
                key: parm.key_kind().description(),
                value_type: parm.value_type().map(|ty| ty.type_name().to_string()),
                random: parm.rv().map(|rv| rv.description().to_string()),
                bounds: Some(parm.bounds())
                    .filter(|bounds| !bounds.is_unbounded())
                    .map(ToString::to_string),
                clear_only: parm.is_clear_only(),
                label: self.label(parm.name()).map(str::to_string),
                tip: self.tip(parm.name()).map(str::to_string),
                doc: self.doc(parm.name()).map(str::to_string),
            })
            .collect()
    }

    /// Applies one factory operation to `target`.
    ///
    /// Keys and values are coerced to the parameter's declared types (object
    /// names are resolved through `namer`) and values are checked against
    /// the parameter's bounds before the parser sees them. Random variables
    /// are tightened to those bounds.
    pub fn dispatch(
        &self,
        target: &mut F,
        namer: &ObjectNamer,
        request: ParmRequest,
    ) -> Result<(), ParmError> {
        let ParmRequest { op, name, key, value } = request;
        let parm = self
            .get_parm(&name)
            .ok_or_else(|| ParmError::UnknownParm(name.clone()))?;
        let parser = parm.parser();
        trace!(parm = %name, %op, "dispatching parameter operation");

        let addable = parm.key_kind().is_addable();
        match (parm.shape(), op) {
            (_, FactoryOp::Clear) => parser.clear(target, None),
            (ParmShape::ClearOnly, op) => Err(ParmError::Unsupported(format!(
                "parameter \"{name}\" supports only clear, not {op}"
            ))),
            (ParmShape::Scalar, FactoryOp::Set) => {
                if let Some(key) = key {
                    return Err(ParmError::Unsupported(format!(
                        "parameter \"{name}\" does not take a key (got {key})"
                    )));
                }
                let value = prepare_value(parm, namer, require_value(&name, value)?)?;
                parser.parse(target, None, value)
            }
            (ParmShape::Keyed, FactoryOp::Set) if !addable => {
                let key = prepare_key(parm, namer, key)?;
                let value = prepare_value(parm, namer, require_value(&name, value)?)?;
                parser.parse(target, Some(&key), value)
            }
            (ParmShape::Keyed, FactoryOp::Add) if addable => {
                let key = prepare_key(parm, namer, key)?;
                let value = prepare_value(parm, namer, require_value(&name, value)?)?;
                parser.parse(target, Some(&key), value)
            }
            (ParmShape::Keyed, FactoryOp::Unset) if !addable => {
                let key = prepare_key(parm, namer, key_or_value(key, value))?;
                parser.clear(target, Some(&key))
            }
            (ParmShape::Keyed, FactoryOp::Remove) if addable => {
                let key = prepare_key(parm, namer, key_or_value(key, value))?;
                parser.clear(target, Some(&key))
            }
            (ParmShape::ElementSet, FactoryOp::Add) => {
                let element = element_key(parm, namer, key, value)?;
                let element = ParmValue::from_key(element).ok_or_else(|| {
                    ParmError::invalid(&name, "elements cannot be compound keys")
                })?;
                parser.parse(target, None, element)
            }
            (ParmShape::ElementSet, FactoryOp::Remove) => {
                let element = element_key(parm, namer, key, value)?;
                parser.clear(target, Some(&element))
            }
            (shape, op) => Err(ParmError::Unsupported(format!(
                "{op} is not supported by parameter \"{name}\" ({})",
                describe_shape(shape, addable)
            ))),
        }
    }

    /// Applies a JSON configuration tree to `target`.
    ///
    /// The tree is an object whose members name parameters:
    ///
    /// * a scalar sets the parameter;
    /// * `null` clears it;
    /// * an array adds each element to an element-set parameter;
    /// * an object sets each member on a keyed parameter (or adds it, for
    ///   addable compound keys), and a `null` member unsets (or removes) that
    ///   key.
    ///
    /// Members are applied in the order they are written; the first failure
    /// stops the walk.
    pub fn configure(
        &self,
        target: &mut F,
        namer: &ObjectNamer,
        tree: &Value,
    ) -> Result<(), ParmError> {
        let Value::Object(members) = tree else {
            return Err(ParmError::Unsupported(format!(
                "configuration must be a JSON object, found {}",
                json_kind(tree)
            )));
        };
        for (name, node) in members {
            let parm = self
                .get_parm(name)
                .ok_or_else(|| ParmError::UnknownParm(name.clone()))?;
            let addable = parm.key_kind().is_addable();
            match node {
                Value::Null => {
                    self.dispatch(target, namer, ParmRequest::clear(name))?;
                }
                Value::Array(items) => {
                    for item in items {
                        let value = json_value(name, item)?;
                        self.dispatch(target, namer, ParmRequest::add(name, value))?;
                    }
                }
                Value::Object(entries) => {
                    for (key, item) in entries {
                        let key = ParmKey::Str(key.clone());
                        let request = match (item, addable) {
                            (Value::Null, false) => ParmRequest::unset(name, key),
                            (Value::Null, true) => {
                                ParmRequest::remove_keyed(name, key)
                            }
                            (item, false) => {
                                ParmRequest::set_keyed(name, key, json_value(name, item)?)
                            }
                            (item, true) => {
                                ParmRequest::add_keyed(name, key, json_value(name, item)?)
                            }
                        };
                        self.dispatch(target, namer, request)?;
                    }
                }
                scalar => {
                    let value = json_value(name, scalar)?;
                    let request = match parm.shape() {
                        ParmShape::ElementSet => ParmRequest::add(name, value),
                        _ => ParmRequest::set(name, value),
                    };
                    self.dispatch(target, namer, request)?;
                }
            }
        }
        Ok(())
    }
}

impl<F: 'static> Default for ParmManager<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> fmt::Debug for ParmManager<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParmManager")
            .field("parms", &self.parms)
            .field("defaults", &self.defaults.len())
            .finish()
    }
}

fn keyed(prefix: &str, delimiter: &str, bundle: ResourceBundle) -> AttachedBundle {
    AttachedBundle {
        prefix: Some((prefix.to_string(), delimiter.to_string())),
        bundle,
    }
}

fn require_value(
    name: &str,
    value: Option<ParmValue>,
) -> Result<ParmValue, ParmError> {
    value.ok_or_else(|| ParmError::invalid(name, "a value is required"))
}

fn key_or_value(key: Option<ParmKey>, value: Option<ParmValue>) -> Option<ParmKey> {
    key.or_else(|| value.and_then(ParmValue::into_key))
}

fn prepare_key<F>(
    parm: &Parm<F>,
    namer: &ObjectNamer,
    key: Option<ParmKey>,
) -> Result<ParmKey, ParmError> {
    let key = key.ok_or_else(|| ParmError::invalid(parm.name(), "a key is required"))?;
    parm.key_kind().coerce(parm.name(), key, namer)
}

/// Resolves the element named by an element-set operation. Values are
/// first coerced to the element type, so `50.0` names the element `50` of an
/// integer set.
fn element_key<F>(
    parm: &Parm<F>,
    namer: &ObjectNamer,
    key: Option<ParmKey>,
    value: Option<ParmValue>,
) -> Result<ParmKey, ParmError> {
    let key = match (key, value) {
        (Some(key), _) => key,
        (None, Some(value)) => {
            let value = match parm.key_component().map(element_type) {
                Some(ty) => ty.coerce(parm.name(), value, namer)?,
                None => value,
            };
            let type_name = value.type_name();
            value.into_key().ok_or_else(|| {
                ParmError::Unsupported(format!(
                    "parameter \"{}\" cannot hold elements of type {type_name}",
                    parm.name()
                ))
            })?
        }
        (None, None) => {
            return Err(ParmError::invalid(parm.name(), "an element is required"));
        }
    };
    parm.key_kind().coerce(parm.name(), key, namer)
}

fn element_type(component: KeyComponent) -> ValueType {
    match component {
        KeyComponent::Int => ValueType::Int,
        KeyComponent::String => ValueType::String,
        KeyComponent::NamedObject(tag) => ValueType::NamedObject(tag),
        KeyComponent::Enum(ty) => ValueType::Enum(ty),
    }
}

fn prepare_value<F>(
    parm: &Parm<F>,
    namer: &ObjectNamer,
    value: ParmValue,
) -> Result<ParmValue, ParmError> {
    let Some(value_type) = parm.value_type() else {
        return Ok(value);
    };
    let mut value = match parm.rv() {
        Some(kind) => value_type.coerce_random(parm.name(), kind, value, namer)?,
        None => value_type.coerce(parm.name(), value, namer)?,
    };
    parm.bounds().enforce(parm.name(), &mut value)?;
    Ok(value)
}

fn describe_shape(shape: ParmShape, addable: bool) -> &'static str {
    match (shape, addable) {
        (ParmShape::Scalar, _) => "takes a single value",
        (ParmShape::Keyed, true) => "keyed; use add and remove",
        (ParmShape::Keyed, false) => "keyed; use set and unset",
        (ParmShape::ElementSet, _) => "holds a set; use add and remove",
        (ParmShape::ClearOnly, _) => "clear only",
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Converts a JSON scalar to a loosely typed value; integers become `Int`
/// when they fit and `Long` otherwise.
fn json_value(parm: &str, value: &Value) -> Result<ParmValue, ParmError> {
    match value {
        Value::String(text) => Ok(ParmValue::Str(text.clone())),
        Value::Bool(flag) => Ok(ParmValue::Bool(*flag)),
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                Ok(i32::try_from(integer)
                    .map(ParmValue::Int)
                    .unwrap_or(ParmValue::Long(integer)))
            } else {
                number.as_f64().map(ParmValue::Double).ok_or_else(|| {
                    ParmError::invalid(parm, format!("unrepresentable number {number}"))
                })
            }
        }
        other => Err(ParmError::Unsupported(format!(
            "parameter \"{parm}\" cannot take {} as a value",
            json_kind(other)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::parser::ClosureParser;
    use crate::value::Bounds;

    #[derive(Default)]
    struct Target {
        count: i32,
        tags: Vec<String>,
        cleared: usize,
    }

    fn count_parm() -> Parm<Target> {
        let parser = ClosureParser::<Target>::new()
            .on_parse(|binding, target, key, value| match (key, value) {
                (None, ParmValue::Int(count)) => {
                    target.count = count;
                    Ok(())
                }
                (key, value) => Err(binding.unsupported_parse(key, &value)),
            })
            .on_clear(|_, target, _| {
                target.count = 0;
                target.cleared += 1;
                Ok(())
            });
        Parm::unkeyed_bounded(
            "count",
            None,
            Rc::new(parser),
            ValueType::Int,
            Bounds::unbounded().with_lower(0, true),
        )
        .unwrap()
    }

    fn tags_parm() -> Parm<Target> {
        let parser = ClosureParser::<Target>::new()
            .on_parse(|binding, target, _, value| match value {
                ParmValue::Str(tag) => {
                    target.tags.push(tag);
                    Ok(())
                }
                value => Err(binding.unsupported_parse(None, &value)),
            })
            .on_clear(|_, target, key| {
                match key.and_then(ParmKey::as_str) {
                    Some(tag) => target.tags.retain(|t| t != tag),
                    None => target.tags.clear(),
                }
                Ok(())
            });
        Parm::keyed("tags", KeyComponent::String, None, Rc::new(parser), None)
            .unwrap()
    }

    fn manager() -> ParmManager<Target> {
        let mut manager = ParmManager::new();
        manager.add_all([count_parm(), tags_parm()]);
        manager.add_defaults(|target: &mut Target| target.count = 1);
        manager
    }

    #[test]
    fn test_lookup_and_order() {
        let manager = manager();
        assert_eq!(manager.len(), 2);
        let names: Vec<&str> = manager.parms().iter().map(Parm::name).collect();
        assert_eq!(names, vec!["count", "tags"]);
        assert!(manager.get_parm("missing").is_none());
        assert_eq!(
            manager.get_parm("count").and_then(Parm::factory_type),
            Some(TypeTag::of::<Target>())
        );
    }

    #[test]
    fn test_last_declaration_wins() {
        let mut manager = manager();
        let replacement = Parm::clear_only(
            "count",
            Rc::new(ClosureParser::<Target>::new()),
        )
        .unwrap();
        manager.add_parm(replacement);
        assert_eq!(manager.parms().len(), 3);
        assert_eq!(manager.len(), 2);
        assert!(manager.get_parm("count").unwrap().is_clear_only());
        assert_eq!(manager.describe().len(), 2);
    }

    #[test]
    fn test_defaults_run_in_order() {
        let mut manager = manager();
        manager.add_defaults(|target: &mut Target| target.count *= 10);
        let mut target = Target::default();
        manager.set_defaults(&mut target);
        assert_eq!(target.count, 10);
    }

    #[test]
    fn test_dispatch_coerces_and_checks_bounds() {
        let manager = manager();
        let namer = ObjectNamer::new();
        let mut target = Target::default();
        manager
            .dispatch(&mut target, &namer, ParmRequest::set("count", "7"))
            .unwrap();
        assert_eq!(target.count, 7);

        let err = manager
            .dispatch(&mut target, &namer, ParmRequest::set("count", -1))
            .unwrap_err();
        assert!(matches!(err, ParmError::InvalidArgument { .. }));
        assert_eq!(target.count, 7);

        let err = manager
            .dispatch(&mut target, &namer, ParmRequest::add("count", 1))
            .unwrap_err();
        assert!(matches!(err, ParmError::Unsupported(_)));

        let err = manager
            .dispatch(&mut target, &namer, ParmRequest::set("nope", 1))
            .unwrap_err();
        assert_eq!(err, ParmError::UnknownParm("nope".to_string()));
    }

    #[test]
    fn test_element_set_dispatch() {
        let manager = manager();
        let namer = ObjectNamer::new();
        let mut target = Target::default();
        for tag in ["a", "b"] {
            manager
                .dispatch(&mut target, &namer, ParmRequest::add("tags", tag))
                .unwrap();
        }
        manager
            .dispatch(&mut target, &namer, ParmRequest::remove("tags", "a"))
            .unwrap();
        assert_eq!(target.tags, vec!["b"]);
        assert!(
            manager
                .dispatch(&mut target, &namer, ParmRequest::set("tags", "c"))
                .is_err()
        );
    }

    #[test]
    fn test_configure_tree() {
        let manager = manager();
        let namer = ObjectNamer::new();
        let mut target = Target::default();
        manager
            .configure(
                &mut target,
                &namer,
                &json!({"count": 12, "tags": ["x", "y", "z"]}),
            )
            .unwrap();
        assert_eq!(target.count, 12);
        assert_eq!(target.tags, vec!["x", "y", "z"]);

        manager
            .configure(&mut target, &namer, &json!({"count": null}))
            .unwrap();
        assert_eq!(target.count, 0);
        assert_eq!(target.cleared, 1);

        let err = manager.configure(&mut target, &namer, &json!([1, 2]));
        assert!(matches!(err, Err(ParmError::Unsupported(_))));
        let err = manager.configure(&mut target, &namer, &json!({"count": 1.5}));
        assert!(matches!(err, Err(ParmError::InvalidArgument { .. })));
    }

    #[test]
    fn test_bundles_and_describe() {
        let mut manager = manager();
        manager.add_tip_bundle(ResourceBundle::new().with("count", "How many"));
        manager.add_tip_bundle(ResourceBundle::new().with("count", "Override"));
        manager.add_keyed_label_bundle(
            "timeline",
            ".",
            [("color", "Line color")].into_iter().collect(),
        );
        assert_eq!(manager.tip("count"), Some("Override"));
        assert_eq!(manager.label("timeline.color"), Some("Line color"));
        assert_eq!(manager.label("color"), None);

        let summary = manager.describe();
        assert_eq!(summary[0].bounds.as_deref(), Some("[0, inf)"));
        assert_eq!(summary[1].key.as_deref(), Some("alloc::string::String"));
        let json = serde_json::to_value(&summary[0]).unwrap();
        assert_eq!(json["name"], "count");
        assert_eq!(json["tip"], "Override");
        assert!(json.get("doc").is_none());
    }
}
