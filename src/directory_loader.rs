//! Directory-based loading of object definitions from JSON files.
//!
//! This module reads definition files from configurable directories and
//! applies them to an [`ObjectNamer`]: each file declares factories by type
//! name and the objects to create with them. It is only available when the
//! `directory-loading` feature is enabled (which is the default).
//!
//! # JSON File Format
//!
//! ```json
//! {
//!   "factories": [
//!     {"name": "arrivals", "type": "pkg.Foo", "parameters": {"rate": 2.0}}
//!   ],
//!   "objects": [
//!     {"factory": "arrivals", "name": "gate1"},
//!     {"factory": "arrivals", "name": "gate2", "parameters": {"rate": 0.5}}
//!   ]
//! }
//! ```
//!
//! Factory types must have been registered with
//! [`ObjectNamer::register_factory`]. Before each object is created its
//! factory is reset to defaults, then configured with the factory's
//! `parameters` followed by the object's own. Both sections are optional.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::NamerError;
use crate::factory::NamedObjectFactory;
use crate::named_object::ObjectRef;
use crate::namer::ObjectNamer;

/// A factory declared in a definition file.
#[derive(Debug, Clone, Deserialize)]
pub struct FactoryDefinition {
    /// The name objects use to refer to this factory.
    pub name: String,
    /// The registered factory type.
    #[serde(rename = "type")]
    pub factory_type: String,
    /// Configuration applied before every object this factory creates.
    #[serde(default)]
    pub parameters: Option<Value>,
}

/// An object declared in a definition file.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectDefinition {
    /// The name of a factory declared in any loaded file.
    pub factory: String,
    /// The object's name; generated when absent.
    pub name: Option<String>,
    /// Configuration applied on top of the factory's.
    #[serde(default)]
    pub parameters: Option<Value>,
}

/// Root structure of a definition file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefinitionFile {
    #[serde(default)]
    pub factories: Vec<FactoryDefinition>,
    #[serde(default)]
    pub objects: Vec<ObjectDefinition>,
}

/// Errors that can occur when loading definitions from directories.
#[derive(Debug)]
pub enum LoadError {
    /// An I/O error occurred while reading files.
    Io(io::Error),
    /// A JSON parsing error occurred.
    Json {
        /// The file that caused the error.
        file: PathBuf,
        /// The underlying JSON error.
        error: serde_json::Error,
    },
    /// A definition could not be applied to the namer.
    Definition(NamerError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "IO error: {}", e),
            LoadError::Json { file, error } => {
                write!(f, "JSON parse error in {}: {}", file.display(), error)
            }
            LoadError::Definition(e) => write!(f, "definition error: {}", e),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io(e) => Some(e),
            LoadError::Json { error, .. } => Some(error),
            LoadError::Definition(e) => Some(e),
        }
    }
}

impl From<io::Error> for LoadError {
    fn from(error: io::Error) -> Self {
        LoadError::Io(error)
    }
}

impl From<NamerError> for LoadError {
    fn from(error: NamerError) -> Self {
        LoadError::Definition(error)
    }
}

/// Result of a tolerant directory loading operation.
#[derive(Debug, Default)]
pub struct LoadResult {
    /// Parsed definition files, in directory order and then file name order.
    pub definitions: Vec<(PathBuf, DefinitionFile)>,
    /// Directories that were successfully scanned.
    pub files_processed: Vec<PathBuf>,
    /// Non-fatal errors encountered during loading.
    pub errors: Vec<(PathBuf, LoadError)>,
}

impl LoadResult {
    /// Returns the number of definition files loaded.
    pub fn definitions_count(&self) -> usize {
        self.definitions.len()
    }

    /// Returns an iterator over the loaded definition files.
    pub fn definitions_iter(&self) -> impl Iterator<Item = &DefinitionFile> {
        self.definitions.iter().map(|(_, file)| file)
    }

    /// Consumes the result and returns the loaded definition files.
    pub fn into_definitions(self) -> Vec<DefinitionFile> {
        self.definitions.into_iter().map(|(_, file)| file).collect()
    }

    /// Returns true if any errors occurred during loading.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Configuration for loading definitions from directories.
///
/// Directories are processed in order, and files within a directory in
/// file name order.
///
/// # Examples
///
/// ```rust
/// use object_namer::DirectoryConfig;
///
/// // Use only the default directory (~/.object-namer/)
/// let config = DirectoryConfig::default_only();
/// assert_eq!(config.paths().len(), 1);
///
/// // Use custom paths with default appended
/// let config =
///     DirectoryConfig::with_paths_and_default(vec!["/etc/object-namer".into()]);
/// assert_eq!(config.paths().len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DirectoryConfig {
    /// Search paths in processing order.
    paths: Vec<PathBuf>,
}

impl DirectoryConfig {
    /// Creates a new empty configuration with no search paths.
    pub fn new() -> Self {
        Self { paths: Vec::new() }
    }

    /// Creates configuration with only the default directory
    /// (`~/.object-namer/`).
    pub fn default_only() -> Self {
        Self { paths: vec![Self::default_directory()] }
    }

    /// Creates configuration with custom paths (processed in order).
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    /// Creates configuration with custom paths followed by the default
    /// directory.
    pub fn with_paths_and_default(mut paths: Vec<PathBuf>) -> Self {
        paths.push(Self::default_directory());
        Self { paths }
    }

    /// Returns the default directory: `~/.object-namer/`
    ///
    /// Falls back to `./.object-namer/` if the home directory cannot be
    /// determined.
    pub fn default_directory() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".object-namer")
    }

    /// Returns the configured search paths.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Adds a path to the end of the configuration.
    pub fn add_path(&mut self, path: PathBuf) {
        self.paths.push(path);
    }
}

/// The `.json` files in a directory, sorted by file name. A missing
/// directory has none.
fn json_files(path: &Path) -> Result<Vec<PathBuf>, LoadError> {
    if !path.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(path)? {
        let file_path = entry?.path();
        if file_path.extension().is_some_and(|ext| ext == "json") {
            files.push(file_path);
        }
    }
    files.sort();
    Ok(files)
}

/// Loads all definition files from a single directory.
///
/// Returns an empty list if the directory doesn't exist. Any unreadable or
/// malformed file fails the whole load.
pub fn load_from_directory(
    path: &Path,
) -> Result<Vec<(PathBuf, DefinitionFile)>, LoadError> {
    json_files(path)?
        .into_iter()
        .map(|file| load_single_file(&file).map(|definitions| (file, definitions)))
        .collect()
}

/// Loads definition files from all directories in the given configuration.
///
/// This function is fault-tolerant: it will continue processing even if
/// some files fail to parse. Errors are collected in the returned
/// `LoadResult`.
pub fn load_from_config(config: &DirectoryConfig) -> LoadResult {
    let mut result = LoadResult::default();

    for dir_path in config.paths() {
        match json_files(dir_path) {
            Ok(files) => {
                for file in files {
                    match load_single_file(&file) {
                        Ok(definitions) => {
                            result.definitions.push((file, definitions));
                        }
                        Err(e) => {
                            warn!(
                                file = %file.display(),
                                error = %e,
                                "skipping definition file"
                            );
                            result.errors.push((file, e));
                        }
                    }
                }
                result.files_processed.push(dir_path.clone());
            }
            Err(e) => {
                result.errors.push((dir_path.clone(), e));
            }
        }
    }

    result
}

/// Loads definitions from a single JSON file.
fn load_single_file(path: &Path) -> Result<DefinitionFile, LoadError> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| LoadError::Json {
        file: path.to_path_buf(),
        error: e,
    })
}

impl ObjectNamer {
    /// Creates the factories and objects declared in `files`.
    ///
    /// All factories are created first, so an object may use a factory
    /// declared in any of the files. The first failure stops processing;
    /// objects created before it stay interned. Returns the created objects
    /// in declaration order.
    pub fn apply_definitions<'a>(
        self: &Rc<Self>,
        files: impl IntoIterator<Item = &'a DefinitionFile>,
    ) -> Result<Vec<ObjectRef>, NamerError> {
        let files: Vec<&DefinitionFile> = files.into_iter().collect();
        let mut factories: HashMap<
            &str,
            (Box<dyn NamedObjectFactory>, Option<&Value>),
        > = HashMap::new();

        for definition in files.iter().flat_map(|file| &file.factories) {
            if factories.contains_key(definition.name.as_str()) {
                return Err(NamerError::FactoryInUse(definition.name.clone()));
            }
            let factory = self.create_factory(&definition.factory_type)?;
            debug!(
                factory = %definition.name,
                ty = %definition.factory_type,
                "factory defined"
            );
            factories.insert(
                &definition.name,
                (factory, definition.parameters.as_ref()),
            );
        }

        let mut created = Vec::new();
        for definition in files.iter().flat_map(|file| &file.objects) {
            let (factory, defaults) = factories
                .get_mut(definition.factory.as_str())
                .ok_or_else(|| {
                    NamerError::Config(format!(
                        "object refers to undefined factory \"{}\"",
                        definition.factory
                    ))
                })?;
            factory.set_defaults();
            if let Some(tree) = *defaults {
                factory.configure(tree)?;
            }
            if let Some(tree) = &definition.parameters {
                factory.configure(tree)?;
            }
            created.push(factory.create_object(definition.name.as_deref())?);
        }
        Ok(created)
    }

    /// Loads every definition file in a directory and applies them.
    ///
    /// Returns the created objects.
    pub fn load_from_directory(
        self: &Rc<Self>,
        path: &Path,
    ) -> Result<Vec<ObjectRef>, LoadError> {
        let files = load_from_directory(path)?;
        let created =
            self.apply_definitions(files.iter().map(|(_, file)| file))?;
        Ok(created)
    }
}
