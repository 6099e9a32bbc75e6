//! Domain stores: one YAML file per domain, parsed into typed items.
//!
//! Each [`DomainStore`] keeps two views of its file:
//!
//! - the raw YAML document, so the repairer can write back exactly what was
//!   loaded plus its own edits, and
//! - a typed, ordered list of [`Item`]s validated once at load time, which is
//!   what every validator reads.
//!
//! Malformed input is never fatal for the whole run. A file that cannot be
//! loaded becomes an empty store plus a [`LoadWarning`]; a malformed item is
//! skipped (or loses its relationships) with a warning.

use crate::errors::DomainLoadError;
use crate::schema::{DomainSpec, Schema};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const RELATIONSHIPS_KEY: &str = "relationships";
const ID_KEY: &str = "id";

/// A pointer from a relationship field to an item id.
///
/// `metadata` holds everything except `id` (frequency, severity, context...).
/// It travels with the reference and is preserved on write, but plays no role
/// in integrity checking.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub id: String,
    pub metadata: Mapping,
}

impl Reference {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metadata: Mapping::new(),
        }
    }
}

/// A named relationship field with its ordered references.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipField {
    pub name: String,
    pub references: Vec<Reference>,
}

/// A uniquely identified record within a domain.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: String,
    /// Relationship fields in the order they appear in the file.
    pub relationships: Vec<RelationshipField>,
}

impl Item {
    pub fn field(&self, name: &str) -> Option<&RelationshipField> {
        self.relationships.iter().find(|f| f.name == name)
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut RelationshipField> {
        self.relationships.iter_mut().find(|f| f.name == name)
    }
}

/// A non-fatal load diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadWarning {
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub message: String,
}

impl LoadWarning {
    pub(crate) fn domain(domain: &str, message: impl Into<String>) -> Self {
        Self {
            domain: domain.to_string(),
            item_id: None,
            message: message.into(),
        }
    }

    fn item(domain: &str, item_id: &str, message: impl Into<String>) -> Self {
        Self {
            domain: domain.to_string(),
            item_id: Some(item_id.to_string()),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.item_id {
            Some(item) => write!(f, "{}:{}: {}", self.domain, item, self.message),
            None => write!(f, "{}: {}", self.domain, self.message),
        }
    }
}

/// All items of one domain, loaded from its backing file.
#[derive(Debug, Clone)]
pub struct DomainStore {
    spec: DomainSpec,
    path: PathBuf,
    document: Value,
    items: Vec<Item>,
    positions: HashMap<String, usize>,
    warnings: Vec<LoadWarning>,
    loaded: bool,
}

impl DomainStore {
    /// Load and parse a domain file.
    pub fn load(spec: &DomainSpec, path: &Path) -> Result<Self, DomainLoadError> {
        if !path.exists() {
            return Err(DomainLoadError::Missing {
                domain: spec.name.clone(),
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|source| DomainLoadError::Io {
            domain: spec.name.clone(),
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(spec, path, &content)
    }

    /// Parse domain content that has already been read from `path`.
    pub fn parse(spec: &DomainSpec, path: &Path, content: &str) -> Result<Self, DomainLoadError> {
        let document: Value =
            serde_yaml::from_str(content).map_err(|source| DomainLoadError::Parse {
                domain: spec.name.clone(),
                path: path.to_path_buf(),
                source,
            })?;

        let container = match document.get(spec.container_key.as_str()) {
            Some(container) => container,
            None => {
                let found = document
                    .as_mapping()
                    .map(|m| m.keys().map(describe_key).collect())
                    .unwrap_or_default();
                return Err(DomainLoadError::WrongRoot {
                    domain: spec.name.clone(),
                    path: path.to_path_buf(),
                    expected: spec.container_key.clone(),
                    found,
                });
            }
        };

        let mut warnings = Vec::new();
        let mut items = Vec::new();

        match container {
            Value::Null => {}
            Value::Mapping(entries) => {
                for (key, record) in entries {
                    if let Some(item) = parse_item(&spec.name, key, record, &mut warnings) {
                        items.push(item);
                    }
                }
            }
            _ => {
                return Err(DomainLoadError::NotAMapping {
                    domain: spec.name.clone(),
                    path: path.to_path_buf(),
                    key: spec.container_key.clone(),
                })
            }
        }

        let positions = items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.id.clone(), i))
            .collect();

        Ok(Self {
            spec: spec.clone(),
            path: path.to_path_buf(),
            document,
            items,
            positions,
            warnings,
            loaded: true,
        })
    }

    /// An empty store standing in for a domain that failed to load.
    pub fn unavailable(spec: &DomainSpec, path: &Path, warning: LoadWarning) -> Self {
        Self {
            spec: spec.clone(),
            path: path.to_path_buf(),
            document: Value::Null,
            items: Vec::new(),
            positions: HashMap::new(),
            warnings: vec![warning],
            loaded: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &DomainSpec {
        &self.spec
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// False when the file could not be loaded and the store is a placeholder.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Items in load order.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.positions.get(id).map(|&i| &self.items[i])
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn warnings(&self) -> &[LoadWarning] {
        &self.warnings
    }

    /// Serialize the (possibly edited) document back to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.document)
    }

    /// Point the reference at `position` in `item_id.relationships.field` at `new_id`.
    ///
    /// Metadata attached to the reference is kept. Returns false if the
    /// reference does not exist.
    pub fn replace_reference(
        &mut self,
        item_id: &str,
        field: &str,
        position: usize,
        new_id: &str,
    ) -> bool {
        let Some(&idx) = self.positions.get(item_id) else {
            return false;
        };
        let Some(reference) = self.items[idx]
            .field_mut(field)
            .and_then(|f| f.references.get_mut(position))
        else {
            return false;
        };
        reference.id = new_id.to_string();

        let container_key = self.spec.container_key.clone();
        if let Some(entry) = raw_field_mut(&mut self.document, &container_key, item_id, field)
            .and_then(|seq| seq.get_mut(position))
        {
            match entry {
                Value::Mapping(map) => {
                    map.insert(Value::from(ID_KEY), Value::from(new_id));
                }
                other => *other = Value::from(new_id),
            }
        }
        true
    }

    /// Remove the references at `positions` from `item_id.relationships.field`.
    ///
    /// Positions refer to the field as it is before the call; they are removed
    /// highest first so earlier indices stay valid.
    pub fn remove_references(&mut self, item_id: &str, field: &str, positions: &[usize]) {
        let Some(&idx) = self.positions.get(item_id) else {
            return;
        };

        let mut ordered = positions.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        if let Some(typed) = self.items[idx].field_mut(field) {
            for &pos in ordered.iter().rev() {
                if pos < typed.references.len() {
                    typed.references.remove(pos);
                }
            }
        }

        let container_key = self.spec.container_key.clone();
        if let Some(seq) = raw_field_mut(&mut self.document, &container_key, item_id, field) {
            for &pos in ordered.iter().rev() {
                if pos < seq.len() {
                    seq.remove(pos);
                }
            }
        }
    }
}

fn raw_field_mut<'a>(
    document: &'a mut Value,
    container_key: &str,
    item_id: &str,
    field: &str,
) -> Option<&'a mut Vec<Value>> {
    document
        .get_mut(container_key)?
        .get_mut(item_id)?
        .get_mut(RELATIONSHIPS_KEY)?
        .get_mut(field)?
        .as_sequence_mut()
}

fn describe_key(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| "<unprintable>".to_string()),
    }
}

fn parse_item(
    domain: &str,
    key: &Value,
    record: &Value,
    warnings: &mut Vec<LoadWarning>,
) -> Option<Item> {
    let Some(id) = key.as_str() else {
        warnings.push(LoadWarning::domain(
            domain,
            format!("skipping item with non-string key {}", describe_key(key)),
        ));
        return None;
    };

    let Some(record) = record.as_mapping() else {
        warnings.push(LoadWarning::item(
            domain,
            id,
            "skipping item: record is not a mapping",
        ));
        return None;
    };

    let relationships = match record.get(RELATIONSHIPS_KEY) {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => match parse_relationships(value) {
            Ok(fields) => fields,
            Err(reason) => {
                // The item still exists; only its edges are unusable.
                warnings.push(LoadWarning::item(
                    domain,
                    id,
                    format!("ignoring relationships: {}", reason),
                ));
                Vec::new()
            }
        },
    };

    Some(Item {
        id: id.to_string(),
        relationships,
    })
}

fn parse_relationships(value: &Value) -> Result<Vec<RelationshipField>, String> {
    let map = value
        .as_mapping()
        .ok_or_else(|| "'relationships' is not a mapping".to_string())?;

    let mut fields = Vec::with_capacity(map.len());
    for (name, entries) in map {
        let name = name
            .as_str()
            .ok_or_else(|| format!("field name {} is not a string", describe_key(name)))?;

        let references = match entries {
            Value::Null => Vec::new(),
            Value::Sequence(seq) => seq
                .iter()
                .enumerate()
                .map(|(pos, entry)| {
                    parse_reference(entry).map_err(|e| format!("{}[{}]: {}", name, pos, e))
                })
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(format!("field '{}' is not a list", name)),
        };

        fields.push(RelationshipField {
            name: name.to_string(),
            references,
        });
    }
    Ok(fields)
}

fn parse_reference(entry: &Value) -> Result<Reference, String> {
    match entry {
        Value::String(id) => Ok(Reference::new(id.clone())),
        Value::Mapping(map) => {
            let id = map
                .get(ID_KEY)
                .and_then(Value::as_str)
                .ok_or_else(|| "reference has no string 'id'".to_string())?;
            let mut metadata = map.clone();
            metadata.remove(ID_KEY);
            Ok(Reference {
                id: id.to_string(),
                metadata,
            })
        }
        _ => Err("reference is neither a mapping nor a string".to_string()),
    }
}

/// Every domain store for one run, in schema order.
///
/// This is the run-scoped cache of parsed documents: it is owned by the
/// caller and passed by reference to validators and by `&mut` to the
/// repairer. Nothing is cached across runs.
#[derive(Debug, Clone)]
pub struct DomainSet {
    data_dir: PathBuf,
    stores: Vec<DomainStore>,
}

impl DomainSet {
    /// Load every domain in `schema` from `data_dir`.
    ///
    /// Each file is read on its own thread. Failures become empty stores with
    /// a load warning.
    pub fn load(schema: &Schema, data_dir: &Path) -> Self {
        let stores = std::thread::scope(|scope| {
            let handles: Vec<_> = schema
                .domains()
                .iter()
                .map(|spec| {
                    let path = data_dir.join(&spec.file);
                    let handle = scope.spawn({
                        let path = path.clone();
                        move || DomainStore::load(spec, &path)
                    });
                    (spec, path, handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(spec, path, handle)| match handle.join() {
                    Ok(Ok(store)) => {
                        info!(
                            domain = %spec.name,
                            items = store.len(),
                            warnings = store.warnings().len(),
                            "loaded domain"
                        );
                        store
                    }
                    Ok(Err(err)) => {
                        warn!(domain = %spec.name, "{}", err);
                        let message = if err.is_missing() {
                            format!("{}; references into it are not checked", err)
                        } else {
                            format!("{}; domain skipped, references into it are not checked", err)
                        };
                        DomainStore::unavailable(
                            spec,
                            &path,
                            LoadWarning::domain(&spec.name, message),
                        )
                    }
                    Err(_) => DomainStore::unavailable(
                        spec,
                        &path,
                        LoadWarning::domain(&spec.name, "loader thread panicked; domain skipped"),
                    ),
                })
                .collect()
        });

        debug!(data_dir = %data_dir.display(), "all domains loaded");
        Self {
            data_dir: data_dir.to_path_buf(),
            stores,
        }
    }

    /// Assemble a set from stores that were loaded elsewhere.
    pub fn from_stores(data_dir: &Path, stores: Vec<DomainStore>) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            stores,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn stores(&self) -> &[DomainStore] {
        &self.stores
    }

    pub fn get(&self, domain: &str) -> Option<&DomainStore> {
        self.stores.iter().find(|s| s.name() == domain)
    }

    pub fn get_mut(&mut self, domain: &str) -> Option<&mut DomainStore> {
        self.stores.iter_mut().find(|s| s.name() == domain)
    }

    pub fn load_warnings(&self) -> Vec<LoadWarning> {
        self.stores
            .iter()
            .flat_map(|s| s.warnings().iter().cloned())
            .collect()
    }
}
