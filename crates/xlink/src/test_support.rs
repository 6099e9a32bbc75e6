//! Shared test fixtures.

#![cfg(test)]

use crate::schema::Schema;
use crate::store::{DomainSet, DomainStore};
use std::path::Path;

/// Build an in-memory set from `(domain, yaml)` pairs.
///
/// Domains not listed are present but empty.
pub fn dataset_with(files: &[(&str, &str)]) -> DomainSet {
    let schema = Schema::builtin();
    let stores = schema
        .domains()
        .iter()
        .map(|spec| {
            let yaml = files
                .iter()
                .find(|(domain, _)| *domain == spec.name)
                .map(|(_, yaml)| yaml.to_string())
                .unwrap_or_else(|| format!("{}: {{}}\n", spec.container_key));
            DomainStore::parse(spec, &spec.file, &yaml).unwrap()
        })
        .collect();
    DomainSet::from_stores(Path::new("."), stores)
}

/// Materials and contaminants, everything else empty.
pub fn dataset(materials: &str, contaminants: &str) -> DomainSet {
    dataset_with(&[("materials", materials), ("contaminants", contaminants)])
}

/// Write `(domain, yaml)` pairs to their default locations under `root`.
pub fn write_dataset(root: &Path, files: &[(&str, &str)]) {
    let schema = Schema::builtin();
    for (domain, yaml) in files {
        let spec = schema.domain(domain).unwrap();
        let path = root.join(&spec.file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, yaml).unwrap();
    }
}
