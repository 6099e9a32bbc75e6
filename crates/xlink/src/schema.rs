//! Compiled knowledge of the dataset schema.
//!
//! Three static tables drive the integrity engine:
//!
//! - the domain table (domain name, backing file, root container key),
//! - the field-to-domain table (which relationship fields a domain may carry
//!   and which domain each one points into),
//! - the bidirectional mapping (pairs of fields that are semantic inverses).
//!
//! The tables are compiled in. A config file may add relationship fields and
//! inverse pairs or relocate domain files (see [`Schema::with_config`]), but
//! cannot remove anything.

use crate::config::XlinkConfig;
use anyhow::{anyhow, bail, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

pub const MATERIALS: &str = "materials";
pub const CONTAMINANTS: &str = "contaminants";
pub const COMPOUNDS: &str = "compounds";
pub const SETTINGS: &str = "settings";

/// (domain, default file relative to the data dir, root container key)
const BUILTIN_DOMAINS: &[(&str, &str, &str)] = &[
    (MATERIALS, "materials/Materials.yaml", "materials"),
    (
        CONTAMINANTS,
        "contaminants/Contaminants.yaml",
        "contamination_patterns",
    ),
    (COMPOUNDS, "compounds/Compounds.yaml", "compounds"),
    (SETTINGS, "settings/Settings.yaml", "settings"),
];

/// (source domain, relationship field, target domain)
const BUILTIN_FIELDS: &[(&str, &str, &str)] = &[
    (MATERIALS, "related_contaminants", CONTAMINANTS),
    (MATERIALS, "related_compounds", COMPOUNDS),
    (MATERIALS, "related_settings", SETTINGS),
    (CONTAMINANTS, "related_materials", MATERIALS),
    (CONTAMINANTS, "produces_compounds", COMPOUNDS),
    (COMPOUNDS, "produced_by_contaminants", CONTAMINANTS),
    (COMPOUNDS, "related_materials", MATERIALS),
    (SETTINGS, "related_materials", MATERIALS),
];

/// Inverse pairs, registered in both directions.
const BUILTIN_INVERSES: &[((&str, &str), (&str, &str))] = &[
    (
        (MATERIALS, "related_contaminants"),
        (CONTAMINANTS, "related_materials"),
    ),
    ((MATERIALS, "related_compounds"), (COMPOUNDS, "related_materials")),
    ((MATERIALS, "related_settings"), (SETTINGS, "related_materials")),
    (
        (CONTAMINANTS, "produces_compounds"),
        (COMPOUNDS, "produced_by_contaminants"),
    ),
];

/// A domain partition and where it lives on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainSpec {
    pub name: String,
    /// Path of the backing file, relative to the data directory.
    pub file: PathBuf,
    /// Root key under which the domain's items are stored.
    pub container_key: String,
}

/// A relationship field declared for a source domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub domain: String,
    pub field: String,
    pub target: String,
}

/// One direction of a bidirectional pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InversePair {
    pub domain: String,
    pub field: String,
    pub inverse_domain: String,
    pub inverse_field: String,
}

/// The schema tables used for one run.
#[derive(Debug, Clone)]
pub struct Schema {
    domains: Vec<DomainSpec>,
    fields: Vec<FieldSpec>,
    inverses: Vec<InversePair>,
    targets: HashMap<(String, String), usize>,
    inverse_lookup: HashMap<(String, String), usize>,
}

impl Schema {
    /// The compiled-in schema.
    pub fn builtin() -> Self {
        let mut schema = Self {
            domains: BUILTIN_DOMAINS
                .iter()
                .map(|(name, file, key)| DomainSpec {
                    name: name.to_string(),
                    file: PathBuf::from(file),
                    container_key: key.to_string(),
                })
                .collect(),
            fields: Vec::new(),
            inverses: Vec::new(),
            targets: HashMap::new(),
            inverse_lookup: HashMap::new(),
        };

        for (domain, field, target) in BUILTIN_FIELDS {
            schema.push_field(domain, field, target);
        }
        for ((domain, field), (inv_domain, inv_field)) in BUILTIN_INVERSES {
            schema.push_inverse(domain, field, inv_domain, inv_field);
            schema.push_inverse(inv_domain, inv_field, domain, field);
        }

        schema
    }

    /// Builtin schema extended by the `[domains]` and `[schema]` config sections.
    pub fn with_config(config: &XlinkConfig) -> Result<Self> {
        let mut schema = Self::builtin();

        for (name, overrides) in config.domain_overrides() {
            let spec = schema
                .domains
                .iter_mut()
                .find(|d| &d.name == name)
                .ok_or_else(|| anyhow!("Unknown domain '{}' in [domains] config", name))?;
            if let Some(file) = &overrides.file {
                spec.file = PathBuf::from(file);
            }
            if let Some(key) = &overrides.container_key {
                spec.container_key = key.clone();
            }
        }

        for rel in config.extra_relationships() {
            schema.add_relationship(&rel.domain, &rel.field, &rel.target)?;
            if let Some(inverse) = &rel.inverse {
                let (inv_domain, inv_field) = inverse.split_once('.').ok_or_else(|| {
                    anyhow!(
                        "Invalid inverse '{}' for {}.{}: expected '<domain>.<field>'",
                        inverse,
                        rel.domain,
                        rel.field
                    )
                })?;
                schema.add_inverse(&rel.domain, &rel.field, inv_domain, inv_field)?;
            }
        }

        Ok(schema)
    }

    /// Declare a new relationship field.
    ///
    /// Re-declaring an existing field with the same target is a no-op;
    /// re-declaring it with a different target is an error.
    pub fn add_relationship(&mut self, domain: &str, field: &str, target: &str) -> Result<()> {
        self.require_domain(domain)?;
        self.require_domain(target)?;

        match self.target_of(domain, field) {
            Some(existing) if existing == target => Ok(()),
            Some(existing) => bail!(
                "Relationship {}.{} already targets '{}', cannot retarget to '{}'",
                domain,
                field,
                existing,
                target
            ),
            None => {
                self.push_field(domain, field, target);
                Ok(())
            }
        }
    }

    /// Declare two existing fields as inverses of each other.
    pub fn add_inverse(
        &mut self,
        domain: &str,
        field: &str,
        inverse_domain: &str,
        inverse_field: &str,
    ) -> Result<()> {
        let forward_target = self
            .target_of(domain, field)
            .ok_or_else(|| anyhow!("Relationship {}.{} is not declared", domain, field))?;
        let backward_target = self.target_of(inverse_domain, inverse_field).ok_or_else(|| {
            anyhow!(
                "Relationship {}.{} is not declared",
                inverse_domain,
                inverse_field
            )
        })?;

        if forward_target != inverse_domain || backward_target != domain {
            bail!(
                "{}.{} -> {} and {}.{} -> {} are not inverses",
                domain,
                field,
                forward_target,
                inverse_domain,
                inverse_field,
                backward_target
            );
        }

        if self.inverse_of(domain, field).is_none() {
            self.push_inverse(domain, field, inverse_domain, inverse_field);
        }
        if self.inverse_of(inverse_domain, inverse_field).is_none() {
            self.push_inverse(inverse_domain, inverse_field, domain, field);
        }
        Ok(())
    }

    pub fn domains(&self) -> &[DomainSpec] {
        &self.domains
    }

    pub fn domain(&self, name: &str) -> Option<&DomainSpec> {
        self.domains.iter().find(|d| d.name == name)
    }

    pub fn has_domain(&self, name: &str) -> bool {
        self.domain(name).is_some()
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Fields declared for `domain`, in declaration order.
    pub fn fields_for<'a>(&'a self, domain: &'a str) -> impl Iterator<Item = &'a FieldSpec> + 'a {
        self.fields.iter().filter(move |f| f.domain == domain)
    }

    /// Target domain of a relationship field, if declared.
    pub fn target_of(&self, domain: &str, field: &str) -> Option<&str> {
        self.targets
            .get(&(domain.to_string(), field.to_string()))
            .map(|&i| self.fields[i].target.as_str())
    }

    /// Inverse (domain, field) of a relationship field, if it has one.
    pub fn inverse_of(&self, domain: &str, field: &str) -> Option<(&str, &str)> {
        self.inverse_lookup
            .get(&(domain.to_string(), field.to_string()))
            .map(|&i| {
                let pair = &self.inverses[i];
                (pair.inverse_domain.as_str(), pair.inverse_field.as_str())
            })
    }

    pub fn inverses(&self) -> &[InversePair] {
        &self.inverses
    }

    fn require_domain(&self, name: &str) -> Result<()> {
        if self.has_domain(name) {
            Ok(())
        } else {
            Err(anyhow!(
                "Unknown domain '{}'. Known domains: {}",
                name,
                self.domain_names().join(", ")
            ))
        }
    }

    pub fn domain_names(&self) -> Vec<&str> {
        self.domains.iter().map(|d| d.name.as_str()).collect()
    }

    fn push_field(&mut self, domain: &str, field: &str, target: &str) {
        self.targets
            .insert((domain.to_string(), field.to_string()), self.fields.len());
        self.fields.push(FieldSpec {
            domain: domain.to_string(),
            field: field.to_string(),
            target: target.to_string(),
        });
    }

    fn push_inverse(&mut self, domain: &str, field: &str, inv_domain: &str, inv_field: &str) {
        self.inverse_lookup
            .insert((domain.to_string(), field.to_string()), self.inverses.len());
        self.inverses.push(InversePair {
            domain: domain.to_string(),
            field: field.to_string(),
            inverse_domain: inv_domain.to_string(),
            inverse_field: inv_field.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RelationshipConfig, SchemaConfig};

    #[test]
    fn test_builtin_field_targets() {
        let schema = Schema::builtin();
        assert_eq!(
            schema.target_of(MATERIALS, "related_contaminants"),
            Some(CONTAMINANTS)
        );
        assert_eq!(schema.target_of(SETTINGS, "related_materials"), Some(MATERIALS));
        assert_eq!(schema.target_of(MATERIALS, "related_materials"), None);
    }

    #[test]
    fn test_builtin_inverses_are_symmetric() {
        let schema = Schema::builtin();
        for pair in schema.inverses() {
            let back = schema
                .inverse_of(&pair.inverse_domain, &pair.inverse_field)
                .unwrap();
            assert_eq!(back, (pair.domain.as_str(), pair.field.as_str()));
            assert_eq!(
                schema.target_of(&pair.domain, &pair.field),
                Some(pair.inverse_domain.as_str())
            );
        }
    }

    #[test]
    fn test_fields_for_keeps_declaration_order() {
        let schema = Schema::builtin();
        let fields: Vec<_> = schema
            .fields_for(MATERIALS)
            .map(|f| f.field.as_str())
            .collect();
        assert_eq!(
            fields,
            vec!["related_contaminants", "related_compounds", "related_settings"]
        );
    }

    #[test]
    fn test_add_relationship_rejects_unknown_domain() {
        let mut schema = Schema::builtin();
        let err = schema
            .add_relationship(MATERIALS, "related_machines", "machines")
            .unwrap_err();
        assert!(err.to_string().contains("Unknown domain 'machines'"));
    }

    #[test]
    fn test_add_relationship_rejects_retarget() {
        let mut schema = Schema::builtin();
        assert!(schema
            .add_relationship(MATERIALS, "related_contaminants", CONTAMINANTS)
            .is_ok());
        assert!(schema
            .add_relationship(MATERIALS, "related_contaminants", SETTINGS)
            .is_err());
    }

    #[test]
    fn test_add_inverse_requires_matching_targets() {
        let mut schema = Schema::builtin();
        schema
            .add_relationship(SETTINGS, "prevents_contaminants", CONTAMINANTS)
            .unwrap();
        // contaminants.related_materials points at materials, not settings
        assert!(schema
            .add_inverse(SETTINGS, "prevents_contaminants", CONTAMINANTS, "related_materials")
            .is_err());

        schema
            .add_relationship(CONTAMINANTS, "prevented_by_settings", SETTINGS)
            .unwrap();
        schema
            .add_inverse(
                SETTINGS,
                "prevents_contaminants",
                CONTAMINANTS,
                "prevented_by_settings",
            )
            .unwrap();
        assert_eq!(
            schema.inverse_of(CONTAMINANTS, "prevented_by_settings"),
            Some((SETTINGS, "prevents_contaminants"))
        );
    }

    #[test]
    fn test_with_config_extends_tables() {
        let config = XlinkConfig {
            schema: Some(SchemaConfig {
                relationships: Some(vec![
                    RelationshipConfig {
                        domain: CONTAMINANTS.to_string(),
                        field: "removal_settings".to_string(),
                        target: SETTINGS.to_string(),
                        inverse: None,
                    },
                    RelationshipConfig {
                        domain: SETTINGS.to_string(),
                        field: "removes_contaminants".to_string(),
                        target: CONTAMINANTS.to_string(),
                        inverse: Some("contaminants.removal_settings".to_string()),
                    },
                ]),
            }),
            ..Default::default()
        };

        let schema = Schema::with_config(&config).unwrap();
        assert_eq!(
            schema.inverse_of(CONTAMINANTS, "removal_settings"),
            Some((SETTINGS, "removes_contaminants"))
        );
    }

    #[test]
    fn test_with_config_rejects_malformed_inverse() {
        let config = XlinkConfig {
            schema: Some(SchemaConfig {
                relationships: Some(vec![RelationshipConfig {
                    domain: SETTINGS.to_string(),
                    field: "removes_contaminants".to_string(),
                    target: CONTAMINANTS.to_string(),
                    inverse: Some("removal_settings".to_string()),
                }]),
            }),
            ..Default::default()
        };

        let err = Schema::with_config(&config).unwrap_err();
        assert!(err.to_string().contains("expected '<domain>.<field>'"));
    }
}
