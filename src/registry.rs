// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! App registry.
//!
//! Built once at startup, validated, then shared read-only behind an `Arc`.
//!
//! ```rust
//! use datahub_search::registry::AppRegistry;
//! use datahub_search::EntityKind;
//!
//! let registry = AppRegistry::datahub().unwrap();
//! assert_eq!(registry.get("company").unwrap().kind(), EntityKind::Company);
//! assert!(registry.get("referral").is_err());
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::apps::{
    CompanySearchApp, ContactSearchApp, InteractionSearchApp, OrderSearchApp, SearchApp,
};
use crate::entity::EntityKind;
use crate::mapping::MappingError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No search app named '{0}'")]
    NotFound(String),
    #[error("Search app '{0}' is registered twice")]
    DuplicateApp(String),
    #[error("Two search apps index {0} records")]
    DuplicateKind(EntityKind),
    #[error("Invalid mapping: {0}")]
    InvalidMapping(#[from] MappingError),
    #[error("Invalid query rules of '{app}': {reason}")]
    InvalidQueryRules { app: String, reason: String },
}

/// Immutable set of search apps, by name and by record kind.
pub struct AppRegistry {
    apps: Vec<Arc<dyn SearchApp>>,
    by_name: HashMap<&'static str, usize>,
    by_kind: HashMap<EntityKind, usize>,
}

impl std::fmt::Debug for AppRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppRegistry")
            .field("apps", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

impl AppRegistry {
    pub fn builder() -> AppRegistryBuilder {
        AppRegistryBuilder::default()
    }

    /// Company, contact, interaction and order.
    pub fn datahub() -> Result<Self, RegistryError> {
        Self::builder()
            .register(CompanySearchApp::new())
            .register(ContactSearchApp::new())
            .register(InteractionSearchApp::new())
            .register(OrderSearchApp::new())
            .build()
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn SearchApp>, RegistryError> {
        self.by_name
            .get(name)
            .map(|&i| &self.apps[i])
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn get_by_kind(&self, kind: EntityKind) -> Option<&Arc<dyn SearchApp>> {
        self.by_kind.get(&kind).map(|&i| &self.apps[i])
    }

    /// Registration order.
    pub fn apps(&self) -> impl Iterator<Item = &Arc<dyn SearchApp>> {
        self.apps.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.apps.iter().map(|app| app.name())
    }

    /// Apps whose documents embed `kind` records.
    pub fn dependents_of(&self, kind: EntityKind) -> impl Iterator<Item = (&Arc<dyn SearchApp>, &'static str)> {
        self.apps.iter().flat_map(move |app| {
            app.dependencies()
                .iter()
                .filter(move |edge| edge.source == kind)
                .map(move |edge| (app, edge.relation))
        })
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

#[derive(Default)]
pub struct AppRegistryBuilder {
    apps: Vec<Arc<dyn SearchApp>>,
}

impl AppRegistryBuilder {
    pub fn register(mut self, app: impl SearchApp + 'static) -> Self {
        self.apps.push(Arc::new(app));
        self
    }

    /// Validate every app and freeze the set.
    pub fn build(self) -> Result<AppRegistry, RegistryError> {
        let mut by_name = HashMap::new();
        let mut by_kind = HashMap::new();

        for (i, app) in self.apps.iter().enumerate() {
            app.check_mapping()?;
            app.query_rules()
                .check_against(app.schema())
                .map_err(|reason| RegistryError::InvalidQueryRules {
                    app: app.name().to_string(),
                    reason,
                })?;
            if by_name.insert(app.name(), i).is_some() {
                return Err(RegistryError::DuplicateApp(app.name().to_string()));
            }
            if by_kind.insert(app.kind(), i).is_some() {
                return Err(RegistryError::DuplicateKind(app.kind()));
            }
        }

        Ok(AppRegistry {
            apps: self.apps,
            by_name,
            by_kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datahub_registry() {
        let registry = AppRegistry::datahub().unwrap();
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["company", "contact", "interaction", "order"]
        );
        assert_eq!(registry.get_by_kind(EntityKind::Order).unwrap().name(), "order");
        assert!(registry.get_by_kind(EntityKind::Adviser).is_none());
        assert_eq!(
            registry.get("referral").err(),
            Some(RegistryError::NotFound("referral".into()))
        );
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = AppRegistry::builder()
            .register(CompanySearchApp::new())
            .register(CompanySearchApp::new())
            .build()
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateApp("company".into()));
    }

    #[test]
    fn test_dependents_of_company() {
        let registry = AppRegistry::datahub().unwrap();
        let mut edges: Vec<(&str, &str)> = registry
            .dependents_of(EntityKind::Company)
            .map(|(app, relation)| (app.name(), relation))
            .collect();
        edges.sort();
        assert_eq!(
            edges,
            vec![
                ("company", "global_headquarters"),
                ("contact", "company"),
                ("interaction", "company"),
                ("order", "company"),
            ]
        );

        let adviser_edges = registry.dependents_of(EntityKind::Adviser).count();
        assert_eq!(adviser_edges, 6);
    }
}
