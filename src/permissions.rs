// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Request context and permission scoping.
//!
//! Authentication and role management live outside this crate. Callers hand
//! over a [`RequestContext`]; each app turns it into a [`PermissionFilter`]
//! that the composer ANDs with the rest of the query.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Who is asking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// `None` for anonymous requests
    pub user_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub permissions: HashSet<String>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn with_team(mut self, team_id: Uuid) -> Self {
        self.team_id = Some(team_id);
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// One `field == value` condition a result may satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRule {
    pub field: String,
    pub value: String,
}

impl PermissionRule {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Result restriction for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionFilter {
    /// No restriction
    Unrestricted,
    /// Results must satisfy at least one rule
    AnyOf(Vec<PermissionRule>),
    /// Nothing may be returned
    ExcludeAll,
}

impl PermissionFilter {
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, PermissionFilter::Unrestricted)
    }
}
