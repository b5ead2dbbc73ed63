//! Role graph and RBAC evaluator.
//!
//! Roles live in a flat, name-keyed map — an arena, not a web of owning
//! references — with inheritance edges stored as child-to-parent adjacency
//! plus a reverse (parent-to-children) index for descendant queries.
//! Ancestry, descendants and cycle detection are all plain BFS over this
//! adjacency; nothing here follows a pointer.

use crate::decision::{Decision, DecisionSource};
use crate::errors::{AuthzError, AuthzResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};

/// `(resource, action)`, either half possibly the wildcard `"*"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub resource: String,
    pub action: String,
}

impl PermissionGrant {
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }

    /// `(gR == "*" or gR == resource) and (gA == "*" or gA == action)`.
    pub fn matches(&self, resource: &str, action: &str) -> bool {
        (self.resource == "*" || self.resource == resource)
            && (self.action == "*" || self.action == action)
    }

    pub fn canonical(&self) -> String {
        format!("{}:{}", self.resource, self.action)
    }

    /// Parses the canonical `"resource:action"` form.
    pub fn parse(s: &str) -> AuthzResult<Self> {
        let (resource, action) = s
            .split_once(':')
            .ok_or_else(|| AuthzError::InvalidPermission(s.to_string()))?;
        if resource.is_empty() || action.is_empty() {
            return Err(AuthzError::InvalidPermission(s.to_string()));
        }
        Ok(Self::new(resource, action))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub metadata: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub grants: HashSet<PermissionGrant>,
    pub parents: Vec<String>,
}

/// Construction options for [`RbacEngine::create_role`].
#[derive(Debug, Clone, Default)]
pub struct RoleOptions {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub metadata: HashMap<String, Value>,
    pub parents: Vec<String>,
    pub grants: Vec<PermissionGrant>,
}

/// Partial update for [`RbacEngine::update_role`]; `None` leaves a field
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct RoleChanges {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<HashMap<String, Value>>,
    pub parents: Option<Vec<String>>,
}

const DEFAULT_MAX_DEPTH: usize = 10;

pub struct RbacEngine {
    roles: HashMap<String, Role>,
    /// parent -> direct children (reverse of `Role::parents`).
    children: HashMap<String, HashSet<String>>,
    user_roles: HashMap<String, HashSet<String>>,
    /// Memoized effective grant set per role, invalidated on any mutation
    /// that could change it (own grants, own parents, or an ancestor's).
    effective_memo: HashMap<String, HashSet<PermissionGrant>>,
    max_depth: usize,
}

impl RbacEngine {
    pub fn new(max_depth: usize) -> Self {
        Self {
            roles: HashMap::new(),
            children: HashMap::new(),
            user_roles: HashMap::new(),
            effective_memo: HashMap::new(),
            max_depth: if max_depth == 0 {
                DEFAULT_MAX_DEPTH
            } else {
                max_depth
            },
        }
    }

    // ---- role CRUD -------------------------------------------------

    pub fn create_role(&mut self, name: &str, options: RoleOptions) -> AuthzResult<()> {
        if name.is_empty() {
            return Err(AuthzError::InvalidConfig("role name must not be empty".into()));
        }
        if self.roles.contains_key(name) {
            return Err(AuthzError::InvalidConfig(format!("role already exists: {name}")));
        }
        for parent in &options.parents {
            if !self.roles.contains_key(parent) {
                return Err(AuthzError::RoleNotFound(parent.clone()));
            }
        }
        let depth = options
            .parents
            .iter()
            .map(|p| self.depth_of(p))
            .max()
            .unwrap_or(0)
            + 1;
        if depth > self.max_depth {
            return Err(AuthzError::InvalidConfig(format!(
                "role hierarchy depth {depth} exceeds maximum {}",
                self.max_depth
            )));
        }

        let now = Utc::now();
        let role = Role {
            name: name.to_string(),
            display_name: options.display_name.unwrap_or_else(|| name.to_string()),
            description: options.description.unwrap_or_default(),
            metadata: options.metadata,
            created_at: now,
            updated_at: now,
            grants: options.grants.into_iter().collect(),
            parents: options.parents.clone(),
        };

        for parent in &options.parents {
            self.children.entry(parent.clone()).or_default().insert(name.to_string());
        }
        self.roles.insert(name.to_string(), role);
        self.invalidate_memo_for(name);
        Ok(())
    }

    pub fn update_role(&mut self, name: &str, changes: RoleChanges) -> AuthzResult<()> {
        if !self.roles.contains_key(name) {
            return Err(AuthzError::RoleNotFound(name.to_string()));
        }

        if let Some(new_parents) = &changes.parents {
            for parent in new_parents {
                if !self.roles.contains_key(parent) {
                    return Err(AuthzError::RoleNotFound(parent.clone()));
                }
                if parent == name || self.is_ancestor(name, parent) {
                    return Err(AuthzError::CircularInheritance(format!(
                        "{name} -> {parent} would create a cycle"
                    )));
                }
            }
            let depth = new_parents
                .iter()
                .map(|p| self.depth_of(p))
                .max()
                .unwrap_or(0)
                + 1;
            if depth > self.max_depth {
                return Err(AuthzError::InvalidConfig(format!(
                    "role hierarchy depth {depth} exceeds maximum {}",
                    self.max_depth
                )));
            }
        }

        // Validated; now apply atomically.
        let old_parents = self.roles.get(name).unwrap().parents.clone();
        if let Some(new_parents) = &changes.parents {
            for old in &old_parents {
                if let Some(set) = self.children.get_mut(old) {
                    set.remove(name);
                }
            }
            for new in new_parents {
                self.children.entry(new.clone()).or_default().insert(name.to_string());
            }
        }

        let role = self.roles.get_mut(name).unwrap();
        if let Some(v) = changes.display_name {
            role.display_name = v;
        }
        if let Some(v) = changes.description {
            role.description = v;
        }
        if let Some(v) = changes.metadata {
            role.metadata = v;
        }
        if let Some(v) = changes.parents {
            role.parents = v;
        }
        role.updated_at = Utc::now();

        self.invalidate_memo_for(name);
        Ok(())
    }

    pub fn delete_role(&mut self, name: &str) -> AuthzResult<()> {
        if !self.roles.contains_key(name) {
            return Err(AuthzError::RoleNotFound(name.to_string()));
        }

        let parents = self.roles.get(name).unwrap().parents.clone();
        for parent in &parents {
            if let Some(set) = self.children.get_mut(parent) {
                set.remove(name);
            }
        }
        // Sever incoming edges: any role naming `name` as a parent loses it.
        for role in self.roles.values_mut() {
            role.parents.retain(|p| p != name);
        }
        self.children.remove(name);

        for roles in self.user_roles.values_mut() {
            roles.remove(name);
        }

        self.roles.remove(name);
        self.effective_memo.clear();
        Ok(())
    }

    pub fn get_role(&self, name: &str) -> Option<&Role> {
        self.roles.get(name)
    }

    pub fn list_roles(&self) -> Vec<&Role> {
        self.roles.values().collect()
    }

    pub fn user_role_assignments(&self) -> &HashMap<String, HashSet<String>> {
        &self.user_roles
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Rebuilds an engine from previously exported roles and assignments,
    /// reconstructing the reverse child index but trusting the roles are
    /// already acyclic and within `max_depth` (the export only ever came
    /// from a validated engine).
    pub fn restore(max_depth: usize, roles: Vec<Role>, user_roles: HashMap<String, HashSet<String>>) -> Self {
        let mut engine = Self::new(max_depth);
        for role in roles {
            for parent in &role.parents {
                engine.children.entry(parent.clone()).or_default().insert(role.name.clone());
            }
            engine.roles.insert(role.name.clone(), role);
        }
        engine.user_roles = user_roles;
        engine
    }

    // ---- assignments -------------------------------------------------

    pub fn assign_role(&mut self, user: &str, role: &str) -> AuthzResult<()> {
        if !self.roles.contains_key(role) {
            return Err(AuthzError::RoleNotFound(role.to_string()));
        }
        self.user_roles.entry(user.to_string()).or_default().insert(role.to_string());
        Ok(())
    }

    pub fn unassign_role(&mut self, user: &str, role: &str) {
        if let Some(set) = self.user_roles.get_mut(user) {
            set.remove(role);
        }
    }

    pub fn direct_roles(&self, user: &str) -> HashSet<String> {
        self.user_roles.get(user).cloned().unwrap_or_default()
    }

    // ---- grants -------------------------------------------------

    pub fn grant(
        &mut self,
        role: &str,
        resource: &str,
        action: &str,
        recursive: bool,
    ) -> AuthzResult<()> {
        if !self.roles.contains_key(role) {
            return Err(AuthzError::RoleNotFound(role.to_string()));
        }
        let grant = PermissionGrant::new(resource, action);
        self.roles.get_mut(role).unwrap().grants.insert(grant.clone());
        self.invalidate_memo_for(role);

        if recursive {
            for descendant in self.descendants_of(role) {
                if let Some(r) = self.roles.get_mut(&descendant) {
                    r.grants.insert(grant.clone());
                }
                self.invalidate_memo_for(&descendant);
            }
        }
        Ok(())
    }

    pub fn revoke(
        &mut self,
        role: &str,
        resource: &str,
        action: &str,
        recursive: bool,
    ) -> AuthzResult<()> {
        if !self.roles.contains_key(role) {
            return Err(AuthzError::RoleNotFound(role.to_string()));
        }
        let grant = PermissionGrant::new(resource, action);
        self.roles.get_mut(role).unwrap().grants.remove(&grant);
        self.invalidate_memo_for(role);

        if recursive {
            for descendant in self.descendants_of(role) {
                if let Some(r) = self.roles.get_mut(&descendant) {
                    r.grants.remove(&grant);
                }
                self.invalidate_memo_for(&descendant);
            }
        }
        Ok(())
    }

    // ---- graph queries -------------------------------------------------

    /// Is `candidate` an ancestor of `of` (reachable by following `of`'s
    /// parent edges, transitively)?
    fn is_ancestor(&self, candidate: &str, of: &str) -> bool {
        self.ancestors_of(of).contains(candidate)
    }

    fn ancestors_of(&self, role: &str) -> HashSet<String> {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<String> = self
            .roles
            .get(role)
            .map(|r| r.parents.clone().into())
            .unwrap_or_default();

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(r) = self.roles.get(&current) {
                for parent in &r.parents {
                    if !visited.contains(parent) {
                        queue.push_back(parent.clone());
                    }
                }
            }
        }
        visited
    }

    fn depth_of(&self, role: &str) -> usize {
        self.ancestors_of(role).len()
    }

    /// All roles that inherit from `role`, directly or transitively.
    fn descendants_of(&self, role: &str) -> HashSet<String> {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<String> = self
            .children
            .get(role)
            .map(|c| c.iter().cloned().collect())
            .unwrap_or_default();

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(kids) = self.children.get(&current) {
                for kid in kids {
                    if !visited.contains(kid) {
                        queue.push_back(kid.clone());
                    }
                }
            }
        }
        visited
    }

    fn invalidate_memo_for(&mut self, role: &str) {
        self.effective_memo.remove(role);
        for descendant in self.descendants_of(role) {
            self.effective_memo.remove(&descendant);
        }
    }

    /// Union of a role's direct grants with all ancestors' grants.
    fn effective_grants(&mut self, role: &str) -> HashSet<PermissionGrant> {
        if let Some(cached) = self.effective_memo.get(role) {
            return cached.clone();
        }

        let mut grants = HashSet::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([role.to_string()]);
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(r) = self.roles.get(&current) {
                grants.extend(r.grants.iter().cloned());
                for parent in &r.parents {
                    queue.push_back(parent.clone());
                }
            }
        }

        self.effective_memo.insert(role.to_string(), grants.clone());
        grants
    }

    /// Direct role assignments union all ancestors of each.
    pub fn effective_roles(&self, user: &str) -> HashSet<String> {
        let direct = self.direct_roles(user);
        let mut all = direct.clone();
        for role in &direct {
            all.extend(self.ancestors_of(role));
        }
        all
    }

    /// Every user whose effective role set contains `role` — used by cache
    /// invalidation when `role`'s grants change: a user
    /// holding a role that merely inherits from `role` is included because
    /// `effective_roles` already walks the ancestor chain.
    pub fn users_with_role(&self, role: &str) -> HashSet<String> {
        self.user_roles
            .keys()
            .filter(|user| self.effective_roles(user).contains(role))
            .cloned()
            .collect()
    }

    // ---- decision -------------------------------------------------

    pub fn check(&mut self, user: &str, resource: &str, action: &str) -> Decision {
        self.check_with_extra_roles(user, resource, action, &HashSet::new())
    }

    /// Like [`Self::check`], but also considers `extra_roles` as if they were
    /// directly assigned — used to fold temporary role grants into the
    /// regular role graph without persisting them as assignments.
    pub fn check_with_extra_roles(
        &mut self,
        user: &str,
        resource: &str,
        action: &str,
        extra_roles: &HashSet<String>,
    ) -> Decision {
        let mut effective_roles = self.effective_roles(user);
        for role in extra_roles {
            effective_roles.insert(role.clone());
            effective_roles.extend(self.ancestors_of(role));
        }
        if effective_roles.is_empty() {
            return Decision::deny("no roles assigned", DecisionSource::Rbac);
        }

        for role in &effective_roles {
            let grants = self.effective_grants(role);
            for grant in &grants {
                if grant.matches(resource, action) {
                    return Decision::allow(DecisionSource::Rbac)
                        .with_matched_role(role.clone())
                        .with_matched_grant(grant.canonical());
                }
            }
        }

        Decision::deny("no matching grants", DecisionSource::Rbac)
    }
}
