//! Built-in role templates.
//!
//! Template bodies are seed data, not configuration read from disk — the
//! distilled spec scopes "template catalogs beyond a handful of seed role
//! sets" out of scope for anything past these three.

use crate::rbac::{PermissionGrant, RbacEngine, RoleOptions};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateId {
    BasicCrud,
    ContentManagement,
    UserManagement,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Leave an existing role's grants untouched on collision.
    pub skip_existing: bool,
    /// Union the template's grants into an existing role's grants.
    pub merge: bool,
}

struct SeedRole {
    name: &'static str,
    parents: &'static [&'static str],
    grants: &'static [(&'static str, &'static str)],
}

fn seed_roles(id: TemplateId) -> &'static [SeedRole] {
    match id {
        TemplateId::BasicCrud => &[
            SeedRole {
                name: "viewer",
                parents: &[],
                grants: &[("*", "read")],
            },
            SeedRole {
                name: "editor",
                parents: &["viewer"],
                grants: &[("*", "create"), ("*", "update")],
            },
            SeedRole {
                name: "admin",
                parents: &["editor"],
                grants: &[("*", "delete")],
            },
        ],
        TemplateId::ContentManagement => &[
            SeedRole {
                name: "reader",
                parents: &[],
                grants: &[("posts", "read"), ("comments", "read")],
            },
            SeedRole {
                name: "author",
                parents: &["reader"],
                grants: &[("posts", "create"), ("posts", "update")],
            },
            SeedRole {
                name: "moderator",
                parents: &["author"],
                grants: &[("comments", "delete")],
            },
            SeedRole {
                name: "content-admin",
                parents: &["moderator"],
                grants: &[("posts", "delete"), ("posts", "publish")],
            },
        ],
        TemplateId::UserManagement => &[
            SeedRole {
                name: "user",
                parents: &[],
                grants: &[("profile", "read"), ("profile", "update")],
            },
            SeedRole {
                name: "user-manager",
                parents: &["user"],
                grants: &[("users", "read"), ("users", "suspend")],
            },
            SeedRole {
                name: "super-admin",
                parents: &["user-manager"],
                grants: &[("users", "*"), ("system", "*")],
            },
        ],
    }
}

/// Creates the template's missing roles and applies its grants, respecting
/// `options` on collision with an already-existing role.
pub fn apply_template(engine: &mut RbacEngine, id: TemplateId, options: ApplyOptions) {
    for seed in seed_roles(id) {
        if engine.get_role(seed.name).is_none() {
            engine
                .create_role(
                    seed.name,
                    RoleOptions {
                        parents: seed.parents.iter().map(|p| p.to_string()).collect(),
                        ..Default::default()
                    },
                )
                .ok();
        } else if options.skip_existing && !options.merge {
            continue;
        }

        for (resource, action) in seed.grants {
            engine.grant(seed.name, resource, action, false).ok();
        }
    }
}

pub fn template_role_names(id: TemplateId) -> Vec<&'static str> {
    seed_roles(id).iter().map(|s| s.name).collect()
}

pub fn template_grant_count(id: TemplateId) -> usize {
    seed_roles(id).iter().map(|s| s.grants.len()).sum()
}
