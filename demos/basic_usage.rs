//! Basic usage walkthrough for the authorization engine.
//!
//! Demonstrates role setup, attribute-based rules, temporary grants, and
//! the unified `check()` entry point.

use authzen::{
    AuthzEngine, CheckOptions, DecisionContext, EngineConfig, RoleOptions,
};
use chrono::Utc;

fn main() {
    println!("authzen - Basic Usage Example");
    println!("{}", "=".repeat(60));

    // 1. Build the engine.
    println!("1. Constructing the engine...");
    let engine = AuthzEngine::new(EngineConfig::default());
    println!("   engine ready, default-deny = {}", engine.config().default_deny);

    // 2. Define a role hierarchy and grant permissions.
    println!("\n2. Setting up roles...");
    engine.create_role("viewer", RoleOptions::default()).unwrap();
    engine
        .create_role(
            "editor",
            RoleOptions {
                parents: vec!["viewer".to_string()],
                ..Default::default()
            },
        )
        .unwrap();
    engine.grant_permission("viewer", "posts", "read", false).unwrap();
    engine.grant_permission("editor", "posts", "update", false).unwrap();
    engine.assign_role("alice", "editor").unwrap();
    println!("   alice is an editor (inherits viewer)");

    // 3. Plain RBAC decision.
    println!("\n3. Checking RBAC permissions...");
    let read_decision = engine.check("alice", "posts", "read", CheckOptions::default());
    println!("   alice can read posts: {}", read_decision.allowed);
    let delete_decision = engine.check("alice", "posts", "delete", CheckOptions::default());
    println!("   alice can delete posts: {}", delete_decision.allowed);

    // 4. ABAC: allow authors to edit their own posts.
    println!("\n4. Adding an attribute-based rule...");
    engine.add_ability_rule(
        vec!["update".to_string()],
        vec!["Post".to_string()],
        authzen::AbilityRuleOptions {
            conditions: Some(authzen::Condition::leaf(
                "authorId",
                authzen::Operator::Eq,
                serde_json::json!("bob"),
            )),
            ..Default::default()
        },
    );
    let context = DecisionContext::new()
        .with_subject("bob")
        .with_resource("Post")
        .with_resource_attr("authorId", "bob");
    let own_post = engine.check(
        "bob",
        "posts",
        "update",
        CheckOptions {
            skip_cache: false,
            context: Some(context),
        },
    );
    println!("   bob can update his own post: {}", own_post.allowed);

    // 5. Temporary, one-time grant.
    println!("\n5. Granting a one-time export permission...");
    engine.grant_once_permission("carol", "reports", "export", None);
    let first = engine.check("carol", "reports", "export", CheckOptions::default());
    let second = engine.check("carol", "reports", "export", CheckOptions::default());
    println!("   first export check: {}, second: {}", first.allowed, second.allowed);

    // 6. Temporary role with an expiry.
    println!("\n6. Granting a temporary role...");
    engine.grant_temp_permission(
        "dave",
        "billing",
        "export",
        Utc::now() + chrono::Duration::hours(1),
        authzen::TemporaryGrantOptions::default(),
    );
    let dave_decision = engine.check("dave", "billing", "export", CheckOptions::default());
    println!("   dave can export billing for the next hour: {}", dave_decision.allowed);

    // 7. Performance and cache visibility.
    println!("\n7. Inspecting engine stats...");
    let stats = engine.get_stats();
    println!(
        "   checks={} cache_hit_rate={:.1}%",
        stats.performance.total_checks,
        stats.cache.hit_rate() * 100.0
    );

    println!("\n{}", "=".repeat(60));
    println!("done");
}
