//! The guest's export table: entry point names, default rules, and registry assembly.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{BuildError, RegistryError, RuleError};
use crate::forms::{Activity, CommentForm, Open, PostForm};
use crate::hook::{Hook, HookKind};
use crate::metadata::Metadata;
use crate::registry::Registry;
use crate::rules::{Condition, HookSubject, Rule, RuleSet};

pub const METADATA: &str = "metadata";
pub const CREATE_LOCAL_POST: &str = "create_local_post";
pub const API_BEFORE_CREATE_POST: &str = "api_before_create_post";
pub const BEFORE_CREATE_LOCAL_POST: &str = "before_create_local_post";
pub const AFTER_CREATE_LOCAL_POST: &str = "after_create_local_post";
pub const AFTER_UPDATE_LOCAL_POST: &str = "after_update_local_post";
pub const LOCAL_COMMENT_BEFORE_CREATE: &str = "local_comment_before_create";
pub const LOCAL_COMMENT_AFTER_CREATE: &str = "local_comment_after_create";
pub const BEFORE_RECEIVE_FEDERATED_POST: &str = "before_receive_federated_post";
pub const AFTER_RECEIVE_FEDERATED_POST: &str = "after_receive_federated_post";
pub const BEFORE_RECEIVE_FEDERATED_COMMENT: &str = "before_receive_federated_comment";
pub const AFTER_RECEIVE_FEDERATED_COMMENT: &str = "after_receive_federated_comment";
pub const ACTIVITY_RECEIVED: &str = "activity_received";

/// Every name this guest can export. Renaming one breaks hosts.
pub const ENTRY_POINTS: &[&str] = &[
    METADATA,
    CREATE_LOCAL_POST,
    API_BEFORE_CREATE_POST,
    BEFORE_CREATE_LOCAL_POST,
    AFTER_CREATE_LOCAL_POST,
    AFTER_UPDATE_LOCAL_POST,
    LOCAL_COMMENT_BEFORE_CREATE,
    LOCAL_COMMENT_AFTER_CREATE,
    BEFORE_RECEIVE_FEDERATED_POST,
    AFTER_RECEIVE_FEDERATED_POST,
    BEFORE_RECEIVE_FEDERATED_COMMENT,
    AFTER_RECEIVE_FEDERATED_COMMENT,
    ACTIVITY_RECEIVED,
];

/// Rules for one hook, as read from config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookRules {
    pub entry_point: String,
    #[serde(default, rename = "rule")]
    pub rules: Vec<Rule>,
}

/// Guest configuration: rule overrides and disabled entry points.
///
/// A hook with no `[[hook]]` table keeps its built-in rules. Several tables
/// for the same hook are concatenated in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuestConfig {
    #[serde(default, rename = "hook")]
    pub hooks: Vec<HookRules>,
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl GuestConfig {
    /// Configured rules for `entry_point`, or `None` when the config does not mention it.
    pub fn rules_for(&self, entry_point: &str) -> Option<RuleSet> {
        let mut found = false;
        let mut rules = Vec::new();
        for h in self.hooks.iter().filter(|h| h.entry_point == entry_point) {
            found = true;
            rules.extend(h.rules.iter().cloned());
        }
        found.then(|| RuleSet::new(rules))
    }

    pub fn is_disabled(&self, entry_point: &str) -> bool {
        self.disabled.iter().any(|d| d == entry_point)
    }
}

/// Built-in post rules.
pub fn default_post_rules() -> RuleSet {
    RuleSet::new(vec![
        Rule::rewrite(Condition::equals("name", "foobar"), "Hello plugin!").named("greet"),
        Rule::rewrite(Condition::equals("name", "foo"), "bar").named("foo_to_bar"),
        Rule::reject(Condition::equals("name", "blocked"), "blocked").named("block_name"),
        Rule::reject(
            Condition::equals("body", "plugin should block this"),
            "blocked by plugin",
        )
        .named("block_body"),
    ])
}

/// Built-in rules for the after-create post hook. Only rejections are allowed here.
pub fn default_after_post_rules() -> RuleSet {
    RuleSet::new(vec![Rule::reject(
        Condition::equals("body", "plugin should block this"),
        "blocked by plugin",
    )
    .named("block_body")])
}

/// Built-in comment rules.
pub fn default_comment_rules() -> RuleSet {
    RuleSet::new(vec![
        Rule::rewrite(Condition::equals("content", "foo"), "bar").named("foo_to_bar"),
        Rule::reject(
            Condition::contains("content", "plugin should block this"),
            "blocked by plugin",
        )
        .named("block_content"),
    ])
}

/// Built-in rules for comment after hooks.
pub fn default_after_comment_rules() -> RuleSet {
    RuleSet::new(vec![Rule::reject(
        Condition::contains("content", "plugin should block this"),
        "blocked by plugin",
    )
    .named("block_content")])
}

/// Built-in rules for received activities: none, every activity is accepted.
pub fn default_activity_rules() -> RuleSet {
    RuleSet::default()
}

/// Registry with built-in rules and every entry point enabled.
pub fn default_registry() -> Result<Registry, BuildError> {
    build_registry(&GuestConfig::default())
}

/// Assemble the registry from `config`.
pub fn build_registry(config: &GuestConfig) -> Result<Registry, BuildError> {
    for name in config
        .hooks
        .iter()
        .map(|h| h.entry_point.as_str())
        .chain(config.disabled.iter().map(String::as_str))
    {
        if !ENTRY_POINTS.iter().any(|e| *e == name) {
            return Err(RegistryError::UnknownEntryPoint(name.to_string()).into());
        }
    }
    if config.rules_for(METADATA).is_some() {
        return Err(BuildError::Rule {
            hook: METADATA.to_string(),
            source: RuleError::NotAHook(METADATA.to_string()),
        });
    }

    let mut registry = Registry::new();
    if config.is_disabled(METADATA) {
        debug!(entry_point = METADATA, "disabled");
    } else {
        registry.register(METADATA, Metadata)?;
    }
    use HookKind::{After, Before};
    register_hook::<PostForm>(&mut registry, config, CREATE_LOCAL_POST, Before, default_post_rules)?;
    register_hook::<Open<PostForm>>(&mut registry, config, API_BEFORE_CREATE_POST, Before, default_post_rules)?;
    register_hook::<PostForm>(&mut registry, config, BEFORE_CREATE_LOCAL_POST, Before, default_post_rules)?;
    register_hook::<PostForm>(&mut registry, config, AFTER_CREATE_LOCAL_POST, After, default_after_post_rules)?;
    register_hook::<PostForm>(&mut registry, config, AFTER_UPDATE_LOCAL_POST, After, default_after_post_rules)?;
    register_hook::<CommentForm>(&mut registry, config, LOCAL_COMMENT_BEFORE_CREATE, Before, default_comment_rules)?;
    register_hook::<CommentForm>(&mut registry, config, LOCAL_COMMENT_AFTER_CREATE, After, default_after_comment_rules)?;
    register_hook::<PostForm>(&mut registry, config, BEFORE_RECEIVE_FEDERATED_POST, Before, default_post_rules)?;
    register_hook::<PostForm>(&mut registry, config, AFTER_RECEIVE_FEDERATED_POST, After, default_after_post_rules)?;
    register_hook::<CommentForm>(&mut registry, config, BEFORE_RECEIVE_FEDERATED_COMMENT, Before, default_comment_rules)?;
    register_hook::<CommentForm>(&mut registry, config, AFTER_RECEIVE_FEDERATED_COMMENT, After, default_after_comment_rules)?;
    register_hook::<Open<Activity>>(&mut registry, config, ACTIVITY_RECEIVED, After, default_activity_rules)?;
    info!(entry_points = registry.len(), "guest registry ready");
    Ok(registry)
}

fn register_hook<T>(
    registry: &mut Registry,
    config: &GuestConfig,
    name: &str,
    kind: HookKind,
    defaults: fn() -> RuleSet,
) -> Result<(), BuildError>
where
    T: HookSubject + Serialize + serde::de::DeserializeOwned + 'static,
{
    if config.is_disabled(name) {
        debug!(entry_point = name, "disabled");
        return Ok(());
    }
    let rules = config.rules_for(name).unwrap_or_else(defaults);
    debug!(entry_point = name, rules = rules.len(), "hook rules loaded");
    let hook = Hook::<T>::new(name, kind, rules).map_err(|source| BuildError::Rule {
        hook: name.to_string(),
        source,
    })?;
    registry.register(name, hook)?;
    Ok(())
}
