//! Interception hooks: decode the host action, run the rules once, reply.
//!
//! One call makes exactly one transition out of `Received`:
//! `Approved` (no rule matched), `Mutated` (a rewrite rule fired) or
//! `Rejected` (a reject rule fired). There are no retries. A rewrite that
//! cannot be applied fails the call instead of falling through.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::codec::{self, Payload};
use crate::error::{CallError, RuleError};
use crate::registry::EntryPoint;
use crate::rules::{Action, HookSubject, RuleSet};

/// When the hook runs relative to the host action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// Runs before the action; may approve, rewrite or veto it.
    Before,
    /// Runs after the action; may only approve or report a failure.
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookState {
    Received,
    Evaluated,
    Approved,
    Mutated,
    Rejected,
}

/// Terminal result of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum HookOutcome<T> {
    Approved(T),
    Mutated(T),
    Rejected(String),
}

impl<T> HookOutcome<T> {
    pub fn state(&self) -> HookState {
        match self {
            HookOutcome::Approved(_) => HookState::Approved,
            HookOutcome::Mutated(_) => HookState::Mutated,
            HookOutcome::Rejected(_) => HookState::Rejected,
        }
    }
}

/// A hook entry point over working shape `T`.
pub struct Hook<T> {
    name: String,
    kind: HookKind,
    rules: RuleSet,
    shape: PhantomData<fn() -> T>,
}

impl<T: HookSubject> Hook<T> {
    /// Build a hook after checking `rules` against `T` and `kind`.
    pub fn new(name: &str, kind: HookKind, rules: RuleSet) -> Result<Self, RuleError> {
        if kind == HookKind::After {
            if let Some(index) = rules
                .rules()
                .iter()
                .position(|r| matches!(r.then, Action::Rewrite { .. }))
            {
                return Err(RuleError::RewriteInAfterHook {
                    hook: name.to_string(),
                    index,
                });
            }
        }
        rules.validate_for::<T>()?;
        Ok(Self {
            name: name.to_string(),
            kind,
            rules,
            shape: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> HookKind {
        self.kind
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Apply the rules to a received working shape.
    ///
    /// A matched rewrite whose target holds a non-text value fails the call;
    /// later rules are not consulted.
    pub fn evaluate(&self, mut subject: T) -> Result<HookOutcome<T>, CallError> {
        debug!(hook = %self.name, state = ?HookState::Received, "evaluating");
        let Some((index, rule)) = self.rules.first_match(&subject) else {
            debug!(hook = %self.name, state = ?HookState::Approved, "no rule matched");
            return Ok(HookOutcome::Approved(subject));
        };
        let label = rule.label(index);
        debug!(hook = %self.name, rule = %label, state = ?HookState::Evaluated, "rule matched");
        match &rule.then {
            Action::Reject { message } => {
                warn!(hook = %self.name, rule = %label, %message, "action rejected");
                Ok(HookOutcome::Rejected(message.clone()))
            }
            Action::Rewrite { value, .. } => {
                let target = rule.rewrite_target().unwrap_or_default();
                if !subject.set_text(target, value) {
                    warn!(hook = %self.name, rule = %label, field = target, "rewrite target is not text");
                    return Err(CallError::RewriteRefused {
                        rule: label,
                        field: target.to_string(),
                    });
                }
                info!(hook = %self.name, rule = %label, field = target, "action rewritten");
                Ok(HookOutcome::Mutated(subject))
            }
        }
    }
}

impl<T> EntryPoint for Hook<T>
where
    T: HookSubject + Serialize + DeserializeOwned,
{
    fn handle(&self, input: &[u8]) -> Result<Payload, CallError> {
        let subject: T = codec::decode(input)?;
        match self.evaluate(subject)? {
            HookOutcome::Approved(s) | HookOutcome::Mutated(s) => Ok(codec::encode(&s)?),
            HookOutcome::Rejected(message) => Err(CallError::Rejected(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{DynamicForm, Field};
    use crate::forms::PostForm;
    use crate::rules::{Condition, Rule};

    fn hook(kind: HookKind, rules: Vec<Rule>) -> Hook<PostForm> {
        Hook::new("test_hook", kind, RuleSet::new(rules)).unwrap()
    }

    #[test]
    fn approved_when_nothing_matches() {
        let h = hook(
            HookKind::Before,
            vec![Rule::reject(Condition::equals("name", "blocked"), "blocked")],
        );
        let out = h.evaluate(PostForm::new("fine")).unwrap();
        assert_eq!(out.state(), HookState::Approved);
        assert_eq!(out, HookOutcome::Approved(PostForm::new("fine")));
    }

    #[test]
    fn rewrite_touches_only_target() {
        let h = hook(
            HookKind::Before,
            vec![Rule::rewrite(Condition::equals("name", "foo"), "bar")],
        );
        let mut input = PostForm::new("foo");
        input.community_id = Field::Value(7);
        input.body = Field::Null;
        let HookOutcome::Mutated(out) = h.evaluate(input).unwrap() else {
            panic!("expected mutation");
        };
        assert_eq!(out.name, "bar");
        assert_eq!(out.community_id, Field::Value(7));
        assert_eq!(out.body, Field::Null);
    }

    #[test]
    fn rewrite_to_other_field() {
        let h = hook(
            HookKind::Before,
            vec![Rule {
                name: Some("tag".into()),
                when: Condition::contains("name", "[nsfw]"),
                then: Action::Rewrite {
                    field: Some("alt_text".into()),
                    value: "flagged".into(),
                },
            }],
        );
        let HookOutcome::Mutated(out) = h.evaluate(PostForm::new("pic [nsfw]")).unwrap() else {
            panic!("expected mutation");
        };
        assert_eq!(out.name, "pic [nsfw]");
        assert_eq!(out.alt_text, Field::Value("flagged".into()));
    }

    #[test]
    fn rule_order_decides_overlaps() {
        let rewrite_first = hook(
            HookKind::Before,
            vec![
                Rule::rewrite(Condition::equals("name", "foo"), "bar"),
                Rule::reject(Condition::equals("name", "foo"), "no foo"),
            ],
        );
        assert_eq!(
            rewrite_first.evaluate(PostForm::new("foo")).unwrap().state(),
            HookState::Mutated
        );

        let reject_first = hook(
            HookKind::Before,
            vec![
                Rule::reject(Condition::equals("name", "foo"), "no foo"),
                Rule::rewrite(Condition::equals("name", "foo"), "bar"),
            ],
        );
        assert_eq!(
            reject_first.evaluate(PostForm::new("foo")).unwrap(),
            HookOutcome::Rejected("no foo".into())
        );
    }

    #[test]
    fn after_hooks_cannot_rewrite() {
        let r = Hook::<PostForm>::new(
            "after_create_local_post",
            HookKind::After,
            RuleSet::new(vec![
                Rule::reject(Condition::equals("name", "x"), "no"),
                Rule::rewrite(Condition::equals("name", "foo"), "bar"),
            ]),
        );
        assert!(matches!(
            r,
            Err(RuleError::RewriteInAfterHook { index: 1, .. })
        ));

        let ok = hook(
            HookKind::After,
            vec![Rule::reject(Condition::equals("name", "x"), "no")],
        );
        assert_eq!(ok.kind(), HookKind::After);
    }

    #[test]
    fn handle_rejects_without_output() {
        let h = hook(
            HookKind::Before,
            vec![Rule::reject(
                Condition::equals("body", "plugin should block this"),
                "blocked by plugin",
            )],
        );
        let err = h
            .handle(br#"{"name":"x","body":"plugin should block this"}"#)
            .unwrap_err();
        assert_eq!(err.signal_message(), "blocked by plugin");
    }

    #[test]
    fn handle_reports_decode_errors() {
        let h = hook(HookKind::Before, vec![]);
        assert!(matches!(
            h.handle(br#"{"body":"no name"}"#),
            Err(CallError::Decode(_))
        ));
    }

    #[test]
    fn dynamic_hook_keeps_unknown_fields() {
        let h = Hook::<DynamicForm>::new(
            "api_before_create_post",
            HookKind::Before,
            RuleSet::new(vec![Rule::rewrite(Condition::equals("name", "foo"), "bar")]),
        )
        .unwrap();
        let out = h.handle(br#"{"name":"foo","extra":[1]}"#).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(v, serde_json::json!({"name": "bar", "extra": [1]}));
    }

    #[test]
    fn refused_rewrite_fails_instead_of_approving() {
        let h = Hook::<DynamicForm>::new(
            "api_before_create_post",
            HookKind::Before,
            RuleSet::new(vec![
                Rule {
                    name: Some("tag".into()),
                    when: Condition::Present {
                        field: "tags".into(),
                    },
                    then: Action::Rewrite {
                        field: None,
                        value: "x".into(),
                    },
                },
                Rule::reject(Condition::equals("name", "blocked"), "blocked"),
            ]),
        )
        .unwrap();
        let f: DynamicForm = codec::decode(br#"{"name":"blocked","tags":[1]}"#).unwrap();
        assert!(matches!(
            h.evaluate(f),
            Err(CallError::RewriteRefused { ref rule, ref field }) if rule == "tag" && field == "tags"
        ));
        let err = h.handle(br#"{"name":"blocked","tags":[1]}"#).unwrap_err();
        assert_eq!(err.signal_message(), "rule tag cannot rewrite `tags`: value is not text");
    }
}
