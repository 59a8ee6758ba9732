//! Hook rules: ordered `(condition -> action)` pairs, first match wins.
//!
//! Rules deserialize from config as externally tagged tables, e.g. in TOML:
//!
//! ```text
//! [[hook.rule]]
//! when = { equals = { field = "name", value = "foo" } }
//! then = { rewrite = { value = "bar" } }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::RuleError;

/// Field access a hook needs from its working shape.
pub trait HookSubject {
    /// Every field the shape declares, or `None` for an open shape.
    const FIELDS: Option<&'static [&'static str]>;
    /// Fields that hold text and can be rewritten, or `None` for an open shape.
    const TEXT_FIELDS: Option<&'static [&'static str]>;

    /// String value of `field`. `None` when missing, null or not text.
    fn text(&self, field: &str) -> Option<&str>;
    /// Whether `field` is present on the wire (null counts as present).
    fn has(&self, field: &str) -> bool;
    /// Overwrite a text field. Returns false when the shape has no such text field.
    fn set_text(&mut self, field: &str, value: &str) -> bool;
}

/// Match condition over a working shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Equals { field: String, value: String },
    Contains { field: String, value: String },
    Prefix { field: String, value: String },
    Present { field: String },
    Absent { field: String },
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn equals(field: &str, value: &str) -> Self {
        Condition::Equals {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub fn contains(field: &str, value: &str) -> Self {
        Condition::Contains {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub fn matches<S: HookSubject>(&self, subject: &S) -> bool {
        match self {
            Condition::Equals { field, value } => subject.text(field) == Some(value.as_str()),
            Condition::Contains { field, value } => subject
                .text(field)
                .is_some_and(|t| t.contains(value.as_str())),
            Condition::Prefix { field, value } => subject
                .text(field)
                .is_some_and(|t| t.starts_with(value.as_str())),
            Condition::Present { field } => subject.has(field),
            Condition::Absent { field } => !subject.has(field),
            Condition::All(cs) => cs.iter().all(|c| c.matches(subject)),
            Condition::Any(cs) => cs.iter().any(|c| c.matches(subject)),
            Condition::Not(c) => !c.matches(subject),
        }
    }

    /// Field that triggered the match: the first leaf field, depth first.
    pub fn trigger_field(&self) -> Option<&str> {
        match self {
            Condition::Equals { field, .. }
            | Condition::Contains { field, .. }
            | Condition::Prefix { field, .. }
            | Condition::Present { field }
            | Condition::Absent { field } => Some(field.as_str()),
            Condition::All(cs) | Condition::Any(cs) => cs.iter().find_map(Condition::trigger_field),
            Condition::Not(c) => c.trigger_field(),
        }
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::Equals { field, .. }
            | Condition::Contains { field, .. }
            | Condition::Prefix { field, .. }
            | Condition::Present { field }
            | Condition::Absent { field } => out.push(field.as_str()),
            Condition::All(cs) | Condition::Any(cs) => {
                cs.iter().for_each(|c| c.collect_fields(out))
            }
            Condition::Not(c) => c.collect_fields(out),
        }
    }
}

/// What a matching rule does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Replace a text field. `field` defaults to the condition's trigger field.
    Rewrite {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        field: Option<String>,
        value: String,
    },
    /// Veto the action with a message for the host.
    Reject { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    /// Label used in logs; falls back to the rule's position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub when: Condition,
    pub then: Action,
}

impl Rule {
    pub fn rewrite(when: Condition, value: &str) -> Self {
        Rule {
            name: None,
            when,
            then: Action::Rewrite {
                field: None,
                value: value.to_string(),
            },
        }
    }

    pub fn reject(when: Condition, message: &str) -> Self {
        Rule {
            name: None,
            when,
            then: Action::Reject {
                message: message.to_string(),
            },
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Field a rewrite lands on: explicit target, else the trigger field.
    pub fn rewrite_target(&self) -> Option<&str> {
        match &self.then {
            Action::Rewrite { field: Some(f), .. } => Some(f.as_str()),
            Action::Rewrite { field: None, .. } => self.when.trigger_field(),
            Action::Reject { .. } => None,
        }
    }

    pub fn label(&self, index: usize) -> String {
        self.name.clone().unwrap_or_else(|| format!("#{index}"))
    }
}

/// Ordered rule list. Evaluation is top to bottom and stops at the first match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet(Vec<Rule>);

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self(rules)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_rewrites(&self) -> bool {
        self.0
            .iter()
            .any(|r| matches!(r.then, Action::Rewrite { .. }))
    }

    /// First rule whose condition holds, with its index.
    pub fn first_match<S: HookSubject>(&self, subject: &S) -> Option<(usize, &Rule)> {
        self.0.iter().enumerate().find(|(_, r)| r.when.matches(subject))
    }

    /// Check every rule against the shape `S`: fields exist, rewrite targets are text.
    pub fn validate_for<S: HookSubject>(&self) -> Result<(), RuleError> {
        for (index, rule) in self.0.iter().enumerate() {
            if let Some(known) = S::FIELDS {
                let mut fields = Vec::new();
                rule.when.collect_fields(&mut fields);
                if let Some(bad) = fields.into_iter().find(|f| !known.iter().any(|k| k == f)) {
                    return Err(RuleError::UnknownField {
                        index,
                        field: bad.to_string(),
                    });
                }
            }
            match &rule.then {
                Action::Rewrite { .. } => {
                    let target = rule
                        .rewrite_target()
                        .ok_or(RuleError::NoTargetField { index })?;
                    if let Some(text) = S::TEXT_FIELDS {
                        if !text.iter().any(|k| *k == target) {
                            return Err(RuleError::UnknownField {
                                index,
                                field: target.to_string(),
                            });
                        }
                    }
                }
                Action::Reject { message } if message.is_empty() => {
                    return Err(RuleError::EmptyMessage { index });
                }
                Action::Reject { .. } => {}
            }
        }
        Ok(())
    }
}

impl From<Vec<Rule>> for RuleSet {
    fn from(rules: Vec<Rule>) -> Self {
        Self(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DynamicForm;
    use crate::forms::PostForm;

    fn post(name: &str, body: Option<&str>) -> PostForm {
        let mut p = PostForm::new(name);
        if let Some(b) = body {
            p.body = crate::codec::Field::Value(b.to_string());
        }
        p
    }

    #[test]
    fn first_match_wins() {
        let rules = RuleSet::new(vec![
            Rule::rewrite(Condition::equals("name", "foo"), "bar"),
            Rule::reject(Condition::contains("name", "fo"), "blocked"),
        ]);
        let (i, r) = rules.first_match(&post("foo", None)).unwrap();
        assert_eq!(i, 0);
        assert!(matches!(r.then, Action::Rewrite { .. }));

        let (i, _) = rules.first_match(&post("fog", None)).unwrap();
        assert_eq!(i, 1);
        assert!(rules.first_match(&post("x", None)).is_none());
    }

    #[test]
    fn composite_conditions() {
        let c = Condition::All(vec![
            Condition::Present {
                field: "body".into(),
            },
            Condition::Not(Box::new(Condition::Prefix {
                field: "name".into(),
                value: "ok".into(),
            })),
        ]);
        assert!(c.matches(&post("x", Some("b"))));
        assert!(!c.matches(&post("okay", Some("b"))));
        assert!(!c.matches(&post("x", None)));

        let any = Condition::Any(vec![
            Condition::Absent {
                field: "body".into(),
            },
            Condition::equals("name", "y"),
        ]);
        assert!(any.matches(&post("x", None)));
        assert!(any.matches(&post("y", Some("b"))));
        assert!(!any.matches(&post("x", Some("b"))));
    }

    #[test]
    fn non_text_fields_never_match_text_conditions() {
        let f: DynamicForm =
            crate::codec::decode(br#"{"name":"a","community_id":1}"#).unwrap();
        assert!(!Condition::equals("community_id", "1").matches(&f));
        assert!(Condition::Present {
            field: "community_id".into()
        }
        .matches(&f));
    }

    #[test]
    fn trigger_field_is_first_leaf() {
        let c = Condition::Any(vec![
            Condition::Not(Box::new(Condition::equals("body", "x"))),
            Condition::equals("name", "y"),
        ]);
        assert_eq!(c.trigger_field(), Some("body"));
        assert_eq!(Condition::All(vec![]).trigger_field(), None);
    }

    #[test]
    fn validation_catches_bad_rules() {
        let unknown = RuleSet::new(vec![Rule::reject(Condition::equals("title", "x"), "no")]);
        assert_eq!(
            unknown.validate_for::<PostForm>(),
            Err(RuleError::UnknownField {
                index: 0,
                field: "title".into()
            })
        );

        let non_text = RuleSet::new(vec![Rule {
            name: None,
            when: Condition::equals("name", "x"),
            then: Action::Rewrite {
                field: Some("community_id".into()),
                value: "2".into(),
            },
        }]);
        assert!(matches!(
            non_text.validate_for::<PostForm>(),
            Err(RuleError::UnknownField { .. })
        ));

        let no_target = RuleSet::new(vec![Rule::rewrite(Condition::All(vec![]), "x")]);
        assert_eq!(
            no_target.validate_for::<DynamicForm>(),
            Err(RuleError::NoTargetField { index: 0 })
        );

        let empty_msg = RuleSet::new(vec![Rule::reject(Condition::equals("name", "x"), "")]);
        assert_eq!(
            empty_msg.validate_for::<PostForm>(),
            Err(RuleError::EmptyMessage { index: 0 })
        );

        // Open shapes accept any field name.
        let open = RuleSet::new(vec![Rule::rewrite(Condition::equals("title", "x"), "y")]);
        assert_eq!(open.validate_for::<DynamicForm>(), Ok(()));
    }

    #[test]
    fn rules_deserialize_from_tagged_json() {
        let rules: RuleSet = serde_json::from_str(
            r#"[
                {"name": "swap", "when": {"equals": {"field": "name", "value": "foo"}},
                 "then": {"rewrite": {"value": "bar"}}},
                {"when": {"any": [{"absent": {"field": "body"}}, {"not": {"present": {"field": "url"}}}]},
                 "then": {"reject": {"message": "need body"}}}
            ]"#,
        )
        .unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules.rules()[0].label(0), "swap");
        assert_eq!(rules.rules()[1].label(1), "#1");
        assert_eq!(rules.rules()[0].rewrite_target(), Some("name"));
    }
}
