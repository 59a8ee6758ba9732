use std::io::Write;

use hookabi_core::plugin::{CREATE_LOCAL_POST, LOCAL_COMMENT_BEFORE_CREATE};
use hookabi_core::{CommentForm, Field, PostForm};
use hookabi_host::{config, ConfigError, Guest, HostError, InProcessGuest, PluginHost};

fn write_rules(body: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(body.as_bytes()).unwrap();
    f
}

#[test]
fn rule_file_drives_the_guest() {
    let f = write_rules(
        r#"
disabled = ["metadata"]

[[hook]]
entry_point = "create_local_post"

[[hook.rule]]
when = { prefix = { field = "url", value = "http://" } }
then = { rewrite = { field = "url", value = "https://example.com/insecure" } }

[[hook.rule]]
when = { all = [
    { present = { field = "body" } },
    { contains = { field = "body", value = "casino" } },
] }
then = { reject = { message = "no gambling" } }
"#,
    );
    let c = config::load_file(f.path()).unwrap();
    let host = PluginHost::new(InProcessGuest::new(&c).unwrap());
    assert!(!host.guest().function_exists("metadata"));

    let mut form = PostForm::new("links");
    form.url = Field::Value("http://x.test".into());
    let out = host.hook_before(CREATE_LOCAL_POST, form).unwrap();
    assert_eq!(out.url, Field::Value("https://example.com/insecure".into()));

    let mut spam = PostForm::new("win big");
    spam.body = Field::Value("best casino in town".into());
    let err = host.hook_before(CREATE_LOCAL_POST, spam).unwrap_err();
    assert!(matches!(err, HostError::Failed { status: 1, .. }));
    assert_eq!(err.user_message(), "no gambling");

    // Comment hook untouched by the file keeps built-in rules.
    let comment = CommentForm {
        content: "foo".into(),
        post_id: 9,
        creator_id: Field::Absent,
        language_id: Field::Absent,
        parent_id: Field::Absent,
    };
    let out = host.hook_before(LOCAL_COMMENT_BEFORE_CREATE, comment).unwrap();
    assert_eq!(out.content, "bar");
}

#[test]
fn explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("hooks.toml");
    assert!(matches!(
        config::load(Some(&missing)),
        Err(ConfigError::Read { .. })
    ));
}

#[test]
fn malformed_file_names_its_path() {
    let f = write_rules("[[hook]]\nentry_point = 3\n");
    let err = config::load_file(f.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains(&f.path().display().to_string()));
}

#[test]
fn rewrite_in_after_hook_is_refused_at_build() {
    let f = write_rules(
        r#"
[[hook]]
entry_point = "after_create_local_post"

[[hook.rule]]
when = { equals = { field = "name", value = "x" } }
then = { rewrite = { value = "y" } }
"#,
    );
    let c = config::load_file(f.path()).unwrap();
    assert!(matches!(InProcessGuest::new(&c), Err(HostError::Build(_))));
}

#[test]
fn unknown_entry_point_in_file_is_refused() {
    let f = write_rules("[[hook]]\nentry_point = \"delete_everything\"\n");
    let c = config::load_file(f.path()).unwrap();
    assert!(matches!(InProcessGuest::new(&c), Err(HostError::Build(_))));
}
