//! Parser integration tests
//!
//! Full documents in each supported layout, plus the error surface callers
//! see through `validate`.

use robust_patcher::config::load_from_str;
use robust_patcher::patch::{parse, AnchorScope, MatchMode, PatchAction, PatchParser};
use robust_patcher::service::validate;
use robust_patcher::{MatchDefaults, ParseError};

const MARKDOWN: &str = r#"### PATCH: Harden login
**Description:** Tighten validation and move helpers
**Author:** security
**Version:** 3.2
---

#### File: `app/src/Login.kt`
**Action:** replace
**Description:** reject empty passwords
**Options:**
- MATCH_MODE: semantic
- MATCH_PARAMETER_NAMES: yes
- MATCH_MODIFIERS: true

**Find:**
```kotlin
fun login(user: String, password: String): Boolean
```

**Replace with:**
```kotlin
fun login(user: String, password: String): Boolean {
    require(password.isNotEmpty())
    return auth.check(user, password)
}
```

---

#### File: `app/src/Login.kt`
**Action:** insert_after
**Options:**
- MATCH_MODE: regex
- CASE_SENSITIVE: false
- ANCHOR_SCOPE: class
- ANCHOR_MATCH_MODE: contains
- ANCHOR_SEARCH_DEPTH: 2

**Anchor:**
```
class LoginService
```
**After this:**
```
^import .*$
```
**Insert:**
```
import app.auth.Audit
```

---

#### File: `app/src/Helpers.kt` -> `app/src/util/Helpers.kt`
**Action:** move_file

---

#### File: `app/src/Legacy.kt`
**Action:** delete_file
"#;

#[test]
fn test_markdown_document_with_every_feature() {
    let doc = parse(MARKDOWN).unwrap();

    assert_eq!(doc.metadata.name, "Harden login");
    assert_eq!(doc.metadata.version, "3.2");
    assert_eq!(doc.files.len(), 4);

    let first = &doc.files[0];
    assert_eq!(first.description, "reject empty passwords");
    let PatchAction::Replace {
        find,
        replacement,
        options,
    } = &first.action
    else {
        panic!("expected replace, got {:?}", first.action);
    };
    assert_eq!(find, "fun login(user: String, password: String): Boolean");
    assert!(replacement.contains("\n    require(password.isNotEmpty())\n"));
    assert_eq!(options.mode, MatchMode::Semantic);
    assert!(options.match_parameter_names);
    assert!(options.match_modifiers);
    assert!(options.match_return_type);

    let second = doc.files[1].action.match_options().unwrap();
    assert_eq!(second.mode, MatchMode::Regex);
    assert!(!second.case_sensitive);
    let anchor = second.anchor.as_ref().unwrap();
    assert_eq!(anchor.anchor_text, "class LoginService");
    assert_eq!(anchor.scope, AnchorScope::Class);
    assert_eq!(anchor.match_mode, MatchMode::Contains);
    assert_eq!(anchor.search_depth, 2);

    assert_eq!(
        doc.files[2].action,
        PatchAction::MoveFile {
            destination: "app/src/util/Helpers.kt".into(),
            overwrite: false,
        }
    );
    assert_eq!(doc.files[3].action, PatchAction::DeleteFile);
}

#[test]
fn test_at_fence_document() {
    let doc = parse(
        "=== PATCH START ===\nNAME: at fences\nVERSION: 0.9\n--- FILE: a.txt ---\nACTION: insert_before\n@@ MARKER\nend\n@@\n@@ CONTENT\nmiddle\n\nmore\n@@\n--- FILE: b.txt ---\nACTION: create_file\n@@ CONTENT\nnew\n@@\n=== PATCH END ===\ntrailing text is ignored\n",
    )
    .unwrap();

    assert_eq!(doc.metadata.name, "at fences");
    assert_eq!(doc.metadata.version, "0.9");
    assert_eq!(doc.files.len(), 2);
    match &doc.files[0].action {
        PatchAction::InsertBefore { marker, content, .. } => {
            assert_eq!(marker, "end");
            assert_eq!(content, "middle\n\nmore");
        }
        other => panic!("unexpected action {other:?}"),
    }
    assert_eq!(
        doc.files[1].action,
        PatchAction::CreateFile {
            content: "new".into()
        }
    );
}

#[test]
fn test_config_defaults_apply_before_document_options() {
    let config = load_from_str("[defaults]\nmode = \"fuzzy\"\nfuzzy_threshold = 0.7\nanchor_search_depth = -1\n").unwrap();
    let parser = PatchParser::with_defaults(config.defaults);

    let doc = parser
        .parse("### PATCH: d\n---\n#### File: a\n**Action:** delete\n- FUZZY_THRESHOLD: 0.9\n**Anchor:**\n```\nfn main()\n```\n```\nx\n```\n")
        .unwrap();
    let options = doc.files[0].action.match_options().unwrap();
    assert_eq!(options.mode, MatchMode::Fuzzy);
    assert_eq!(options.fuzzy_threshold, 0.9);
    assert_eq!(options.anchor.as_ref().unwrap().search_depth, -1);
}

#[test]
fn test_anchor_regex_is_validated() {
    let err = parse(
        "### PATCH: r\n---\n#### File: a\n**Action:** delete\n- ANCHOR_MATCH_MODE: regex\n**Anchor:**\n```\nfn (\n```\n```\nx\n```\n",
    )
    .unwrap_err();
    assert!(matches!(err, ParseError::InvalidRegex { .. }));
}

#[test]
fn test_unknown_scope_and_depth() {
    let base = "### PATCH: s\n---\n#### File: a\n**Action:** delete\n**Anchor:**\n```\nfn main()\n```\n```\nx\n```\n";

    let err = parse(&format!("{base}- ANCHOR_SCOPE: module\n")).unwrap_err();
    assert_eq!(
        err,
        ParseError::UnknownScope {
            file: "a".into(),
            value: "module".into(),
        }
    );

    let err = parse(&format!("{base}- ANCHOR_SEARCH_DEPTH: -2\n")).unwrap_err();
    assert!(matches!(err, ParseError::InvalidOption { ref key, .. } if key == "ANCHOR_SEARCH_DEPTH"));

    let err = parse(&format!("{base}- TOKEN_WINDOW_SIZE: lots\n")).unwrap_err();
    assert!(matches!(err, ParseError::InvalidOption { ref key, .. } if key == "TOKEN_WINDOW_SIZE"));
}

#[test]
fn test_validate_reports_errors_without_io() {
    let report = validate(MARKDOWN, &MatchDefaults::default());
    assert!(report.valid);
    assert_eq!(report.file_count, Some(4));
    assert_eq!(report.metadata.unwrap().author, "security");

    let report = validate(
        "### PATCH: x\n---\n#### File: a.txt\n**Action:** insert_after\n**After this:**\n```\nmarker\n```\n",
        &MatchDefaults::default(),
    );
    assert!(!report.valid);
    assert_eq!(
        report.error.as_deref(),
        Some("Missing CONTENT block for insert_after action in `a.txt`")
    );
}
