use std::fs;
use std::path::PathBuf;

use dlf_core::core_api::dlf_section::STACK_TYPE_TAG;
use dlf_core::core_api::{CoreErrorCode, Engine};
use dlf_core::filter::FilterDocument;
use dlf_core::filter::condition::ConditionKind;
use dlf_core::layout::BlockKind;
use dlf_core::visibility::Visibility;

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn fixture(name: &str) -> String {
    let path = workspace_root().join("tests/fixtures").join(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read {:?}: {}", path, e))
}

#[test]
fn untouched_filters_round_trip_byte_for_byte() {
    for name in [
        "neversink_sample.filter",
        "neversink_crlf_no_final_newline.filter",
    ] {
        let text = fixture(name);
        let doc = FilterDocument::parse(&text).expect("failed to parse fixture");
        assert!(doc.warnings().is_empty(), "{name}: {:?}", doc.warnings());
        assert_eq!(doc.to_text_modified(), text, "{name}");
        assert_eq!(doc.to_text_unmodified(), text, "{name}");
        assert!(!doc.is_modified());
        doc.layout().validate().expect("layout must tile the file");
    }
}

#[test]
fn fixture_rules_are_indexed_by_tags() {
    let doc = FilterDocument::parse(&fixture("neversink_sample.filter")).expect("failed to parse fixture");
    assert_eq!(doc.layout().rule_count(), doc.rules().len());
    assert!(
        doc.layout()
            .blocks
            .iter()
            .any(|b| b.kind == BlockKind::Comment)
    );

    let t3 = doc.find_by_tags("currency", "t3").expect("currency t3");
    let rule = doc.rule(t3).expect("rule");
    assert!(rule.has_member(ConditionKind::BaseType, "Orb of Alchemy"));
    assert_eq!(rule.visibility(), Visibility::Show);

    let essence = doc.find_by_tags("currency->essence", "t6").expect("essence t6");
    assert!(essence.index() > t3.index());
    assert_eq!(doc.rules_of_type("divination").len(), 6);

    let quicksilver = doc
        .find_by_predicate_in("flask", ConditionKind::BaseType, "quicksilver flask")
        .expect("quicksilver rule");
    assert_eq!(doc.rule(quicksilver).and_then(|r| r.tier_tag()), Some("quicksilver"));
}

#[test]
fn only_edited_lines_change() {
    let text = fixture("neversink_sample.filter");
    let mut session = Engine::new().open_text(&text).expect("failed to open filter");
    session
        .set_rule_visibility("divination", "t2", Visibility::Hide)
        .expect("failed to hide t2");

    let modified = session.to_text_modified();
    assert_ne!(modified, text);
    let changed: Vec<(&str, &str)> = text
        .lines()
        .zip(modified.lines())
        .filter(|(a, b)| a != b)
        .collect();
    assert_eq!(
        changed,
        vec![(
            "Show # $type->divination $tier->t2",
            "Hide # $type->divination $tier->t2"
        )]
    );
}

#[test]
fn disabling_comments_out_the_whole_rule() {
    let text = fixture("neversink_sample.filter");
    let mut session = Engine::new().open_text(&text).expect("failed to open filter");
    assert!(
        session
            .set_rule_visibility("flask", "quicksilver", Visibility::Disable)
            .expect("failed to disable")
    );
    let modified = session.to_text_modified();
    assert!(modified.contains(
        "#Show # %D4 $type->flask $tier->quicksilver\n#\tClass \"Utility Flasks\"\n#\tBaseType == \"Quicksilver Flask\"\n"
    ));

    // The disabled text parses back to a disabled rule with the same tags.
    let reparsed = FilterDocument::parse(&modified).expect("failed to reparse");
    let rule_ref = reparsed.find_by_tags("flask", "quicksilver").expect("quicksilver");
    assert_eq!(
        reparsed.rule(rule_ref).map(|r| r.visibility()),
        Some(Visibility::Disable)
    );

    session
        .set_rule_visibility("flask", "quicksilver", Visibility::Show)
        .expect("failed to re-enable");
    assert_eq!(session.to_text_modified(), text);
}

#[test]
fn unknown_tags_are_not_found() {
    let mut session = Engine::new()
        .open_text(&fixture("neversink_sample.filter"))
        .expect("failed to open filter");
    let err = session
        .set_rule_visibility("flask", "granite", Visibility::Disable)
        .unwrap_err();
    assert_eq!(err.code, CoreErrorCode::NotFound);
    assert!(session.changes().is_empty());
}

#[test]
fn dlf_section_keeps_crlf_and_missing_final_newline() {
    let text = fixture("neversink_crlf_no_final_newline.filter");
    let mut doc = FilterDocument::parse(&text).expect("failed to parse fixture");
    let added = doc.ensure_dlf_section().expect("failed to add section");
    assert!(added > 0);

    let modified = doc.to_text_modified();
    assert!(!modified.ends_with('\n'));
    assert!(!modified.replace("\r\n", "").contains('\n'));
    assert!(modified.ends_with(text.rsplit("\r\n").next().unwrap_or_default()));

    let reparsed = FilterDocument::parse(&modified).expect("failed to reparse");
    assert!(reparsed.warnings().is_empty(), "{:?}", reparsed.warnings());
    assert!(reparsed.has_dlf_section());
    let stack = reparsed.find_by_tags(STACK_TYPE_TAG, "t3").expect("stack t3");
    assert!(
        reparsed
            .rule(stack)
            .is_some_and(|r| r.has_member(ConditionKind::BaseType, "Chaos Orb"))
    );

    // Leading header comments stay above the inserted rules.
    assert!(modified.starts_with("#====="));
    let header_end = modified.find("# [[0000]]").expect("section banner");
    assert!(modified[..header_end].contains("# VERSION:  8.6.3"));
}
