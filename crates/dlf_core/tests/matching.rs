use std::fs;
use std::path::PathBuf;

use dlf_core::core_api::{Engine, Session};
use dlf_core::filter::condition::Rarity;
use dlf_core::filter::FilterDocument;
use dlf_core::item::Item;
use dlf_core::matcher::{self, Evaluation, MatchOutcome};
use dlf_core::visibility::Visibility;

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn open_fixture() -> Session {
    let path = workspace_root().join("tests/fixtures/neversink_sample.filter");
    Engine::new()
        .open_path(&path)
        .unwrap_or_else(|e| panic!("failed to open {:?}: {}", path, e))
}

fn quicksilver() -> Item {
    Item::new()
        .with_class("Utility Flasks")
        .with_base_type("Quicksilver Flask")
        .with_rarity(Rarity::Normal)
        .with_item_level(70)
}

#[test]
fn high_quality_life_flask_passes_the_hide_rule() {
    let session = open_fixture();
    let item = Item::new().with_class("Life Flask").with_quality(25);
    let diagnostic = session.get_rule_matching_item(&item);
    let matched = diagnostic.matched.expect("expected a match");
    assert_eq!(matched.tier_tag.as_deref(), Some("life"));
    assert_eq!(matched.visibility, Visibility::Show);

    let low = Item::new().with_class("Life Flask").with_quality(10);
    let matched = session
        .get_rule_matching_item(&low)
        .matched
        .expect("expected a match");
    assert_eq!(matched.tier_tag.as_deref(), Some("lifelowquality"));
    assert_eq!(matched.visibility, Visibility::Hide);
}

#[test]
fn disabled_quicksilver_rule_no_longer_matches() {
    let mut session = open_fixture();
    let before = session.get_rule_matching_item(&quicksilver());
    assert_eq!(
        before.matched.as_ref().and_then(|m| m.tier_tag.as_deref()),
        Some("quicksilver")
    );
    // The leveling rule needs an area level the item does not have.
    assert_eq!(before.gaps.len(), 1);
    assert!(before.gaps[0].reason.contains("area level"));

    session
        .set_rule_visibility("flask", "quicksilver", Visibility::Disable)
        .expect("failed to disable");
    let after = session.get_rule_matching_item(&quicksilver());
    let matched = after.matched.expect("the catch-all rule still matches");
    assert_eq!(matched.tier_tag.as_deref(), Some("restex"));

    let document = session.document();
    let quicksilver_ref = document
        .find_by_tags("flask", "quicksilver")
        .expect("quicksilver rule");
    let rule = document.rule(quicksilver_ref).expect("rule");
    assert_eq!(matcher::evaluate_rule(rule, &quicksilver()), Evaluation::Fail);
}

#[test]
fn match_is_the_first_satisfying_rule() {
    let session = open_fixture();
    let document = session.document();
    let items = [
        quicksilver(),
        quicksilver().with_area_level(40),
        Item::new()
            .with_class("Stackable Currency")
            .with_base_type("Orb of Alchemy")
            .with_stack_size(3),
        Item::new()
            .with_class("Divination Cards")
            .with_base_type("The Wolf"),
        Item::new()
            .with_class("Body Armours")
            .with_base_type("Astral Plate")
            .with_rarity(Rarity::Unique),
        Item::new().with_class("Archnemesis Mod").with_base_type("Toxic"),
        Item::new().with_class("Amulets").with_rarity(Rarity::Rare),
    ];

    for item in &items {
        let report = matcher::match_item(document, item);
        let MatchOutcome::Matched(rule_ref) = report.outcome else {
            panic!("no match for {item:?}");
        };
        for earlier in &document.rules()[..rule_ref.index()] {
            assert_ne!(
                matcher::evaluate_rule(earlier, item),
                Evaluation::Pass,
                "rule at line {} also matches {item:?}",
                earlier.first_line()
            );
        }
        assert_eq!(
            matcher::evaluate_rule(&document.rules()[rule_ref.index()], item),
            Evaluation::Pass
        );
    }
}

#[test]
fn leveling_rule_applies_once_area_level_is_known() {
    let session = open_fixture();
    let diagnostic = session.get_rule_matching_item(&quicksilver().with_area_level(40));
    assert!(diagnostic.gaps.is_empty());
    assert_eq!(
        diagnostic.matched.and_then(|m| m.tier_tag),
        Some("flasks".to_string())
    );
}

#[test]
fn copied_item_text_is_matched() {
    let session = open_fixture();
    let text = "Item Class: Stackable Currency\nRarity: Currency\nOrb of Alchemy\n--------\nStack Size: 4/20\n--------\nUpgrades a normal item to rare\n";
    let diagnostic = session
        .get_rule_matching_item_text(text)
        .expect("failed to read item text");
    let matched = diagnostic.matched.expect("expected a match");
    assert_eq!(matched.type_tag.as_deref(), Some("currency"));
    assert_eq!(matched.tier_tag.as_deref(), Some("t3"));
    assert!(matched.text.starts_with("Show # %D5 $type->currency $tier->t3"));

    assert!(session.get_rule_matching_item_text("just words").is_err());
}

#[test]
fn hidden_tier_still_matches_as_hide() {
    let mut session = open_fixture();
    session
        .set_hide_div_cards_above_tier(2)
        .expect("failed to set threshold");
    let wolf = Item::new()
        .with_class("Divination Cards")
        .with_base_type("The Wolf");
    let matched = session
        .get_rule_matching_item(&wolf)
        .matched
        .expect("expected a match");
    assert_eq!(matched.tier_tag.as_deref(), Some("t3"));
    assert_eq!(matched.visibility, Visibility::Hide);
}

fn matched_tags(session: &Session, item: &Item) -> Option<(Option<String>, Option<String>, Visibility)> {
    session
        .get_rule_matching_item(item)
        .matched
        .map(|m| (m.type_tag, m.tier_tag, m.visibility))
}

#[test]
fn importing_leaves_every_match_unchanged() {
    let path = workspace_root().join("tests/fixtures/neversink_sample.filter");
    let text = fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read {:?}: {}", path, e));
    let mut doc = FilterDocument::parse(&text).expect("failed to parse fixture");
    doc.ensure_dlf_section().expect("failed to add DLF rules");
    let raw = Engine::new().open_text(&text).expect("raw");
    let imported = Engine::new()
        .open_text(&doc.to_text_modified())
        .expect("imported");

    let items = [
        quicksilver().with_quality(20),
        Item::new().with_class("Life Flask").with_base_type("Divine Life Flask").with_quality(20),
        Item::new().with_class("Skill Gems").with_base_type("Cleave").with_quality(20),
        Item::new().with_class("Stackable Currency").with_base_type("Chaos Orb").with_stack_size(1),
        Item::new().with_class("Stackable Currency").with_base_type("Scroll Fragment").with_stack_size(1),
        Item::new().with_class("Stackable Currency").with_base_type("Portal Scroll").with_stack_size(1),
        Item::new().with_class("Stackable Currency").with_base_type("Teal Oil"),
        Item::new().with_class("Divination Cards").with_base_type("The Wolf"),
        Item::new().with_base_type("Astral Plate").with_rarity(Rarity::Unique),
        Item::new().with_class("Maps").with_base_type("Cemetery Map").with_rarity(Rarity::Normal).with_map_tier(1),
        Item::new()
            .with_class("Body Armours")
            .with_base_type("Simple Robe")
            .with_rarity(Rarity::Normal)
            .with_size(2, 3)
            .with_sockets("R-G-B"),
        Item::new()
            .with_class("Rings")
            .with_base_type("Iron Ring")
            .with_rarity(Rarity::Rare)
            .with_identified(false)
            .with_item_level(70),
    ];
    for item in &items {
        assert_eq!(
            matched_tags(&imported, item),
            matched_tags(&raw, item),
            "{:?} matched differently after import",
            item.base_type
        );
    }
}
