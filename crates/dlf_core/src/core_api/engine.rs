use std::fs;
use std::path::Path;

use crate::filter::{FilterDocument, ParseWarning};
use crate::item::Item;
use crate::matcher;
use crate::visibility::Visibility;

use super::changelog::ChangeLog;
use super::dlf_section::{FLASK_BASE_TYPES_TIER, FLASK_HIGH_ILVL_TIER, FLASKS_TYPE_TAG, GEMS_TYPE_TAG};
use super::edits::{self, Edit};
use super::error::{CoreError, CoreErrorCode};
use super::features::{self, TierFeature};
use super::profile::{Profile, ProfileStore, write_atomically};
use super::types::{
    BatchReport, ChaosRecipeStatus, CurrencyTier, FlaskVisibility, ImportMode, ImportReport,
    MatchDiagnostic, NamedTierEntry, ReplayReport, RgbSize, RuleMatch, StackThreshold,
    TierVisibilityEntry,
};
use super::well_known_items::{ChaosRecipeSlot, FLASK_BASE_TYPES};

#[derive(Debug, Default, Clone, Copy)]
pub struct Engine;

/// A parsed filter plus the edits made to it, in change log form.
#[derive(Debug, Clone)]
pub struct Session {
    document: FilterDocument,
    changes: ChangeLog,
}

impl Engine {
    pub fn new() -> Self {
        Self
    }

    pub fn open_text(&self, text: &str) -> Result<Session, CoreError> {
        let document = FilterDocument::parse(text)?;
        Ok(Session::new(document, ChangeLog::new()))
    }

    pub fn open_path(&self, path: &Path) -> Result<Session, CoreError> {
        let text = read_filter(path)?;
        self.open_text(&text)
    }

    /// Open a profile's output filter with its change log attached.
    pub fn open_profile(&self, store: &ProfileStore, name: &str) -> Result<Session, CoreError> {
        let profile = store.load(name)?;
        let text = read_filter(&profile.config.output_filter_path())?;
        let document = FilterDocument::parse(&text)?;
        Ok(Session::new(document, profile.changes))
    }

    /// Build the profile's output filter from the downloaded one: parse, add
    /// the DLF rules, replay the change log, write.
    pub fn import_downloaded_filter(
        &self,
        store: &ProfileStore,
        name: &str,
        mode: ImportMode,
    ) -> Result<ImportReport, CoreError> {
        let profile = store.load(name)?;
        let output_path = profile.config.output_filter_path();

        if mode == ImportMode::OnlyIfMissing && output_path.is_file() {
            tracing::info!(profile = name, path = %output_path.display(), "output filter exists; import skipped");
            return Ok(ImportReport {
                imported: false,
                output_path,
                rule_count: 0,
                dlf_rules_added: 0,
                parse_warnings: 0,
                replay: ReplayReport::default(),
            });
        }

        let downloaded_path = profile.config.downloaded_filter_path();
        let text = read_filter(&downloaded_path)?;
        let mut document = FilterDocument::parse(&text)?;
        let dlf_rules_added = document.ensure_dlf_section()?;
        let replay = profile.changes.replay(&mut document);

        write_atomically(&output_path, document.to_text_modified().as_bytes())?;

        if profile.config.remove_downloaded_filter {
            fs::remove_file(&downloaded_path).map_err(|e| {
                CoreError::new(
                    CoreErrorCode::Io,
                    format!("failed to remove {}: {e}", downloaded_path.display()),
                )
            })?;
        }

        tracing::info!(
            profile = name,
            rules = document.rules().len(),
            dlf_rules_added,
            replayed = replay.applied,
            skipped = replay.warnings.len(),
            "imported downloaded filter"
        );

        Ok(ImportReport {
            imported: true,
            output_path,
            rule_count: document.rules().len(),
            dlf_rules_added,
            parse_warnings: document.warnings().len(),
            replay,
        })
    }

    /// Apply `edits` to a profile's output filter. Nothing is written unless
    /// every edit succeeds and at least one changed something.
    ///
    /// The change log is saved before the filter. If the filter cannot be
    /// written the previous log is saved back, so the filter never carries
    /// edits its log does not record.
    pub fn run_batch(
        &self,
        store: &ProfileStore,
        name: &str,
        edits: &[Edit],
    ) -> Result<BatchReport, CoreError> {
        let profile = store.load(name)?;
        let output_path = profile.config.output_filter_path();
        let text = read_filter(&output_path)?;
        let mut session = Session::new(FilterDocument::parse(&text)?, profile.changes.clone());

        let report = session.apply_batch(edits)?;
        if report.applied == 0 {
            return Ok(report);
        }

        let rendered = session.to_text_modified();
        let updated = Profile {
            changes: session.changes,
            ..profile.clone()
        };
        store.save(&updated)?;
        if let Err(e) = write_atomically(&output_path, rendered.as_bytes()) {
            if let Err(restore) = store.save(&profile) {
                tracing::warn!(
                    profile = name,
                    error = %restore,
                    "failed to restore change log after filter write failed"
                );
            }
            return Err(e);
        }
        Ok(report)
    }
}

fn read_filter(path: &Path) -> Result<String, CoreError> {
    fs::read_to_string(path).map_err(|e| {
        CoreError::new(
            CoreErrorCode::Io,
            format!("failed to read filter {}: {e}", path.display()),
        )
    })
}

impl Session {
    pub fn new(document: FilterDocument, changes: ChangeLog) -> Self {
        Self { document, changes }
    }

    pub fn document(&self) -> &FilterDocument {
        &self.document
    }

    pub fn changes(&self) -> &ChangeLog {
        &self.changes
    }

    pub fn warnings(&self) -> &[ParseWarning] {
        self.document.warnings()
    }

    pub fn to_text_unmodified(&self) -> String {
        self.document.to_text_unmodified()
    }

    pub fn to_text_modified(&self) -> String {
        self.document.to_text_modified()
    }

    /// Apply one edit and log it if the filter changed. Returns whether it
    /// did; a failed edit leaves both the filter and the log alone.
    pub fn apply(&mut self, edit: Edit) -> Result<bool, CoreError> {
        let changed = edit.apply(&mut self.document)?;
        if changed {
            let operation = edit.operation_name();
            let target = edit.target_key();
            let sequence = self.changes.record(edit);
            tracing::debug!(sequence, operation, %target, "applied edit");
        } else {
            tracing::debug!(operation = edit.operation_name(), target = %edit.target_key(), "edit is a no-op");
        }
        Ok(changed)
    }

    /// Apply `edits` in order against a scratch copy; the session only takes
    /// the result if all of them succeed.
    pub fn apply_batch(&mut self, edits: &[Edit]) -> Result<BatchReport, CoreError> {
        let mut scratch = self.clone();
        let mut report = BatchReport::default();
        for (index, edit) in edits.iter().enumerate() {
            match scratch.apply(edit.clone()) {
                Ok(true) => report.applied += 1,
                Ok(false) => report.unchanged += 1,
                Err(e) => {
                    return Err(CoreError::new(
                        e.code,
                        format!(
                            "batch aborted at edit {} ({}): {}",
                            index + 1,
                            edit.operation_name(),
                            e.message
                        ),
                    ));
                }
            }
        }
        *self = scratch;
        tracing::info!(applied = report.applied, unchanged = report.unchanged, "committed batch");
        Ok(report)
    }

    fn is_logged(&self, edit: &Edit) -> bool {
        self.changes
            .find(edit.operation_name(), &edit.target_key())
            .is_some()
    }

    // --- Rule visibility ---

    pub fn set_rule_visibility(
        &mut self,
        type_tag: &str,
        tier_tag: &str,
        visibility: Visibility,
    ) -> Result<bool, CoreError> {
        self.apply(Edit::SetRuleVisibility {
            type_tag: type_tag.to_string(),
            tier_tag: tier_tag.to_string(),
            visibility,
        })
    }

    pub fn get_rule_visibility(&self, type_tag: &str, tier_tag: &str) -> Result<Visibility, CoreError> {
        let rule_ref = self.document.find_by_tags(type_tag, tier_tag)?;
        Ok(self
            .document
            .rule(rule_ref)
            .map(|r| r.visibility())
            .unwrap_or(Visibility::Disable))
    }

    // --- Currency ---

    pub fn set_currency_to_tier(&mut self, currency: &str, tier: u32) -> Result<bool, CoreError> {
        self.apply(Edit::SetCurrencyToTier {
            currency: currency.to_string(),
            tier,
        })
    }

    /// Move a currency `delta` tiers; logged as the absolute tier it lands in.
    pub fn adjust_currency_tier(&mut self, currency: &str, delta: i32) -> Result<bool, CoreError> {
        let current = self.get_tier_of_currency(currency)?;
        let target = i64::from(current) + i64::from(delta);
        let max = TierFeature::Currency.spec().max_tier;
        if !(1..=i64::from(max)).contains(&target) {
            return Err(CoreError::new(
                CoreErrorCode::OutOfRange,
                format!("{currency} is tier {current}; tier {target} is outside 1..={max}"),
            ));
        }
        self.set_currency_to_tier(currency, target as u32)
    }

    pub fn get_tier_of_currency(&self, currency: &str) -> Result<u32, CoreError> {
        edits::currency_tier(&self.document, currency)
    }

    pub fn get_all_currency_tiers(&self) -> Vec<NamedTierEntry> {
        self.named_tiers(TierFeature::Currency, |name, tier| Edit::SetCurrencyToTier {
            currency: name.to_string(),
            tier,
        })
    }

    fn named_tiers(
        &self,
        feature: TierFeature,
        edit_for: impl Fn(&str, u32) -> Edit,
    ) -> Vec<NamedTierEntry> {
        features::members(&self.document, feature)
            .into_iter()
            .map(|(name, tier)| {
                let modified = self.is_logged(&edit_for(&name, tier));
                NamedTierEntry { name, tier, modified }
            })
            .collect()
    }

    pub fn set_currency_tier_min_visible_stack_size(
        &mut self,
        tier: CurrencyTier,
        threshold: StackThreshold,
    ) -> Result<bool, CoreError> {
        self.apply(Edit::SetCurrencyStackThreshold { tier, threshold })
    }

    pub fn get_currency_tier_min_visible_stack_size(
        &self,
        tier: CurrencyTier,
    ) -> Result<StackThreshold, CoreError> {
        edits::stack_threshold(&self.document, tier)
    }

    // --- Archnemesis ---

    pub fn set_archnemesis_mod_tier(&mut self, modifier: &str, tier: u32) -> Result<bool, CoreError> {
        self.apply(Edit::SetArchnemesisModTier {
            modifier: modifier.to_string(),
            tier,
        })
    }

    pub fn get_all_archnemesis_mod_tiers(&self) -> Vec<NamedTierEntry> {
        self.named_tiers(TierFeature::Archnemesis, |name, tier| {
            Edit::SetArchnemesisModTier {
                modifier: name.to_string(),
                tier,
            }
        })
    }

    // --- Hide tiers above ---

    pub fn set_hide_tiers_above(&mut self, feature: TierFeature, max_visible_tier: u32) -> Result<bool, CoreError> {
        self.apply(Edit::SetHideTiersAbove {
            feature,
            max_visible_tier,
        })
    }

    pub fn get_hide_tiers_above(&self, feature: TierFeature) -> Result<u32, CoreError> {
        features::visible_through(&self.document, feature)
    }

    pub fn get_all_tier_visibilities(
        &self,
        feature: TierFeature,
    ) -> Result<Vec<TierVisibilityEntry>, CoreError> {
        let threshold_logged = self.is_logged(&Edit::SetHideTiersAbove {
            feature,
            max_visible_tier: 0,
        });
        Ok(features::tier_visibilities(&self.document, feature)?
            .into_iter()
            .map(|(tier, visibility)| {
                let rule_logged = self.is_logged(&Edit::SetRuleVisibility {
                    type_tag: feature.type_tag().to_string(),
                    tier_tag: TierFeature::tier_tag(tier),
                    visibility,
                });
                TierVisibilityEntry {
                    tier,
                    visibility,
                    modified: threshold_logged || rule_logged,
                }
            })
            .collect())
    }

    pub fn set_hide_essences_above_tier(&mut self, tier: u32) -> Result<bool, CoreError> {
        self.set_hide_tiers_above(TierFeature::Essences, tier)
    }

    pub fn get_hide_essences_above_tier(&self) -> Result<u32, CoreError> {
        self.get_hide_tiers_above(TierFeature::Essences)
    }

    pub fn set_hide_div_cards_above_tier(&mut self, tier: u32) -> Result<bool, CoreError> {
        self.set_hide_tiers_above(TierFeature::DivinationCards, tier)
    }

    pub fn get_hide_div_cards_above_tier(&self) -> Result<u32, CoreError> {
        self.get_hide_tiers_above(TierFeature::DivinationCards)
    }

    pub fn set_hide_unique_items_above_tier(&mut self, tier: u32) -> Result<bool, CoreError> {
        self.set_hide_tiers_above(TierFeature::UniqueItems, tier)
    }

    pub fn get_hide_unique_items_above_tier(&self) -> Result<u32, CoreError> {
        self.get_hide_tiers_above(TierFeature::UniqueItems)
    }

    pub fn set_hide_unique_maps_above_tier(&mut self, tier: u32) -> Result<bool, CoreError> {
        self.set_hide_tiers_above(TierFeature::UniqueMaps, tier)
    }

    pub fn get_hide_unique_maps_above_tier(&self) -> Result<u32, CoreError> {
        self.get_hide_tiers_above(TierFeature::UniqueMaps)
    }

    pub fn get_all_essence_tier_visibilities(&self) -> Result<Vec<TierVisibilityEntry>, CoreError> {
        self.get_all_tier_visibilities(TierFeature::Essences)
    }

    pub fn get_all_div_card_tier_visibilities(&self) -> Result<Vec<TierVisibilityEntry>, CoreError> {
        self.get_all_tier_visibilities(TierFeature::DivinationCards)
    }

    pub fn get_all_unique_item_tier_visibilities(&self) -> Result<Vec<TierVisibilityEntry>, CoreError> {
        self.get_all_tier_visibilities(TierFeature::UniqueItems)
    }

    pub fn get_all_unique_map_tier_visibilities(&self) -> Result<Vec<TierVisibilityEntry>, CoreError> {
        self.get_all_tier_visibilities(TierFeature::UniqueMaps)
    }

    // --- Oils, quality, maps ---

    pub fn set_lowest_visible_oil(&mut self, oil: &str) -> Result<bool, CoreError> {
        self.apply(Edit::SetLowestVisibleOil {
            oil: oil.to_string(),
        })
    }

    pub fn get_lowest_visible_oil(&self) -> Result<&'static str, CoreError> {
        edits::lowest_visible_oil(&self.document)
    }

    pub fn set_gem_min_quality(&mut self, quality: u32) -> Result<bool, CoreError> {
        self.apply(Edit::SetGemMinQuality { quality })
    }

    pub fn get_gem_min_quality(&self) -> Result<u32, CoreError> {
        edits::min_quality(&self.document, GEMS_TYPE_TAG)
    }

    pub fn set_flask_min_quality(&mut self, quality: u32) -> Result<bool, CoreError> {
        self.apply(Edit::SetFlaskMinQuality { quality })
    }

    pub fn get_flask_min_quality(&self) -> Result<u32, CoreError> {
        edits::min_quality(&self.document, FLASKS_TYPE_TAG)
    }

    pub fn set_hide_maps_below_tier(&mut self, tier: u32) -> Result<bool, CoreError> {
        self.apply(Edit::SetHideMapsBelowTier { tier })
    }

    pub fn get_hide_maps_below_tier(&self) -> Result<u32, CoreError> {
        edits::hide_maps_below_tier(&self.document)
    }

    // --- Flasks ---

    pub fn set_flask_visibility(&mut self, base_type: &str, visible: bool) -> Result<bool, CoreError> {
        self.apply(Edit::SetFlaskVisibility {
            base_type: base_type.to_string(),
            visible,
        })
    }

    pub fn set_high_ilvl_flask_visibility(&mut self, base_type: &str, visible: bool) -> Result<bool, CoreError> {
        self.apply(Edit::SetHighIlvlFlaskVisibility {
            base_type: base_type.to_string(),
            visible,
        })
    }

    pub fn get_flask_visibility(&self, base_type: &str) -> Result<FlaskVisibility, CoreError> {
        let visible = edits::flask_visible(&self.document, FLASK_BASE_TYPES_TIER, base_type)?;
        let high_ilvl_visible = edits::flask_visible(&self.document, FLASK_HIGH_ILVL_TIER, base_type)?;
        let normal = Edit::SetFlaskVisibility {
            base_type: base_type.to_string(),
            visible,
        };
        let high = Edit::SetHighIlvlFlaskVisibility {
            base_type: base_type.to_string(),
            visible: high_ilvl_visible,
        };
        Ok(FlaskVisibility {
            base_type: base_type.to_string(),
            visible,
            high_ilvl_visible,
            modified: self.is_logged(&normal) || self.is_logged(&high),
        })
    }

    pub fn get_all_flask_visibilities(&self) -> Result<Vec<FlaskVisibility>, CoreError> {
        FLASK_BASE_TYPES
            .iter()
            .map(|base_type| self.get_flask_visibility(base_type))
            .collect()
    }

    // --- RGB, chaos recipe ---

    pub fn set_rgb_item_max_size(&mut self, size: RgbSize) -> Result<bool, CoreError> {
        self.apply(Edit::SetRgbItemMaxSize { size })
    }

    pub fn get_rgb_item_max_size(&self) -> Result<RgbSize, CoreError> {
        edits::rgb_item_max_size(&self.document)
    }

    pub fn set_chaos_recipe_enabled_for(&mut self, slot: ChaosRecipeSlot, enabled: bool) -> Result<bool, CoreError> {
        self.apply(Edit::SetChaosRecipeEnabled { slot, enabled })
    }

    pub fn is_chaos_recipe_enabled_for(&self, slot: ChaosRecipeSlot) -> Result<bool, CoreError> {
        edits::chaos_recipe_enabled(&self.document, slot)
    }

    pub fn get_all_chaos_recipe_statuses(&self) -> Result<Vec<ChaosRecipeStatus>, CoreError> {
        ChaosRecipeSlot::ALL
            .into_iter()
            .map(|slot| {
                let enabled = self.is_chaos_recipe_enabled_for(slot)?;
                Ok(ChaosRecipeStatus {
                    slot,
                    enabled,
                    modified: self.is_logged(&Edit::SetChaosRecipeEnabled { slot, enabled }),
                })
            })
            .collect()
    }

    // --- Matching ---

    pub fn get_rule_matching_item(&self, item: &Item) -> MatchDiagnostic {
        let report = matcher::match_item(&self.document, item);
        let matched = report.matched().and_then(|rule_ref| {
            self.document.rule(rule_ref).map(|rule| RuleMatch {
                rule_index: rule_ref.index(),
                line: rule.first_line(),
                type_tag: rule.type_tag().map(str::to_string),
                tier_tag: rule.tier_tag().map(str::to_string),
                visibility: rule.visibility(),
                text: rule.render(),
            })
        });
        MatchDiagnostic {
            matched,
            gaps: report.gaps,
        }
    }

    pub fn get_rule_matching_item_text(&self, item_text: &str) -> Result<MatchDiagnostic, CoreError> {
        let item = Item::from_item_text(item_text)?;
        Ok(self.get_rule_matching_item(&item))
    }
}
