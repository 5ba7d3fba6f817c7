mod changelog;
pub mod dlf_section;
pub mod edits;
mod engine;
mod error;
pub mod features;
mod profile;
mod types;
pub mod well_known_items;

pub use changelog::{ChangeLog, ChangeLogEntry};
pub use edits::Edit;
pub use engine::{Engine, Session};
pub use error::{CoreError, CoreErrorCode, ErrorCategory};
pub use features::TierFeature;
pub use profile::{
    DEFAULT_OUTPUT_FILTER_FILENAME, DEFAULT_PROFILE_NAME, GeneralConfig, Profile, ProfileConfig,
    ProfileStore,
};
pub use types::{
    BatchReport, ChaosRecipeStatus, CurrencyTier, FlaskVisibility, ImportMode, ImportReport,
    MatchDiagnostic, NamedTierEntry, ReplayReport, ReplayWarning, RgbSize, RuleMatch,
    StackThreshold, TierVisibilityEntry,
};
pub use well_known_items::ChaosRecipeSlot;
