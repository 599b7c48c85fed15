//! Per-source keyword specialisation.

use super::Profile;
use crate::models::SourceKind;

/// Keywords of a verification-profile run
pub const VERIFICATION_KEYWORDS: [&str; 2] = ["verification", "UVM"];

/// Query a broad digital library is sent instead of a bare "verification"
const SCOPED_VERIFICATION: &str = "digital verification";

/// Keyword actually sent to `source` for the human-facing `base` keyword.
///
/// Under the verification profile a bare `verification` is narrowed to
/// `digital verification` for the broad libraries, while DVCon keeps the
/// broad term. Keywords mentioning `uvm` or `digital` are never rewritten.
pub fn specialise_keyword(base: &str, source: SourceKind, profile: Profile) -> String {
    if profile != Profile::Verification {
        return base.to_string();
    }

    let normalized = base.trim().to_lowercase();
    if normalized.contains("uvm") || normalized.contains("digital") {
        return base.to_string();
    }

    if normalized == "verification" && source != SourceKind::Dvcon {
        return SCOPED_VERIFICATION.to_string();
    }
    base.to_string()
}
