//! Rules for the per-user classification option set.

use crate::classifier::NONE_LABEL;

pub const DEFAULT_OPTIONS: [&str; 4] = ["Driver License", "Passport", "Invoice", "Contract"];

/// Categories offered to the classifier for a user.
///
/// No options: the defaults. Fewer than `min_custom`: the user's options
/// followed by every default not already present. Otherwise the user's
/// options unchanged.
pub fn candidate_categories(existing: &[String], defaults: &[String], min_custom: usize) -> Vec<String> {
    if existing.is_empty() {
        return defaults.to_vec();
    }
    let mut out = existing.to_vec();
    if existing.len() < min_custom {
        for d in defaults {
            if !out.contains(d) {
                out.push(d.clone());
            }
        }
    }
    out
}

/// Confirmed labels join the option set unless they are the sentinel.
pub fn should_register(label: &str) -> bool {
    !label.trim().is_empty() && !label.trim().eq_ignore_ascii_case(NONE_LABEL)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Vec<String> {
        DEFAULT_OPTIONS.iter().map(|s| s.to_string()).collect()
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_options_uses_defaults() {
        assert_eq!(candidate_categories(&[], &defaults(), 3), defaults());
    }

    #[test]
    fn few_options_are_padded_without_duplicates() {
        let got = candidate_categories(&names(&["Receipt", "Invoice"]), &defaults(), 3);
        assert_eq!(
            got,
            names(&["Receipt", "Invoice", "Driver License", "Passport", "Contract"])
        );
    }

    #[test]
    fn enough_options_are_used_as_is() {
        let mine = names(&["Receipt", "Payslip", "Bank Statement"]);
        assert_eq!(candidate_categories(&mine, &defaults(), 3), mine);
    }

    #[test]
    fn sentinel_is_never_registered() {
        assert!(!should_register("none"));
        assert!(!should_register("NONE"));
        assert!(!should_register(" None "));
        assert!(!should_register(""));
        assert!(should_register("Invoice"));
        assert!(should_register("None of the above"));
    }
}
