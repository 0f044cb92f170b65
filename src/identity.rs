//! Product identity resolution.
//!
//! The identity key is the dedup/merge key for a product: the same key is
//! used for in-pass deduplication during scroll convergence and for the
//! persisted-store lookup, so both sides must normalize identically.

/// Derives a stable identity key from platform-invariant attributes.
///
/// Case-, whitespace- and symbol-insensitive: `"Amul Milk"` / `"500 ml"`
/// and `"  amul   milk "` / `"500ML"` resolve to the same key, and a
/// unicode dash vs an ASCII hyphen cannot split one product into two.
/// Name and variant are squashed independently and joined with `-` so
/// the boundary between them stays unambiguous.
pub fn identity_key(name: &str, variant: &str) -> String {
    let name = squash(name);
    let variant = squash(variant);
    if variant.is_empty() {
        name
    } else {
        format!("{name}-{variant}")
    }
}

/// Lowercases and strips everything that is not alphanumeric.
fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatting_differences_resolve_to_one_key() {
        assert_eq!(
            identity_key("Amul Milk", "500 ml"),
            identity_key("  amul   milk ", "500ML"),
        );
    }

    #[test]
    fn unicode_dash_equals_ascii_hyphen() {
        assert_eq!(
            identity_key("Dairy – Fresh Milk", "1 L"),
            identity_key("Dairy - Fresh Milk", "1L"),
        );
    }

    #[test]
    fn variant_is_separated_from_name() {
        // Without a boundary, ("abc", "def") and ("abcd", "ef") would collide.
        assert_ne!(identity_key("abc", "def"), identity_key("abcd", "ef"));
    }

    #[test]
    fn empty_variant_yields_bare_name_key() {
        assert_eq!(identity_key("Amul Butter", ""), "amulbutter");
    }

    #[test]
    fn key_is_deterministic_across_calls() {
        let a = identity_key("Tata Salt (Iodised)", "1 kg");
        let b = identity_key("Tata Salt (Iodised)", "1 kg");
        assert_eq!(a, b);
    }
}
