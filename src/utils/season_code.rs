// src/utils/season_code.rs

use rand::Rng;
use rand::seq::IndexedRandom;
use regex::Regex;
use std::sync::LazyLock;

/// Characters allowed in code groups. 0/1/I/L/O are excluded so codes can be
/// read back over the phone without ambiguity.
pub const CODE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";

pub const CODE_PREFIX: &str = "PASS";

const GROUP_LEN: usize = 4;

static CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^PASS-[2-9A-HJKMNP-Z]{4}-[2-9A-HJKMNP-Z]{4}$").expect("valid code regex")
});

/// Uppercases and strips surrounding whitespace so user-typed codes compare
/// against the stored form.
pub fn normalize(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}

/// Checks the `PASS-XXXX-XXXX` shape without touching the database.
pub fn is_valid_format(code: &str) -> bool {
    CODE_PATTERN.is_match(code)
}

/// Generates a fresh code. Uniqueness is enforced by the database; callers
/// retry on collision.
pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut group = |rng: &mut R| -> String {
        (0..GROUP_LEN)
            .map(|_| {
                let c = CODE_ALPHABET
                    .choose(rng)
                    .copied()
                    .unwrap_or(b'X');
                c as char
            })
            .collect()
    };

    let first = group(rng);
    let second = group(rng);
    format!("{}-{}-{}", CODE_PREFIX, first, second)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_match_the_format() {
        let mut rng = rand::rng();
        for _ in 0..100 {
            let code = generate(&mut rng);
            assert!(is_valid_format(&code), "bad code: {}", code);
        }
    }

    #[test]
    fn normalize_uppercases_and_trims() {
        assert_eq!(normalize("  pass-ab2d-9xyz "), "PASS-AB2D-9XYZ");
    }

    #[test]
    fn rejects_wrong_prefix_and_shape() {
        assert!(!is_valid_format("GIFT-AB2D-9XYZ"));
        assert!(!is_valid_format("PASS-AB2D9XYZ"));
        assert!(!is_valid_format("PASS-AB2D-9XY"));
        assert!(!is_valid_format("PASS-AB2D-9XYZ-EXTRA"));
    }

    #[test]
    fn rejects_ambiguous_characters() {
        // 0, 1, I, L and O are not in the alphabet.
        assert!(!is_valid_format("PASS-AB0D-9XYZ"));
        assert!(!is_valid_format("PASS-AB1D-9XYZ"));
        assert!(!is_valid_format("PASS-ABID-9XYZ"));
        assert!(!is_valid_format("PASS-ABLD-9XYZ"));
        assert!(!is_valid_format("PASS-ABOD-9XYZ"));
    }
}
