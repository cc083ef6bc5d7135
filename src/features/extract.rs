//! Request → 7-dim raw feature vector. Pure and deterministic.

use super::{FeatureVector, RequestRecord, FEATURE_NAMES};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use unicode_properties::{GeneralCategory, UnicodeGeneralCategory};

/// Categorical method codes. Anything else shares GET's code.
pub const METHODS: [(&str, u8); 9] = [
    ("GET", 0),
    ("POST", 1),
    ("PUT", 2),
    ("DELETE", 3),
    ("HEAD", 4),
    ("OPTIONS", 5),
    ("CONNECT", 6),
    ("TRACE", 7),
    ("PATCH", 8),
];

static SCHEMA: OnceLock<String> = OnceLock::new();

/// Case-insensitive method code; unknown or empty methods fall back to GET (0).
pub fn method_index(method: &str) -> f32 {
    let upper = method.to_uppercase();
    METHODS
        .iter()
        .find(|(name, _)| *name == upper)
        .map(|(_, code)| *code as f32)
        .unwrap_or(0.0)
}

/// Decimal digits in any script (general category Nd). Fractions, roman
/// numerals and other numeric symbols do not count.
fn is_digit(c: char) -> bool {
    c.general_category() == GeneralCategory::DecimalNumber
}

fn count(s: &str, pred: impl Fn(char) -> bool) -> f32 {
    s.chars().filter(|c| pred(*c)).count() as f32
}

pub fn extract(record: &RequestRecord) -> FeatureVector {
    let url = record.url.as_str();
    let ua = record.user_agent.as_str();
    FeatureVector([
        method_index(&record.method),
        url.chars().count() as f32,
        count(url, |c| c == '/'),
        count(url, is_digit),
        count(url, |c| !c.is_alphanumeric()),
        ua.chars().count() as f32,
        count(ua, is_digit),
    ])
}

/// SHA-256 fingerprint of the feature layout and method table.
pub fn feature_schema() -> &'static str {
    SCHEMA.get_or_init(|| {
        let mut h = Sha256::new();
        for name in FEATURE_NAMES {
            h.update(name.as_bytes());
            h.update(b"\n");
        }
        for (name, code) in METHODS {
            h.update(format!("{}={}\n", name, code).as_bytes());
        }
        format!("{:x}", h.finalize())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

    #[test]
    fn root_request_features() {
        let fv = extract(&RequestRecord::new("/", "GET", CHROME));
        assert_eq!(&fv.0[..5], &[0.0, 1.0, 1.0, 0.0, 1.0]);
        assert!(fv.0[5] > 0.0);
        assert!(fv.0[6] > 0.0);
    }

    #[test]
    fn injection_request_counts_more_digits_and_specials() {
        let benign = extract(&RequestRecord::new("/", "GET", CHROME));
        let attack = extract(&RequestRecord::new(
            "/login?user=' OR 1=1",
            "GET",
            "sqlmap/1.5.2",
        ));
        assert_eq!(attack.0[3], 2.0);
        // / ? = ' space space =
        assert_eq!(attack.0[4], 7.0);
        assert!(attack.0[3] > benign.0[3]);
        assert!(attack.0[4] > benign.0[4]);
        assert_eq!(attack.0[5], 12.0);
        assert_eq!(attack.0[6], 3.0);
    }

    #[test]
    fn method_is_case_insensitive() {
        for m in ["get", "GET", "Get", "gEt"] {
            assert_eq!(method_index(m), 0.0);
        }
        for m in ["patch", "PATCH", "Patch"] {
            assert_eq!(method_index(m), 8.0);
        }
        assert_eq!(method_index("delete"), 3.0);
    }

    #[test]
    fn unknown_and_empty_methods_share_get_code() {
        assert_eq!(method_index("PROPFIND"), 0.0);
        assert_eq!(method_index(""), 0.0);
        assert_eq!(method_index(" GET"), 0.0);
    }

    #[test]
    fn extraction_is_bit_identical() {
        let r = RequestRecord::new("/p/%41%42?id=42&x=ü", "post", "curl/8.1.2 ٣");
        assert_eq!(extract(&r).to_bits(), extract(&r.clone()).to_bits());
    }

    #[test]
    fn counts_chars_not_bytes_and_does_not_decode() {
        let fv = extract(&RequestRecord::new("/é%20", "GET", "ü"));
        assert_eq!(fv.0[1], 5.0);
        // '/' and '%' are special, é is a letter, 2 and 0 are digits
        assert_eq!(fv.0[3], 2.0);
        assert_eq!(fv.0[4], 2.0);
        assert_eq!(fv.0[5], 1.0);
    }

    #[test]
    fn only_decimal_digits_count() {
        let fv = extract(&RequestRecord::new("/\u{bd}\u{216b}\u{3007}", "GET", "\u{bd}"));
        assert_eq!(fv.0[3], 0.0);
        assert_eq!(fv.0[6], 0.0);
        // Arabic-Indic and fullwidth digits are decimal digits
        let fv = extract(&RequestRecord::new("/\u{663}\u{ff17}", "GET", ""));
        assert_eq!(fv.0[3], 2.0);
    }

    #[test]
    fn empty_fields_are_zero() {
        let fv = extract(&RequestRecord::new("", "", ""));
        assert_eq!(fv.0, [0.0; 7]);
    }

    #[test]
    fn schema_is_stable_hex() {
        let s = feature_schema();
        assert_eq!(s.len(), 64);
        assert_eq!(s, feature_schema());
    }
}
