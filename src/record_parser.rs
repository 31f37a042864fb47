//! Instrument line decoding.
//!
//! This is the ingestion hot path: one call per input line, four numeric
//! fields per call. Fields are borrowed slices of the line, so decoding a
//! record allocates exactly once (the owned instrument name) and rejected
//! lines allocate nothing.

use smallvec::SmallVec;

use crate::pricing::types::InstrumentRecord;

/// Separator between the five fields of an instrument row.
const FIELD_SEPARATOR: char = ',';

/// Parse one numeric field.
///
/// Surrounding ASCII whitespace is tolerated; anything else trailing the
/// digits is a hard parse failure. Locale-independent.
#[inline(always)]
pub fn parse_price_field(field: &str) -> Option<f64> {
    let trimmed = field.trim_matches(|c: char| c.is_ascii_whitespace());
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Decode one raw input line of the shape `name,refTheo,refUp,delta,gamma`.
///
/// Returns `None` for anything that is not a record: wrong field count or an
/// unparseable numeric field. The split stops after the fourth separator, so
/// a separator inside the gamma field lands in that field's text and fails
/// its numeric parse; a separator inside the name shifts every field right.
/// Both are rejected, matching the format's inherent limitation.
pub fn decode_instrument(line: &str) -> Option<InstrumentRecord> {
    let fields: SmallVec<[&str; 5]> = line.splitn(5, FIELD_SEPARATOR).collect();
    if fields.len() != 5 {
        return None;
    }

    let ref_theo = parse_price_field(fields[1])?;
    let ref_up = parse_price_field(fields[2])?;
    let delta = parse_price_field(fields[3])?;
    let gamma = parse_price_field(fields[4])?;

    Some(InstrumentRecord::from_reference(
        fields[0].to_string(),
        ref_theo,
        ref_up,
        delta,
        gamma,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::types::UnderlyingStats;
    use proptest::prelude::*;

    #[test]
    fn test_parse_price_field_plain() {
        assert_eq!(parse_price_field("150.0"), Some(150.0));
        assert_eq!(parse_price_field("-0.5"), Some(-0.5));
        assert_eq!(parse_price_field("1e3"), Some(1000.0));
    }

    #[test]
    fn test_parse_price_field_surrounding_whitespace() {
        assert_eq!(parse_price_field(" 150.0 "), Some(150.0));
        assert_eq!(parse_price_field("\t0.25"), Some(0.25));
    }

    #[test]
    fn test_parse_price_field_rejects_garbage() {
        assert_eq!(parse_price_field("abc"), None);
        assert_eq!(parse_price_field("1.5x"), None);
        assert_eq!(parse_price_field("1.5 x"), None);
        assert_eq!(parse_price_field(""), None);
        assert_eq!(parse_price_field("   "), None);
    }

    #[test]
    fn test_decode_accepts_valid_line() {
        let record = decode_instrument("AAPL,100.0,150.0,0.5,0.01").expect("valid line");
        assert_eq!(record.name, "AAPL");
        // a = 100 - 0.5*150 + 0.5*0.01*150^2 = 137.5
        assert!((record.a - 137.5).abs() < 1e-12);
        assert!((record.b - (-1.0)).abs() < 1e-12);
        assert!((record.c - 0.005).abs() < 1e-12);
    }

    #[test]
    fn test_decode_rejects_too_few_fields() {
        assert!(decode_instrument("AAPL,100.0,150.0,0.5").is_none());
        assert!(decode_instrument("AAPL").is_none());
        assert!(decode_instrument("").is_none());
    }

    #[test]
    fn test_decode_rejects_unparseable_field() {
        assert!(decode_instrument("AAPL,100.0,abc,0.5,0.01").is_none());
        assert!(decode_instrument("AAPL,100.0,150.0,0.5,").is_none());
    }

    #[test]
    fn test_decode_rejects_extra_separator() {
        // The fifth separator lands in the gamma field and fails its parse.
        assert!(decode_instrument("AAPL,100.0,150.0,0.5,0.01,junk").is_none());
    }

    #[test]
    fn test_decode_tolerates_padded_fields() {
        let record = decode_instrument("MSFT, 100.0 ,150.0,\t0.5,0.01").expect("valid line");
        assert_eq!(record.name, "MSFT");
    }

    proptest! {
        #[test]
        fn prop_coefficients_reproduce_ref_theo(
            ref_theo in -1e5f64..1e5,
            ref_up in 1e-2f64..1e4,
            delta in -5.0f64..5.0,
            gamma in -0.1f64..0.1,
        ) {
            let line = format!("SYM,{},{},{},{}", ref_theo, ref_up, delta, gamma);
            let record = decode_instrument(&line).expect("generated line decodes");

            let reproduced = record.a + record.b * ref_up + record.c * ref_up * ref_up;
            let scale = 1.0
                + ref_theo.abs()
                + (delta * ref_up).abs()
                + (gamma * ref_up * ref_up).abs();
            prop_assert!((reproduced - ref_theo).abs() <= 1e-9 * scale);
        }

        #[test]
        fn prop_price_matches_explicit_quadratic(
            ref_theo in -1e5f64..1e5,
            ref_up in 1e-2f64..1e4,
            delta in -5.0f64..5.0,
            gamma in -0.1f64..0.1,
            mean in 1e-2f64..1e4,
        ) {
            let line = format!("SYM,{},{},{},{}", ref_theo, ref_up, delta, gamma);
            let record = decode_instrument(&line).expect("generated line decodes");

            // With mean_sq = mean^2 the reduced form must agree with the
            // explicit expansion around ref_up.
            let stats = UnderlyingStats { mean, mean_sq: mean * mean, samples: 1 };
            let price = record.price_at(stats);

            let shift = mean - ref_up;
            let explicit = ref_theo + delta * shift + 0.5 * gamma * shift * shift;

            let scale = 1.0
                + ref_theo.abs()
                + (delta * mean).abs()
                + (delta * ref_up).abs()
                + (gamma * mean * mean).abs()
                + (gamma * ref_up * ref_up).abs();
            prop_assert!((price - explicit).abs() <= 1e-9 * scale);
        }

        #[test]
        fn prop_formatted_price_round_trips(value in -1e9f64..1e9) {
            let text = format!("{}", value);
            prop_assert_eq!(parse_price_field(&text), Some(value));
        }
    }
}
