//! Vector literal codec.
//!
//! Converts between in-memory `f64` vectors and the textual literal format
//! the database's vector column type accepts: a bracketed comma-separated
//! list of decimals, e.g. `[0.1,2,3.5]`. No precision truncation is applied
//! in either direction.

use relvec_core::{Error, Result};

/// Encode a vector as a bracketed literal.
///
/// When `expected_dim` is given, the vector's length must match it; a
/// mismatch is a codec error naming both lengths.
pub fn encode_vector(vector: &[f64], expected_dim: Option<usize>) -> Result<String> {
    if let Some(dim) = expected_dim {
        if vector.len() != dim {
            return Err(Error::codec(format!(
                "vector has {} elements but the column expects dimension {dim}",
                vector.len()
            )));
        }
    }

    let elements: Vec<String> = vector.iter().map(|value| value.to_string()).collect();
    Ok(format!("[{}]", elements.join(",")))
}

/// Decode a bracketed literal into a vector.
///
/// `"[]"` decodes to the empty vector. Anything not shaped like
/// `[d1,d2,...]` with parseable decimals is a codec error.
pub fn decode_vector(text: &str) -> Result<Vec<f64>> {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| Error::codec(format!("malformed vector literal: {text:?}")))?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    inner
        .split(',')
        .map(|element| {
            element
                .trim()
                .parse::<f64>()
                .map_err(|_| Error::codec(format!("invalid vector element: {element:?}")))
        })
        .collect()
}

/// Option-lifting variant of [`encode_vector`]: absent input encodes to
/// absent output.
pub fn encode_vector_opt(
    vector: Option<&[f64]>,
    expected_dim: Option<usize>,
) -> Result<Option<String>> {
    vector.map(|v| encode_vector(v, expected_dim)).transpose()
}

/// Option-lifting variant of [`decode_vector`]: absent input decodes to
/// absent output.
pub fn decode_vector_opt(text: Option<&str>) -> Result<Option<Vec<f64>>> {
    text.map(decode_vector).transpose()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_basic() {
        assert_eq!(encode_vector(&[1.0, 2.5, 3.0], None).unwrap(), "[1,2.5,3]");
    }

    #[test]
    fn test_encode_empty() {
        assert_eq!(encode_vector(&[], None).unwrap(), "[]");
    }

    #[test]
    fn test_encode_dimension_check_passes() {
        assert!(encode_vector(&[1.0, 2.0, 3.0], Some(3)).is_ok());
    }

    #[test]
    fn test_encode_dimension_mismatch() {
        let err = encode_vector(&[1.0, 2.0, 3.0], Some(2)).unwrap_err();
        assert!(matches!(err, relvec_core::Error::Codec(_)));
        let msg = err.to_string();
        assert!(msg.contains('3') && msg.contains('2'));
    }

    #[test]
    fn test_decode_basic() {
        assert_eq!(
            decode_vector("[1.0,2.0,3.0]").unwrap(),
            vec![1.0, 2.0, 3.0]
        );
    }

    #[test]
    fn test_decode_tolerates_whitespace() {
        assert_eq!(
            decode_vector(" [1.0, 2.0, 3.0] ").unwrap(),
            vec![1.0, 2.0, 3.0]
        );
    }

    #[test]
    fn test_decode_empty_literal_is_empty_vector() {
        assert_eq!(decode_vector("[]").unwrap(), Vec::<f64>::new());
    }

    #[test]
    fn test_decode_missing_brackets() {
        assert!(decode_vector("1.0,2.0").is_err());
        assert!(decode_vector("[1.0,2.0").is_err());
        assert!(decode_vector("1.0,2.0]").is_err());
    }

    #[test]
    fn test_decode_bad_element() {
        assert!(decode_vector("[1.0,abc]").is_err());
    }

    #[test]
    fn test_roundtrip_preserves_precision() {
        let original = vec![0.1, -2.75, 1e-12, 12345.6789, f64::MIN_POSITIVE];
        let encoded = encode_vector(&original, Some(original.len())).unwrap();
        let decoded = decode_vector(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_opt_variants_pass_through_absent() {
        assert_eq!(encode_vector_opt(None, Some(3)).unwrap(), None);
        assert_eq!(decode_vector_opt(None).unwrap(), None);
        assert_eq!(
            decode_vector_opt(Some("[]")).unwrap(),
            Some(Vec::<f64>::new())
        );
    }
}
