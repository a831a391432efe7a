use thiserror::Error;

/// Template byte that matches any buffer byte.
pub const WILDCARD: u8 = b'?';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeMismatch {
    #[error("buffer ({buffer} bytes) is longer than template ({template} bytes)")]
    TooLong { buffer: usize, template: usize },

    #[error("buffer does not match the template at any offset")]
    NoAlignment,
}

/// Checks `buffer` against `template` and returns the composed value.
///
/// The buffer is aligned at the first template offset where every
/// non-wildcard template byte equals the buffer byte beneath it. The result
/// is the template with the aligned wildcard positions taken from the
/// buffer. When both have the same length there is exactly one candidate
/// offset, so this is a plain position-by-position comparison.
pub fn compose(buffer: &[u8], template: &[u8], wildcard: u8) -> Result<Vec<u8>, ComposeMismatch> {
    if buffer.len() > template.len() {
        return Err(ComposeMismatch::TooLong {
            buffer: buffer.len(),
            template: template.len(),
        });
    }

    let offset = (0..=template.len() - buffer.len())
        .find(|&at| matches_at(buffer, &template[at..at + buffer.len()], wildcard))
        .ok_or(ComposeMismatch::NoAlignment)?;

    let mut composed = template.to_vec();
    for (i, &b) in buffer.iter().enumerate() {
        if composed[offset + i] == wildcard {
            composed[offset + i] = b;
        }
    }
    Ok(composed)
}

fn matches_at(buffer: &[u8], window: &[u8], wildcard: u8) -> bool {
    window
        .iter()
        .zip(buffer)
        .all(|(&t, &b)| t == wildcard || t == b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_length_exact() {
        assert_eq!(compose(b"abc", b"abc", WILDCARD).unwrap(), b"abc");
    }

    #[test]
    fn test_equal_length_wildcards_take_buffer_bytes() {
        assert_eq!(compose(b"abc", b"a?c", WILDCARD).unwrap(), b"abc");
        assert_eq!(compose(b"xyz", b"???", WILDCARD).unwrap(), b"xyz");
    }

    #[test]
    fn test_equal_length_mismatch() {
        assert_eq!(compose(b"abc", b"abd", WILDCARD), Err(ComposeMismatch::NoAlignment));
    }

    #[test]
    fn test_buffer_longer_than_template() {
        assert_eq!(
            compose(b"abcd", b"abc", WILDCARD),
            Err(ComposeMismatch::TooLong { buffer: 4, template: 3 })
        );
    }

    #[test]
    fn test_buffer_embedded_in_template() {
        assert_eq!(
            compose(b"testing", b"We are testing...", WILDCARD).unwrap(),
            b"We are testing..."
        );
    }

    #[test]
    fn test_wildcard_breaks_embedding() {
        assert_eq!(
            compose(b"testing", b"We are tes?ting...", WILDCARD),
            Err(ComposeMismatch::NoAlignment)
        );
    }

    #[test]
    fn test_embedded_wildcards_filled_outside_left_alone() {
        assert_eq!(compose(b"ab", b"<??>?", WILDCARD).unwrap(), b"<ab>?");
    }
}
