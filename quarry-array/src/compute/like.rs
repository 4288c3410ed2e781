use arrow_buffer::BooleanBuffer;
use quarry_dtype::DType;
use quarry_error::{QuarryResult, quarry_bail};

use crate::arrays::BoolArray;
use crate::{Array, IntoArray};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(char),
    AnyChar,
    AnyString,
}

/// A compiled SQL `LIKE` pattern: `%` matches any run of characters, `_` exactly one, and
/// `\` escapes the next character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikePattern {
    tokens: Vec<Token>,
}

impl LikePattern {
    /// Compile a pattern. A trailing lone escape is an error.
    pub fn try_new(pattern: &str) -> QuarryResult<Self> {
        let mut tokens = Vec::new();
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            tokens.push(match c {
                '%' => {
                    if tokens.last() == Some(&Token::AnyString) {
                        continue;
                    }
                    Token::AnyString
                }
                '_' => Token::AnyChar,
                '\\' => match chars.next() {
                    Some(escaped) => Token::Literal(escaped),
                    None => quarry_bail!("LIKE pattern {:?} ends with an escape", pattern),
                },
                c => Token::Literal(c),
            });
        }
        Ok(Self { tokens })
    }

    /// Whether `value` matches the whole pattern.
    pub fn matches(&self, value: &str) -> bool {
        let chars: Vec<char> = value.chars().collect();
        let (mut t, mut c) = (0, 0);
        // Position to resume from after the most recent `%`.
        let mut backtrack: Option<(usize, usize)> = None;
        while c < chars.len() {
            match self.tokens.get(t) {
                Some(Token::AnyString) => {
                    backtrack = Some((t, c));
                    t += 1;
                    continue;
                }
                Some(Token::AnyChar) => {
                    t += 1;
                    c += 1;
                    continue;
                }
                Some(Token::Literal(l)) if *l == chars[c] => {
                    t += 1;
                    c += 1;
                    continue;
                }
                _ => {}
            }
            match backtrack {
                Some((bt, bc)) => {
                    backtrack = Some((bt, bc + 1));
                    t = bt + 1;
                    c = bc + 1;
                }
                None => return false,
            }
        }
        self.tokens[t..].iter().all(|tok| *tok == Token::AnyString)
    }
}

/// Match every string of a utf8 array against `pattern`. Nulls stay null.
pub fn like(array: &Array, pattern: &LikePattern) -> QuarryResult<Array> {
    let Array::VarBin(a) = array else {
        quarry_bail!(ComputeError: "LIKE expects strings, found {}", array.dtype());
    };
    if !matches!(a.dtype(), DType::Utf8(_)) {
        quarry_bail!(ComputeError: "LIKE expects strings, found {}", a.dtype());
    }
    let values: BooleanBuffer = (0..a.len())
        .map(|idx| {
            a.validity().is_valid(idx)
                && std::str::from_utf8(a.bytes_at(idx)).is_ok_and(|s| pattern.matches(s))
        })
        .collect();
    Ok(BoolArray::try_new(values, a.validity().clone())?.into_array())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::arrays::VarBinArray;

    #[rstest]
    #[case("abc", "abc", true)]
    #[case("a%", "abc", true)]
    #[case("%c", "abc", true)]
    #[case("%b%", "abc", true)]
    #[case("a_c", "abc", true)]
    #[case("a_c", "abbc", false)]
    #[case("a%c", "abbbc", true)]
    #[case("a%c", "abcd", false)]
    #[case("%", "", true)]
    #[case("_", "", false)]
    #[case("100\\%", "100%", true)]
    #[case("100\\%", "1000", false)]
    #[case("%aa%b", "aaab", true)]
    fn pattern_matching(#[case] pattern: &str, #[case] value: &str, #[case] expected: bool) {
        assert_eq!(LikePattern::try_new(pattern).unwrap().matches(value), expected);
    }

    #[test]
    fn like_keeps_nulls() {
        let array = VarBinArray::from_option_strs([Some("spark"), None, Some("duck")]).into_array();
        let result = like(&array, &LikePattern::try_new("%ar%").unwrap()).unwrap();
        let bools = result.as_bool().unwrap();
        assert!(bools.value(0));
        assert!(result.scalar_at(1).unwrap().is_null());
        assert!(!bools.value(2));
    }

    #[test]
    fn dangling_escape() {
        assert!(LikePattern::try_new("abc\\").is_err());
    }
}
