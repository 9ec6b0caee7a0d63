//! Tokenizer for transfer expressions.

use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Symbol(char),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token in the source.
    pub offset: usize,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => name.clone(),
            TokenKind::Int(i) => i.to_string(),
            TokenKind::Float(f) => f.to_string(),
            TokenKind::Str(s) => format!("{:?}", s),
            TokenKind::Symbol(ch) => ch.to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

const SYMBOLS: &[char] = &['[', ']', '{', '}', '(', ')', ',', ':'];

pub fn tokenize(src: &str) -> Result<Vec<Token>, ExprError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let ch = bytes[pos] as char;
        if ch.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        let kind = if SYMBOLS.contains(&ch) {
            pos += 1;
            TokenKind::Symbol(ch)
        } else if ch == '"' {
            let (text, end) = read_string(src, pos)?;
            pos = end;
            TokenKind::Str(text)
        } else if ch == '-' || ch.is_ascii_digit() {
            let (kind, end) = read_number(src, pos)?;
            pos = end;
            kind
        } else if ch == '_' || ch.is_ascii_alphabetic() {
            while pos < bytes.len() && (bytes[pos] == b'_' || bytes[pos].is_ascii_alphanumeric()) {
                pos += 1;
            }
            ident_or_keyword(&src[start..pos])
        } else {
            let ch = src[pos..].chars().next().unwrap_or('?');
            return Err(ExprError::UnexpectedChar { ch, offset: pos });
        };
        tokens.push(Token { kind, offset: start });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        offset: bytes.len(),
    });
    Ok(tokens)
}

fn ident_or_keyword(word: &str) -> TokenKind {
    match word {
        "nan" => TokenKind::Float(f64::NAN),
        "inf" => TokenKind::Float(f64::INFINITY),
        other => TokenKind::Ident(other.to_string()),
    }
}

fn read_number(src: &str, start: usize) -> Result<(TokenKind, usize), ExprError> {
    let bytes = src.as_bytes();
    let mut pos = start;
    if bytes[pos] == b'-' {
        pos += 1;
        if src[pos..].starts_with("inf") {
            return Ok((TokenKind::Float(f64::NEG_INFINITY), pos + 3));
        }
    }

    let mut is_float = false;
    while pos < bytes.len() {
        match bytes[pos] {
            b'0'..=b'9' => {}
            b'.' => is_float = true,
            b'e' | b'E' => {
                is_float = true;
                if matches!(bytes.get(pos + 1), Some(b'-' | b'+')) {
                    pos += 1;
                }
            }
            _ => break,
        }
        pos += 1;
    }

    let text = &src[start..pos];
    let invalid = || ExprError::InvalidNumber {
        text: text.to_string(),
        offset: start,
    };
    let kind = if is_float {
        TokenKind::Float(text.parse().map_err(|_| invalid())?)
    } else {
        TokenKind::Int(text.parse().map_err(|_| invalid())?)
    };
    Ok((kind, pos))
}

/// Read a double-quoted Julia string literal starting at `start`.
/// Returns the unescaped text and the offset just past the closing quote.
fn read_string(src: &str, start: usize) -> Result<(String, usize), ExprError> {
    let bytes = src.as_bytes();
    let mut out: Vec<u8> = Vec::new();
    let mut pos = start + 1;

    loop {
        let Some(&b) = bytes.get(pos) else {
            return Err(ExprError::UnterminatedString { offset: start });
        };
        match b {
            b'"' => {
                pos += 1;
                break;
            }
            b'\\' => {
                pos = read_escape(src, pos, &mut out)?;
            }
            _ => {
                out.push(b);
                pos += 1;
            }
        }
    }

    String::from_utf8(out)
        .map(|text| (text, pos))
        .map_err(|_| ExprError::InvalidUtf8 { offset: start })
}

/// Decode the escape sequence at `pos` (which points at the backslash).
fn read_escape(src: &str, pos: usize, out: &mut Vec<u8>) -> Result<usize, ExprError> {
    let bytes = src.as_bytes();
    let invalid = || ExprError::InvalidEscape { offset: pos };
    let Some(&kind) = bytes.get(pos + 1) else {
        return Err(ExprError::UnterminatedString { offset: pos });
    };

    let simple = match kind {
        b'\\' => Some(b'\\'),
        b'"' => Some(b'"'),
        b'$' => Some(b'$'),
        b'\'' => Some(b'\''),
        b'n' => Some(b'\n'),
        b't' => Some(b'\t'),
        b'r' => Some(b'\r'),
        b'a' => Some(0x07),
        b'b' => Some(0x08),
        b'f' => Some(0x0c),
        b'v' => Some(0x0b),
        b'e' => Some(0x1b),
        _ => None,
    };
    if let Some(byte) = simple {
        out.push(byte);
        return Ok(pos + 2);
    }

    match kind {
        b'x' => {
            let (value, end) = read_digits(src, pos + 2, 16, 2).ok_or_else(invalid)?;
            out.push(value as u8);
            Ok(end)
        }
        b'u' | b'U' => {
            let max = if kind == b'u' { 4 } else { 8 };
            let (value, end) = read_digits(src, pos + 2, 16, max).ok_or_else(invalid)?;
            let ch = char::from_u32(value).ok_or_else(invalid)?;
            let mut buf = [0u8; 4];
            out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            Ok(end)
        }
        b'0'..=b'7' => {
            let (value, end) = read_digits(src, pos + 1, 8, 3).ok_or_else(invalid)?;
            let byte = u8::try_from(value).map_err(|_| invalid())?;
            out.push(byte);
            Ok(end)
        }
        _ => Err(invalid()),
    }
}

/// Read between one and `max` digits of the given radix.
fn read_digits(src: &str, start: usize, radix: u32, max: usize) -> Option<(u32, usize)> {
    let digits: String = src[start..]
        .chars()
        .take(max)
        .take_while(|c| c.is_digit(radix))
        .collect();
    if digits.is_empty() {
        return None;
    }
    let value = u32::from_str_radix(&digits, radix).ok()?;
    Some((value, start + digits.len()))
}

/// Unescape a complete Julia string literal such as the `text/plain` form
/// of a returned string.
pub fn unescape(literal: &str) -> Result<String, ExprError> {
    let literal = literal.trim();
    if !literal.starts_with('"') {
        return Err(ExprError::UnexpectedToken {
            found: literal.chars().take(20).collect(),
            expected: "string literal",
            offset: 0,
        });
    }
    let (text, end) = read_string(literal, 0)?;
    if end != literal.len() {
        return Err(ExprError::TrailingInput { offset: end });
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn numbers_and_keywords() {
        assert_eq!(
            kinds("[1, -2, 3.5e-1, -inf]"),
            vec![
                TokenKind::Symbol('['),
                TokenKind::Int(1),
                TokenKind::Symbol(','),
                TokenKind::Int(-2),
                TokenKind::Symbol(','),
                TokenKind::Float(0.35),
                TokenKind::Symbol(','),
                TokenKind::Float(f64::NEG_INFINITY),
                TokenKind::Symbol(']'),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn int64_min_lexes() {
        assert_eq!(kinds("-9223372036854775808")[0], TokenKind::Int(i64::MIN));
    }

    #[test]
    fn escapes() {
        assert_eq!(unescape(r#""a\"b\\c\$d\te\n""#).unwrap(), "a\"b\\c$d\te\n");
        assert_eq!(unescape(r#""\x41é\U1F600\101""#).unwrap(), "Aé😀A");
        assert_eq!(unescape(r#""\0""#).unwrap(), "\0");
    }

    #[test]
    fn bad_escape_reports_offset() {
        assert!(matches!(
            unescape(r#""ab\qc""#),
            Err(ExprError::InvalidEscape { offset: 3 })
        ));
    }

    #[test]
    fn unterminated_string() {
        assert!(matches!(
            tokenize("\"abc"),
            Err(ExprError::UnterminatedString { offset: 0 })
        ));
    }
}
