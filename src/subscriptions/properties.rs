//! Parser for the flat `key=value` subscriptions file.
//!
//! The file uses the classic properties conventions: `#` and `!` comments,
//! `=`, `:` or whitespace as the key/value separator, backslash line
//! continuations and `\uXXXX` escapes.

use super::ConfigLoadError;
use std::collections::HashMap;
use std::str::Chars;

/// Parses properties text into a key/value map.
///
/// When a key appears more than once, the last occurrence wins.
///
/// # Returns
/// * `Ok(HashMap)` with every entry of the source
/// * `Err(ConfigLoadError::Parse)` if an escape sequence is malformed
pub fn parse(source: &str) -> Result<HashMap<String, String>, ConfigLoadError> {
    let mut entries = HashMap::new();
    let mut lines = source.lines().enumerate();

    while let Some((index, raw)) = lines.next() {
        let line_number = index + 1;
        let trimmed = raw.trim_start_matches(is_blank);
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let mut logical = trimmed.to_string();
        while has_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some((_, next)) => logical.push_str(next.trim_start_matches(is_blank)),
                None => break,
            }
        }

        let (key, value) = split_entry(&logical);
        let key = unescape(key, line_number)?;
        let value = unescape(value, line_number)?;
        entries.insert(key, value);
    }

    Ok(entries)
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t' || c == '\x0c'
}

/// A line continues when it ends with an odd number of backslashes.
fn has_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

/// Splits a logical line into its raw (still escaped) key and value.
fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = i;
                break;
            }
            c if is_blank(c) => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let rest = line[key_end..].trim_start_matches(is_blank);
    let rest = rest
        .strip_prefix(|c: char| c == '=' || c == ':')
        .unwrap_or(rest);
    (key, rest.trim_start_matches(is_blank))
}

fn unescape(raw: &str, line: usize) -> Result<String, ConfigLoadError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let unit = code_unit(&mut chars).map_err(|hex| ConfigLoadError::Parse {
                    line,
                    message: format!("malformed \\uxxxx encoding: \\u{}", hex),
                })?;
                out.push(decode_utf16_escape(unit, &mut chars));
            }
            Some(other) => out.push(other),
            None => {}
        }
    }

    Ok(out)
}

/// Reads the four hex digits of a `\uXXXX` escape. On failure returns the
/// characters that were consumed.
fn code_unit(chars: &mut Chars<'_>) -> Result<u32, String> {
    let hex: String = chars.by_ref().take(4).collect();
    if hex.len() != 4 || !hex.chars().all(|h| h.is_ascii_hexdigit()) {
        return Err(hex);
    }
    u32::from_str_radix(&hex, 16).map_err(|_| hex)
}

/// Turns a UTF-16 code unit into a char, consuming the trailing `\uXXXX`
/// escape when `unit` starts a surrogate pair. Unpaired surrogates become
/// U+FFFD.
fn decode_utf16_escape(unit: u32, chars: &mut Chars<'_>) -> char {
    if (0xD800..=0xDBFF).contains(&unit) {
        let mut ahead = chars.clone();
        if ahead.next() == Some('\\') && ahead.next() == Some('u') {
            if let Ok(low @ 0xDC00..=0xDFFF) = code_unit(&mut ahead) {
                *chars = ahead;
                let combined = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                return char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER);
            }
        }
    }
    char::from_u32(unit).unwrap_or(char::REPLACEMENT_CHARACTER)
}

/// Decodes ISO-8859-1 bytes, the traditional encoding of properties files.
/// Every byte maps to the code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
