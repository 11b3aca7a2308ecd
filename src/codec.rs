//! Node name codec
//!
//! Facet values become node names in navigation trees. Characters that the
//! path grammar reserves are escaped as `_xHHHH_`; everything is NFC-normalized
//! first so that visually identical values share one branch.

use unicode_normalization::UnicodeNormalization;

fn is_reserved(c: char) -> bool {
    matches!(c, '/' | ':' | '[' | ']' | '*' | '|' | '{' | '}' | '\'' | '"') || c.is_whitespace() && c != ' '
}

/// Encode an arbitrary value into a legal node name.
pub fn encode_name(value: &str) -> String {
    let normalized: String = value.nfc().collect();
    let mut out = String::with_capacity(normalized.len());
    let chars: Vec<char> = normalized.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        let escape_literal = *c == '_' && looks_like_escape(&chars[i..]);
        let edge_space = *c == ' ' && (i == 0 || i == chars.len() - 1);
        if is_reserved(*c) || escape_literal || edge_space || (*c == '.' && is_dot_name(&normalized)) {
            out.push_str(&format!("_x{:04x}_", *c as u32));
        } else {
            out.push(*c);
        }
    }
    out
}

/// Reverse of [`encode_name`]. Unknown escape sequences are kept verbatim.
pub fn decode_name(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len());
    let mut i = 0;
    while i < chars.len() {
        if looks_like_escape(&chars[i..]) {
            let hex: String = chars[i + 2..i + 6].iter().collect();
            if let Some(c) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                out.push(c);
                i += 7;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

fn looks_like_escape(chars: &[char]) -> bool {
    chars.len() >= 7
        && chars[0] == '_'
        && chars[1] == 'x'
        && chars[2..6].iter().all(|c| c.is_ascii_hexdigit())
        && chars[6] == '_'
}

fn is_dot_name(value: &str) -> bool {
    value == "." || value == ".."
}
