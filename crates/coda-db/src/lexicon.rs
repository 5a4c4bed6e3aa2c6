// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Lexical rules for names and string payloads.

/// Characters that may never appear inside names or nominals.
const RESERVED: &[char] = &['(', ')', '<', '>', ',', '"'];

fn is_graphical(ch: char) -> bool {
    ('\u{21}'..='\u{7e}').contains(&ch)
}

fn is_name_char(ch: char) -> bool {
    is_graphical(ch) && !RESERVED.contains(&ch)
}

/// Slot names look like `<name>`: at least one graphical, non-reserved
/// character between the angle brackets.
pub fn is_valid_farg_name(name: &str) -> bool {
    let Some(inner) = name
        .strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
    else {
        return false;
    };
    !inner.is_empty() && inner.chars().all(is_name_char)
}

/// Predicate vocabulary element names: one or more graphical, non-reserved
/// characters, no spaces.
pub fn is_valid_pred_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_name_char)
}

/// Matrix (column variable) names and nominals: graphical, non-reserved
/// characters or interior spaces.
pub fn is_valid_svar_name(name: &str) -> bool {
    if name.is_empty() || name.starts_with(' ') || name.ends_with(' ') {
        return false;
    }
    name.chars().all(|ch| ch == ' ' || is_name_char(ch))
}

/// Nominals share the matrix-name rules.
pub fn is_valid_nominal(value: &str) -> bool {
    is_valid_svar_name(value)
}

/// Quote strings: printable ASCII without a double quote.
pub fn is_valid_quote_string(value: &str) -> bool {
    value
        .chars()
        .all(|ch| ('\u{20}'..='\u{7e}').contains(&ch) && ch != '"')
}

/// Text strings: any ASCII except backspace.
pub fn is_valid_text_string(value: &str) -> bool {
    value.chars().all(|ch| ch.is_ascii() && ch != '\u{8}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn farg_names_need_brackets_and_content() {
        assert!(is_valid_farg_name("<val>"));
        assert!(is_valid_farg_name("<onset>"));
        assert!(!is_valid_farg_name("<>"));
        assert!(!is_valid_farg_name("val"));
        assert!(!is_valid_farg_name("<a b>"));
        assert!(!is_valid_farg_name("<a,b>"));
    }

    #[test]
    fn nominals_allow_interior_spaces_only() {
        assert!(is_valid_nominal("a_nominal"));
        assert!(is_valid_nominal("two words"));
        assert!(!is_valid_nominal(" leading"));
        assert!(!is_valid_nominal("trailing "));
        assert!(!is_valid_nominal(""));
        assert!(!is_valid_nominal("par(en"));
    }

    #[test]
    fn pred_names_reject_spaces() {
        assert!(is_valid_pred_name("pve0"));
        assert!(!is_valid_pred_name("pve 0"));
    }

    #[test]
    fn quote_and_text_strings() {
        assert!(is_valid_quote_string("q-string, with punctuation"));
        assert!(!is_valid_quote_string("has \"quote\""));
        assert!(!is_valid_quote_string("tab\there"));
        assert!(is_valid_text_string("tab\there \"ok\""));
        assert!(!is_valid_text_string("back\u{8}space"));
        assert!(!is_valid_text_string("caf\u{e9}"));
    }
}
