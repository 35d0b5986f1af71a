//! Destination identifier formatting.

/// Suffix of individual-account identifiers.
pub const USER_SUFFIX: &str = "@s.whatsapp.net";

/// Suffix of group identifiers.
pub const GROUP_SUFFIX: &str = "@g.us";

/// Turn a phone number into an individual destination identifier.
///
/// Already-formatted identifiers pass through unchanged; otherwise every
/// non-digit is stripped (`+55 (34) 9665-1771` -> `553496651771@s.whatsapp.net`).
pub fn format_phone(phone: &str) -> String {
    if phone.ends_with(USER_SUFFIX) {
        return phone.to_string();
    }
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    format!("{digits}{USER_SUFFIX}")
}

/// Turn a group id into a group destination identifier.
///
/// Group ids keep digits and `-` (`120363-0421` style creator-timestamp ids).
pub fn format_group(group: &str) -> String {
    if group.ends_with(GROUP_SUFFIX) {
        return group.to_string();
    }
    let kept: String = group
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    format!("{kept}{GROUP_SUFFIX}")
}

/// Format `target` as a group or individual identifier.
pub fn format_destination(target: &str, is_group: bool) -> String {
    if is_group {
        format_group(target)
    } else {
        format_phone(target)
    }
}
