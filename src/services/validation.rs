//! Validation and sanitization for TabVault.
//!
//! Pure functions: URL allow/deny-list checks, credential stripping, domain
//! extraction and wildcard matching, and sanitizers for user-supplied text.
//! Nothing here touches storage or the live browser model.

use url::Url;

/// Schemes that are always rejected (script injection / file-system access).
const DENIED_SCHEMES: &[&str] = &["javascript", "data", "file", "vbscript", "about", "blob"];

/// Schemes a tab URL may use. Anything not listed is rejected even if it is
/// not explicitly denied — unknown protocols fail closed.
const ALLOWED_SCHEMES: &[&str] = &["http", "https", "tabvault"];

/// Substrings marking a form field as credential-like by name or id.
const SENSITIVE_NAME_PATTERNS: &[&str] = &[
    "password", "passwd", "pwd", "secret", "token", "auth",
    "cvv", "cvc", "card", "ccnum", "ssn", "pin", "otp",
];

/// Input types never captured.
const SENSITIVE_FIELD_TYPES: &[&str] = &["password", "hidden"];

/// Autocomplete values never captured.
const SENSITIVE_AUTOCOMPLETE: &[&str] = &[
    "current-password", "new-password", "one-time-code",
    "cc-number", "cc-csc", "cc-exp", "cc-exp-month", "cc-exp-year", "cc-name",
];

pub const NAME_MAX_LEN: usize = 100;
pub const DESCRIPTION_MAX_LEN: usize = 500;
pub const TAG_MAX_LEN: usize = 50;
pub const FOLDER_NAME_MAX_LEN: usize = 100;
pub const DEFAULT_MAX_TAGS: usize = 20;

/// Returns true when the string parses as a URL whose scheme is explicitly
/// allowed. Parse failures and unknown or denied schemes all reject.
pub fn is_valid_url(url: &str) -> bool {
    let parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(_) => return false,
    };
    let scheme = parsed.scheme().to_ascii_lowercase();
    if DENIED_SCHEMES.contains(&scheme.as_str()) {
        return false;
    }
    ALLOWED_SCHEMES.contains(&scheme.as_str())
}

/// Canonicalizes a URL for storage: `None` unless `is_valid_url`, with any
/// embedded basic-auth credentials stripped.
pub fn sanitize_url(url: &str) -> Option<String> {
    if !is_valid_url(url) {
        return None;
    }
    let mut parsed = Url::parse(url).ok()?;
    // set_username/set_password are rejected for non-authority URLs
    // (e.g. the internal scheme); those carry no credentials anyway.
    let _ = parsed.set_username("");
    let _ = parsed.set_password(None);
    Some(parsed.to_string())
}

/// Hostname of the URL, or the literal "unknown" when it cannot be
/// determined. Never panics.
pub fn extract_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Matches a URL's hostname against a pattern: exact, or a `*.` prefix that
/// matches the bare domain and every subdomain. Case-insensitive.
pub fn matches_domain_pattern(url: &str, pattern: &str) -> bool {
    let domain = extract_domain(url);
    if domain == "unknown" {
        return false;
    }
    let pattern = pattern.trim().to_ascii_lowercase();
    if let Some(base) = pattern.strip_prefix("*.") {
        domain == base || domain.ends_with(&format!(".{}", base))
    } else {
        domain == pattern
    }
}

/// Trims, strips control and markup characters, and length-caps a string.
fn clean_text(input: &str, max_len: usize) -> String {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '<' | '>'))
        .collect();
    cleaned.chars().take(max_len).collect::<String>().trim().to_string()
}

/// Session name sanitizer with a deterministic fallback for empty input.
pub fn sanitize_session_name(name: &str) -> String {
    let cleaned = clean_text(name, NAME_MAX_LEN);
    if cleaned.is_empty() {
        "Unnamed Session".to_string()
    } else {
        cleaned
    }
}

/// Description sanitizer. Empty input yields an empty string, not a fallback.
pub fn sanitize_description(description: &str) -> String {
    clean_text(description, DESCRIPTION_MAX_LEN)
}

/// Tag sanitizer: lowercased, trimmed, capped. Empty result means "drop".
pub fn sanitize_tag(tag: &str) -> String {
    clean_text(&tag.to_lowercase(), TAG_MAX_LEN)
}

/// Folder name sanitizer with a deterministic fallback for empty input.
pub fn sanitize_folder_name(name: &str) -> String {
    let cleaned = clean_text(name, FOLDER_NAME_MAX_LEN);
    if cleaned.is_empty() {
        "New Folder".to_string()
    } else {
        cleaned
    }
}

/// Caps the tag list, sanitizes each entry, drops empties, and deduplicates
/// preserving first-occurrence order.
pub fn sanitize_tags(tags: &[String], max_tags: usize) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();
    for tag in tags.iter().take(max_tags) {
        let cleaned = sanitize_tag(tag);
        if !cleaned.is_empty() && !result.contains(&cleaned) {
            result.push(cleaned);
        }
    }
    result
}

/// Heuristic check whether a form field must be excluded from capture, by
/// name/id substring, input type, or autocomplete attribute. Best-effort by
/// design: there is no guarantee of completeness.
pub fn is_sensitive_field(name_or_id: &str, field_type: &str, autocomplete: &str) -> bool {
    let field_type = field_type.to_ascii_lowercase();
    if SENSITIVE_FIELD_TYPES.contains(&field_type.as_str()) {
        return true;
    }
    let autocomplete = autocomplete.to_ascii_lowercase();
    if SENSITIVE_AUTOCOMPLETE.contains(&autocomplete.as_str()) {
        return true;
    }
    let name = name_or_id.to_ascii_lowercase();
    SENSITIVE_NAME_PATTERNS.iter().any(|pat| name.contains(pat))
}
