//! Form field validators and the user-facing messages they produce.

#[cfg(test)]
#[path = "validate_test.rs"]
mod validate_test;

const PASSWORD_MIN_LEN: usize = 8;
const PASSWORD_SYMBOLS: &str = "@$!%*?&";
const PHONE_MIN_LEN: usize = 10;

/// `local@domain.tld`: one `@`, no whitespace, and a dot inside the domain.
#[must_use]
pub fn validate_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .char_indices()
            .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// At least eight characters drawn from letters, digits and `@$!%*?&`,
/// with at least one lowercase, one uppercase and one digit.
#[must_use]
pub fn validate_password(password: &str) -> bool {
    let allowed = |c: char| c.is_ascii_alphanumeric() || PASSWORD_SYMBOLS.contains(c);
    password.chars().count() >= PASSWORD_MIN_LEN
        && password.chars().all(allowed)
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

#[must_use]
pub fn validate_required(value: &str) -> bool {
    !value.trim().is_empty()
}

#[must_use]
pub fn validate_min_length(value: &str, min: usize) -> bool {
    value.chars().count() >= min
}

#[must_use]
pub fn validate_max_length(value: &str, max: usize) -> bool {
    value.chars().count() <= max
}

/// Optional leading `+`, then ten or more digits, spaces, dashes or parens.
#[must_use]
pub fn validate_phone(phone: &str) -> bool {
    let body = phone.strip_prefix('+').unwrap_or(phone);
    body.chars().count() >= PHONE_MIN_LEN
        && body
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_whitespace() || matches!(c, '-' | '(' | ')'))
}

/// Absolute URL with a scheme.
#[must_use]
pub fn validate_url(url: &str) -> bool {
    reqwest::Url::parse(url).is_ok()
}

// =============================================================================
// RULES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Required,
    Email,
    Password,
    MinLength(usize),
    MaxLength(usize),
    Phone,
    Url,
    Match,
}

#[must_use]
pub fn validation_message(field: &str, rule: RuleKind) -> String {
    match rule {
        RuleKind::Required => format!("{field} is required"),
        RuleKind::Email => "Please enter a valid email address".to_owned(),
        RuleKind::Password => {
            "Password must be at least 8 characters with uppercase, lowercase, and number".to_owned()
        }
        RuleKind::MinLength(n) => format!("{field} must be at least {n} characters"),
        RuleKind::MaxLength(n) => format!("{field} must not exceed {n} characters"),
        RuleKind::Phone => "Please enter a valid phone number".to_owned(),
        RuleKind::Url => "Please enter a valid URL".to_owned(),
        RuleKind::Match => format!("{field} do not match"),
    }
}

/// Checks applied to one field. Everything after `required` is skipped for
/// an empty value.
#[derive(Debug, Clone, Default)]
pub struct ValidationRule {
    pub required: bool,
    pub email: bool,
    pub password: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub phone: bool,
    pub url: bool,
    pub custom: Option<fn(&str) -> bool>,
    pub custom_message: Option<String>,
}

/// First failing rule's message, or `None` when the value passes.
#[must_use]
pub fn validate_field(value: &str, rule: &ValidationRule, field_name: &str) -> Option<String> {
    if rule.required && !validate_required(value) {
        return Some(validation_message(field_name, RuleKind::Required));
    }
    if value.is_empty() {
        return None;
    }

    let failed = if rule.email && !validate_email(value) {
        Some(RuleKind::Email)
    } else if rule.password && !validate_password(value) {
        Some(RuleKind::Password)
    } else if let Some(min) = rule.min_length.filter(|&n| n > 0 && !validate_min_length(value, n)) {
        Some(RuleKind::MinLength(min))
    } else if let Some(max) = rule.max_length.filter(|&n| n > 0 && !validate_max_length(value, n)) {
        Some(RuleKind::MaxLength(max))
    } else if rule.phone && !validate_phone(value) {
        Some(RuleKind::Phone)
    } else if rule.url && !validate_url(value) {
        Some(RuleKind::Url)
    } else {
        None
    };
    if let Some(kind) = failed {
        return Some(validation_message(field_name, kind));
    }

    match rule.custom {
        Some(check) if !check(value) => Some(
            rule.custom_message
                .clone()
                .unwrap_or_else(|| format!("{field_name} is invalid")),
        ),
        _ => None,
    }
}
