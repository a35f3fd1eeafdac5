use super::*;

// =============================================================================
// primitives
// =============================================================================

#[test]
fn email_accepts_common_addresses() {
    assert!(validate_email("a@b.com"));
    assert!(validate_email("first.last+tag@mail.example.org"));
}

#[test]
fn email_rejects_malformed() {
    for bad in ["", "plain", "@b.com", "a@", "a@b", "a@.com", "a@b.", "a b@c.com", "a@b@c.com"] {
        assert!(!validate_email(bad), "{bad:?} should be rejected");
    }
}

#[test]
fn password_rules() {
    assert!(validate_password("Secret123"));
    assert!(validate_password("Abcdefg1!"));
    assert!(!validate_password("Short1A"));
    assert!(!validate_password("alllower123"));
    assert!(!validate_password("ALLUPPER123"));
    assert!(!validate_password("NoDigitsHere"));
    assert!(!validate_password("Has Space1A"));
    assert!(!validate_password("Bad#Symbol1"));
}

#[test]
fn required_ignores_whitespace() {
    assert!(validate_required("x"));
    assert!(!validate_required(""));
    assert!(!validate_required("   \t"));
}

#[test]
fn length_bounds_are_inclusive_and_count_chars() {
    assert!(validate_min_length("abc", 3));
    assert!(!validate_min_length("ab", 3));
    assert!(validate_max_length("héllo", 5));
    assert!(!validate_max_length("héllo!", 5));
}

#[test]
fn phone_formats() {
    assert!(validate_phone("+1 (555) 123-4567"));
    assert!(validate_phone("5551234567"));
    assert!(!validate_phone("555-1234"));
    assert!(!validate_phone("555123456x"));
    assert!(!validate_phone("++15551234567"));
}

#[test]
fn url_requires_scheme() {
    assert!(validate_url("https://example.com/path?q=1"));
    assert!(!validate_url("example.com"));
    assert!(!validate_url(""));
}

// =============================================================================
// validate_field
// =============================================================================

#[test]
fn required_message_uses_field_name() {
    let rule = ValidationRule { required: true, email: true, ..ValidationRule::default() };
    assert_eq!(validate_field("  ", &rule, "Email").as_deref(), Some("Email is required"));
}

#[test]
fn empty_optional_value_skips_other_rules() {
    let rule = ValidationRule { email: true, min_length: Some(5), ..ValidationRule::default() };
    assert_eq!(validate_field("", &rule, "Email"), None);
}

#[test]
fn first_failing_rule_wins() {
    let rule = ValidationRule { email: true, min_length: Some(20), ..ValidationRule::default() };
    assert_eq!(
        validate_field("nope", &rule, "Email").as_deref(),
        Some("Please enter a valid email address")
    );
    assert_eq!(
        validate_field("a@b.com", &rule, "Email").as_deref(),
        Some("Email must be at least 20 characters")
    );
}

#[test]
fn max_length_message() {
    let rule = ValidationRule { max_length: Some(3), ..ValidationRule::default() };
    assert_eq!(validate_field("abcd", &rule, "Code").as_deref(), Some("Code must not exceed 3 characters"));
}

#[test]
fn custom_rule_and_fallback_message() {
    let rule = ValidationRule { custom: Some(|v: &str| v.starts_with('#')), ..ValidationRule::default() };
    assert_eq!(validate_field("red", &rule, "Color").as_deref(), Some("Color is invalid"));
    assert_eq!(validate_field("#f00", &rule, "Color"), None);

    let rule = ValidationRule { custom_message: Some("Use a hex color".into()), ..rule };
    assert_eq!(validate_field("red", &rule, "Color").as_deref(), Some("Use a hex color"));
}

#[test]
fn message_table() {
    assert_eq!(validation_message("Passwords", RuleKind::Match), "Passwords do not match");
    assert_eq!(validation_message("Phone", RuleKind::Phone), "Please enter a valid phone number");
    assert_eq!(validation_message("Site", RuleKind::Url), "Please enter a valid URL");
    assert!(validation_message("Password", RuleKind::Password).starts_with("Password must be at least 8"));
}
