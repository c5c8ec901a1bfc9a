//! Declarative field validation for request forms.
//!
//! A form lists its fields in declaration order, each with an ordered rule
//! set. Every field is checked independently and reports at most one
//! message: the first rule it violates. Messages come back in field order.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

/// A single constraint on a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Required,
    /// Required unless the named sibling field is non-empty.
    RequiredWithout(&'static str),
    /// Length ceiling for text, value ceiling for numbers.
    Max(u64),
    /// Length floor for text, value floor for numbers.
    Min(u64),
    Email,
    AlphaSpace,
    /// At least one uppercase, one lowercase, one digit and one special character.
    Password,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value<'a> {
    Text(&'a str),
    Number(u64),
}

impl Value<'_> {
    /// Only an empty string is absent; every number is a value.
    fn is_empty(&self) -> bool {
        matches!(self, Value::Text(s) if s.is_empty())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Field<'a> {
    pub name: &'static str,
    pub value: Value<'a>,
    pub rules: &'static [Rule],
}

impl<'a> Field<'a> {
    pub fn text(name: &'static str, value: &'a str, rules: &'static [Rule]) -> Self {
        Self {
            name,
            value: Value::Text(value),
            rules,
        }
    }

    pub fn number(name: &'static str, value: u64, rules: &'static [Rule]) -> Self {
        Self {
            name,
            value: Value::Number(value),
            rules,
        }
    }
}

/// Every message produced by one validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("validation failed: {}", errors.join("; "))]
pub struct ValidationErrors {
    pub errors: Vec<String>,
}

pub trait Validate {
    /// Fields in declaration order.
    fn fields(&self) -> Vec<Field<'_>>;

    fn validate(&self) -> Result<(), ValidationErrors> {
        validate_fields(&self.fields())
    }
}

pub fn validate_fields(fields: &[Field<'_>]) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();
    // (field, sibling) pairs already reported as missing together
    let mut missing_pairs: Vec<(&str, &str)> = Vec::new();

    for field in fields {
        let Some(rule) = first_violation(field, fields) else {
            continue;
        };
        if let Rule::RequiredWithout(other) = rule {
            if missing_pairs
                .iter()
                .any(|&(reported, sibling)| reported == other && sibling == field.name)
            {
                continue;
            }
            missing_pairs.push((field.name, other));
        }
        errors.push(message(field, rule));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors { errors })
    }
}

fn first_violation(field: &Field<'_>, siblings: &[Field<'_>]) -> Option<Rule> {
    let empty = field.value.is_empty();
    for &rule in field.rules {
        match rule {
            Rule::Required => {
                if empty {
                    return Some(rule);
                }
            }
            Rule::RequiredWithout(other) => {
                let other_present = siblings
                    .iter()
                    .any(|f| f.name == other && !f.value.is_empty());
                if empty && !other_present {
                    return Some(rule);
                }
            }
            // absent optional values skip the remaining rules
            _ if empty => return None,
            _ => {
                if !satisfies(rule, field.value) {
                    return Some(rule);
                }
            }
        }
    }
    None
}

fn satisfies(rule: Rule, value: Value<'_>) -> bool {
    match (rule, value) {
        (Rule::Required | Rule::RequiredWithout(_), _) => true,
        (Rule::Max(max), Value::Text(s)) => char_len(s) <= max,
        (Rule::Max(max), Value::Number(n)) => n <= max,
        (Rule::Min(min), Value::Text(s)) => char_len(s) >= min,
        (Rule::Min(min), Value::Number(n)) => n >= min,
        (Rule::Email, Value::Text(s)) => EMAIL_RE.is_match(s),
        (Rule::AlphaSpace, Value::Text(s)) => s.chars().all(|c| c.is_alphabetic() || c == ' '),
        (Rule::Password, Value::Text(s)) => is_strong_password(s),
        (Rule::Email | Rule::AlphaSpace | Rule::Password, Value::Number(_)) => false,
    }
}

fn char_len(s: &str) -> u64 {
    u64::try_from(s.chars().count()).unwrap_or(u64::MAX)
}

fn is_strong_password(s: &str) -> bool {
    s.chars().any(char::is_uppercase)
        && s.chars().any(char::is_lowercase)
        && s.chars().any(|c| c.is_ascii_digit())
        && s.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace())
}

fn message(field: &Field<'_>, rule: Rule) -> String {
    let name = field.name;
    match (rule, field.value) {
        (Rule::Required, _) => format!("{name} is a required field"),
        (Rule::RequiredWithout(other), _) => {
            format!("{name} is required when {other} is not present")
        }
        (Rule::Max(max), Value::Text(_)) => format!("{name} must be a maximum of {max} in length"),
        (Rule::Max(max), Value::Number(_)) => format!("{name} must be {max} or less"),
        (Rule::Min(min), Value::Text(_)) => format!("{name} must be at least {min} in length"),
        (Rule::Min(min), Value::Number(_)) => format!("{name} must be {min} or greater"),
        (Rule::Email, _) => format!("{name} must be a valid email address"),
        (Rule::AlphaSpace, _) => {
            format!("{name} can only contain alphabetic and space characters")
        }
        (Rule::Password, _) => format!(
            "{name} must contain at least one uppercase letter, one lowercase letter, one digit, and one special character"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Single {
        name: &'static str,
        value: &'static str,
        rules: &'static [Rule],
    }

    impl Validate for Single {
        fn fields(&self) -> Vec<Field<'_>> {
            vec![Field::text(self.name, self.value, self.rules)]
        }
    }

    fn single_error(form: Single) -> String {
        let err = form.validate().expect_err("validation should fail");
        assert_eq!(err.errors.len(), 1, "{:?}", err.errors);
        err.errors[0].clone()
    }

    #[test]
    fn rule_messages() {
        let cases = [
            (
                Single { name: "name", value: "", rules: &[Rule::Required] },
                "name is a required field",
            ),
            (
                Single { name: "name", value: "12345678", rules: &[Rule::Max(7)] },
                "name must be a maximum of 7 in length",
            ),
            (
                Single { name: "name", value: "Some Name 2", rules: &[Rule::AlphaSpace] },
                "name can only contain alphabetic and space characters",
            ),
            (
                Single { name: "password", value: "password", rules: &[Rule::Password] },
                "password must contain at least one uppercase letter, one lowercase letter, one digit, and one special character",
            ),
            (
                Single { name: "email", value: "not-an-email", rules: &[Rule::Email] },
                "email must be a valid email address",
            ),
        ];

        for (form, expected) in cases {
            assert_eq!(single_error(form), expected);
        }
    }

    #[test]
    fn first_failing_rule_wins_per_field() {
        let msg = single_error(Single {
            name: "name",
            value: "John 2 Doe Is A Very Long Name",
            rules: &[Rule::Required, Rule::AlphaSpace, Rule::Max(5)],
        });
        assert_eq!(msg, "name can only contain alphabetic and space characters");
    }

    #[test]
    fn max_counts_characters_not_bytes() {
        let form = Single { name: "name", value: "Zoë", rules: &[Rule::Max(3)] };
        assert!(form.validate().is_ok());
    }

    #[test]
    fn strong_password_passes() {
        let form = Single {
            name: "password",
            value: "Passw0rd!",
            rules: &[Rule::Required, Rule::Password, Rule::Max(255)],
        };
        assert!(form.validate().is_ok());
    }

    #[test]
    fn every_field_reported_in_declaration_order() {
        let fields = [
            Field::text("name", "R2D2", &[Rule::Required, Rule::AlphaSpace]),
            Field::text("email", "", &[Rule::Required, Rule::Email]),
            Field::text("password", "weak", &[Rule::Required, Rule::Password]),
        ];
        let err = validate_fields(&fields).unwrap_err();
        assert_eq!(
            err.errors,
            vec![
                "name can only contain alphabetic and space characters",
                "email is a required field",
                "password must contain at least one uppercase letter, one lowercase letter, one digit, and one special character",
            ]
        );
    }

    #[test]
    fn required_without_pair_reports_once() {
        let fields = [
            Field::text("name", "", &[Rule::RequiredWithout("email"), Rule::AlphaSpace]),
            Field::text("email", "", &[Rule::RequiredWithout("name"), Rule::Email]),
        ];
        let err = validate_fields(&fields).unwrap_err();
        assert_eq!(err.errors, vec!["name is required when email is not present"]);
    }

    #[test]
    fn required_without_satisfied_by_sibling() {
        let fields = [
            Field::text("name", "", &[Rule::RequiredWithout("email"), Rule::AlphaSpace]),
            Field::text("email", "jane@example.com", &[Rule::RequiredWithout("name"), Rule::Email]),
        ];
        assert!(validate_fields(&fields).is_ok());
    }

    #[test]
    fn number_bounds() {
        let fields = [
            Field::number("page", 1, &[Rule::Min(1)]),
            Field::number("limit", 500, &[Rule::Min(1), Rule::Max(100)]),
        ];
        let err = validate_fields(&fields).unwrap_err();
        assert_eq!(err.errors, vec!["limit must be 100 or less"]);
    }

    #[test]
    fn zero_is_checked_against_min() {
        let fields = [Field::number("age", 0, &[Rule::Min(1)])];
        let err = validate_fields(&fields).unwrap_err();
        assert_eq!(err.errors, vec!["age must be 1 or greater"]);
    }

    #[test]
    fn error_display_joins_messages() {
        let err = ValidationErrors {
            errors: vec!["a is a required field".into(), "b is a required field".into()],
        };
        assert_eq!(
            err.to_string(),
            "validation failed: a is a required field; b is a required field"
        );
    }
}
