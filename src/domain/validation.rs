//! Form validation, one function per entity.
//!
//! Each validator takes the raw submitted strings and returns either a cleaned
//! value ready for persistence or the complete list of field errors, so a form
//! can be re-rendered with every problem shown at once.

use serde::Serialize;
use uuid::Uuid;

const REQUIRED: &str = "This field is required.";

pub const USERNAME_MAX_LEN: usize = 150;
pub const NAME_MAX_LEN: usize = 150;
pub const EMAIL_MAX_LEN: usize = 254;
pub const GROUP_TITLE_MAX_LEN: usize = 200;
pub const GROUP_SLUG_MAX_LEN: usize = 50;
pub const PASSWORD_MIN_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors {
    errors: Vec<FieldError>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn extend(&mut self, other: FieldErrors) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// Messages attached to `field`, in insertion order.
    pub fn for_field(&self, field: &str) -> Vec<String> {
        self.errors
            .iter()
            .filter(|error| error.field == field)
            .map(|error| error.message.clone())
            .collect()
    }

    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|error| error.field == field)
    }

    /// `Ok(value)` when no error has been recorded.
    pub fn finish<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for error in &self.errors {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "{}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDraft {
    pub text: String,
    pub group_id: Option<Uuid>,
}

/// Validate the text/group pair of the post form. Whether the group exists is
/// checked by the caller against storage.
pub fn validate_post(text: &str, group: Option<&str>) -> Result<PostDraft, FieldErrors> {
    let mut errors = FieldErrors::new();

    if text.trim().is_empty() {
        errors.push("text", REQUIRED);
    }

    let group_id = match group.map(str::trim).filter(|value| !value.is_empty()) {
        None => None,
        Some(raw) => match Uuid::parse_str(raw) {
            Ok(id) => Some(id),
            Err(_) => {
                errors.push("group", invalid_choice());
                None
            }
        },
    };

    errors.finish(PostDraft {
        text: text.to_string(),
        group_id,
    })
}

pub fn validate_comment(text: &str) -> Result<String, FieldErrors> {
    if text.trim().is_empty() {
        return Err(FieldErrors::single("text", REQUIRED));
    }
    Ok(text.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupDraft {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Debug, Clone, Default)]
pub struct SignupInput<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub password1: &'a str,
    pub password2: &'a str,
}

pub fn validate_signup(input: &SignupInput<'_>) -> Result<SignupDraft, FieldErrors> {
    let mut errors = FieldErrors::new();

    let username = input.username.trim();
    if username.is_empty() {
        errors.push("username", REQUIRED);
    } else if username.chars().count() > USERNAME_MAX_LEN {
        errors.push("username", too_long(USERNAME_MAX_LEN, username));
    } else if !is_valid_username(username) {
        errors.push(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }

    let email = input.email.trim();
    if email.is_empty() {
        errors.push("email", REQUIRED);
    } else if email.chars().count() > EMAIL_MAX_LEN {
        errors.push("email", too_long(EMAIL_MAX_LEN, email));
    } else if !is_plausible_email(email) {
        errors.push("email", "Enter a valid email address.");
    }

    let first_name = input.first_name.trim();
    if first_name.chars().count() > NAME_MAX_LEN {
        errors.push("first_name", too_long(NAME_MAX_LEN, first_name));
    }
    let last_name = input.last_name.trim();
    if last_name.chars().count() > NAME_MAX_LEN {
        errors.push("last_name", too_long(NAME_MAX_LEN, last_name));
    }

    if input.password1.is_empty() {
        errors.push("password1", REQUIRED);
    }
    if input.password2.is_empty() {
        errors.push("password2", REQUIRED);
    }
    if !input.password1.is_empty() && !input.password2.is_empty() {
        if input.password1 != input.password2 {
            errors.push("password2", "The two password fields didn't match.");
        } else {
            check_password_strength(input.password1, &mut errors);
        }
    }

    errors.finish(SignupDraft {
        username: username.to_string(),
        email: email.to_ascii_lowercase(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        password: input.password1.to_string(),
    })
}

/// Presence check only; credential matching happens in the accounts service.
pub fn validate_login(username: &str, password: &str) -> Result<(String, String), FieldErrors> {
    let mut errors = FieldErrors::new();
    if username.trim().is_empty() {
        errors.push("username", REQUIRED);
    }
    if password.is_empty() {
        errors.push("password", REQUIRED);
    }
    errors.finish((username.trim().to_string(), password.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDraft {
    pub title: String,
    pub slug: String,
    pub description: String,
}

pub fn validate_group(title: &str, slug: &str, description: &str) -> Result<GroupDraft, FieldErrors> {
    let mut errors = FieldErrors::new();

    let title = title.trim();
    if title.is_empty() {
        errors.push("title", REQUIRED);
    } else if title.chars().count() > GROUP_TITLE_MAX_LEN {
        errors.push("title", too_long(GROUP_TITLE_MAX_LEN, title));
    }

    let slug = slug.trim();
    if slug.is_empty() {
        errors.push("slug", REQUIRED);
    } else if slug.chars().count() > GROUP_SLUG_MAX_LEN {
        errors.push("slug", too_long(GROUP_SLUG_MAX_LEN, slug));
    } else if !slug
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        errors.push(
            "slug",
            "Enter a valid \"slug\" consisting of letters, numbers, underscores or hyphens.",
        );
    }

    if description.trim().is_empty() {
        errors.push("description", REQUIRED);
    }

    errors.finish(GroupDraft {
        title: title.to_string(),
        slug: slug.to_string(),
        description: description.trim().to_string(),
    })
}

pub fn invalid_choice() -> String {
    "Select a valid choice. That choice is not one of the available choices.".to_string()
}

fn too_long(max: usize, value: &str) -> String {
    format!(
        "Ensure this value has at most {max} characters (it has {}).",
        value.chars().count()
    )
}

fn is_valid_username(value: &str) -> bool {
    value
        .chars()
        .all(|ch| ch.is_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_'))
}

fn is_plausible_email(value: &str) -> bool {
    let Some((local, domain)) = value.rsplit_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !value.chars().any(char::is_whitespace)
}

fn check_password_strength(password: &str, errors: &mut FieldErrors) {
    if password.chars().count() < PASSWORD_MIN_LEN {
        errors.push(
            "password2",
            format!(
                "This password is too short. It must contain at least {PASSWORD_MIN_LEN} characters."
            ),
        );
    }
    if password.chars().all(|ch| ch.is_ascii_digit()) {
        errors.push("password2", "This password is entirely numeric.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_requires_text() {
        let errors = validate_post("   ", None).expect_err("blank text rejected");
        assert_eq!(errors.for_field("text"), vec![REQUIRED.to_string()]);
        assert!(!errors.has("group"));
    }

    #[test]
    fn post_group_is_optional_and_parsed() {
        let draft = validate_post("hello", Some("")).expect("valid");
        assert_eq!(draft.group_id, None);

        let id = Uuid::new_v4();
        let draft = validate_post("hello", Some(&id.to_string())).expect("valid");
        assert_eq!(draft.group_id, Some(id));
    }

    #[test]
    fn post_collects_every_error() {
        let errors = validate_post("", Some("not-a-uuid")).expect_err("invalid");
        assert_eq!(errors.len(), 2);
        assert!(errors.has("text"));
        assert!(errors.has("group"));
    }

    #[test]
    fn comment_requires_text() {
        assert!(validate_comment("\n\t").is_err());
        assert_eq!(validate_comment("nice").expect("valid"), "nice");
    }

    #[test]
    fn signup_checks_password_pair() {
        let input = SignupInput {
            username: "leo",
            email: "leo@example.com",
            password1: "correct horse",
            password2: "battery staple",
            ..Default::default()
        };
        let errors = validate_signup(&input).expect_err("mismatch");
        assert_eq!(
            errors.for_field("password2"),
            vec!["The two password fields didn't match.".to_string()]
        );
    }

    #[test]
    fn signup_rejects_weak_passwords() {
        let input = SignupInput {
            username: "leo",
            email: "leo@example.com",
            password1: "1234",
            password2: "1234",
            ..Default::default()
        };
        let errors = validate_signup(&input).expect_err("weak");
        assert_eq!(errors.for_field("password2").len(), 2);
    }

    #[test]
    fn signup_normalises_fields() {
        let input = SignupInput {
            username: " TestMan ",
            email: "TestMan.s@Skynet.com",
            first_name: "Test",
            last_name: "Man",
            password1: "s3cret-pass",
            password2: "s3cret-pass",
        };
        let draft = validate_signup(&input).expect("valid");
        assert_eq!(draft.username, "TestMan");
        assert_eq!(draft.email, "testman.s@skynet.com");
    }

    #[test]
    fn signup_rejects_bad_username_and_email() {
        let input = SignupInput {
            username: "bad name!",
            email: "nope",
            password1: "s3cret-pass",
            password2: "s3cret-pass",
            ..Default::default()
        };
        let errors = validate_signup(&input).expect_err("invalid");
        assert!(errors.has("username"));
        assert!(errors.has("email"));
    }

    #[test]
    fn group_limits_lengths() {
        let long_title = "x".repeat(GROUP_TITLE_MAX_LEN + 1);
        let errors = validate_group(&long_title, "cars", "About cars").expect_err("too long");
        assert_eq!(
            errors.for_field("title"),
            vec!["Ensure this value has at most 200 characters (it has 201).".to_string()]
        );

        let draft = validate_group("Muscle Cars", "cars", "About cars").expect("valid");
        assert_eq!(draft.slug, "cars");
    }

    #[test]
    fn group_slug_charset() {
        let errors = validate_group("Cars", "muscle cars", "About").expect_err("space");
        assert!(errors.has("slug"));
    }

    #[test]
    fn display_joins_errors() {
        let mut errors = FieldErrors::new();
        errors.push("text", "a");
        errors.push("group", "b");
        assert_eq!(errors.to_string(), "text: a; group: b");
    }
}
