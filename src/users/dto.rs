use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    users::repo_types::{Role, User, UserChanges},
    validation::{Field, Rule, Validate},
};

const NAME_RULES: &[Rule] = &[Rule::Required, Rule::AlphaSpace, Rule::Max(255)];
const EMAIL_RULES: &[Rule] = &[Rule::Required, Rule::Email, Rule::Max(255)];
const PASSWORD_RULES: &[Rule] = &[Rule::Required, Rule::Password, Rule::Max(255)];
const UPDATE_NAME_RULES: &[Rule] = &[Rule::RequiredWithout("email"), Rule::AlphaSpace, Rule::Max(255)];
const UPDATE_EMAIL_RULES: &[Rule] = &[Rule::RequiredWithout("name"), Rule::Email, Rule::Max(255)];
const LOGIN_PASSWORD_RULES: &[Rule] = &[Rule::Required, Rule::Max(255)];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl Validate for CreateForm {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::text("name", &self.name, NAME_RULES),
            Field::text("email", &self.email, EMAIL_RULES),
            Field::text("password", &self.password, PASSWORD_RULES),
        ]
    }
}

/// At least one of name and email. An empty string counts as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateForm {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UpdateForm {
    pub fn into_changes(self) -> UserChanges {
        UserChanges {
            name: self.name.filter(|n| !n.is_empty()),
            email: self.email.filter(|e| !e.is_empty()),
        }
    }
}

impl Validate for UpdateForm {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::text("name", self.name.as_deref().unwrap_or_default(), UPDATE_NAME_RULES),
            Field::text("email", self.email.as_deref().unwrap_or_default(), UPDATE_EMAIL_RULES),
        ]
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl Validate for LoginForm {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::text("email", &self.email, EMAIL_RULES),
            Field::text("password", &self.password, LOGIN_PASSWORD_RULES),
        ]
    }
}

/// Public representation of a user.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub users: Vec<UserResponse>,
    pub total_items: u64,
    pub number_of_pages: u64,
    pub current_page: u64,
}

#[derive(Debug, Serialize)]
pub struct RoleListResponse {
    pub users: Vec<UserResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_form_role_defaults_to_regular() {
        let form: CreateForm =
            serde_json::from_str(r#"{"name":"Jane","email":"jane@example.com","password":"x"}"#).unwrap();
        assert_eq!(form.role, Role::Regular);
    }

    #[test]
    fn create_form_rejects_unknown_role() {
        let res = serde_json::from_str::<CreateForm>(r#"{"role":"superuser"}"#);
        assert!(res.is_err());
    }

    #[test]
    fn create_form_reports_first_failure_per_field() {
        let form = CreateForm {
            name: "J0hn".into(),
            email: "not-an-email".into(),
            password: "weak".into(),
            role: Role::Regular,
        };
        let err = form.validate().unwrap_err();
        assert_eq!(
            err.errors,
            vec![
                "name can only contain alphabetic and space characters",
                "email must be a valid email address",
                "password must contain at least one uppercase letter, one lowercase letter, one digit, and one special character",
            ]
        );
    }

    #[test]
    fn update_form_needs_one_field() {
        let err = UpdateForm::default().validate().unwrap_err();
        assert_eq!(err.errors, vec!["name is required when email is not present"]);

        let empty = UpdateForm {
            name: Some(String::new()),
            email: Some(String::new()),
        };
        assert_eq!(empty.validate().unwrap_err().errors.len(), 1);
    }

    #[test]
    fn update_form_email_only() {
        let form = UpdateForm {
            name: Some(String::new()),
            email: Some("jane@example.com".into()),
        };
        assert!(form.validate().is_ok());
        assert_eq!(
            form.into_changes(),
            UserChanges {
                name: None,
                email: Some("jane@example.com".into()),
            }
        );
    }

    #[test]
    fn user_response_never_carries_the_hash() {
        let user = User {
            id: Uuid::nil(),
            name: "Jane".into(),
            email: "jane@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            role: Role::Regular,
        };
        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["name"], "Jane");
    }

    #[test]
    fn list_response_uses_camel_case() {
        let json = serde_json::to_value(ListResponse {
            users: vec![],
            total_items: 25,
            number_of_pages: 3,
            current_page: 4,
        })
        .unwrap();
        assert_eq!(json["totalItems"], 25);
        assert_eq!(json["numberOfPages"], 3);
        assert_eq!(json["currentPage"], 4);
    }
}
