//! Client wrapper and client field rules.
//!
//! # Invariants
//! - `first_name` is required; names and email are at most 50 characters.
//! - An empty last name or email is stored as `None`.

use super::{ModelWrapper, Validate};
use crate::model::client::Client;
use crate::model::EntityId;
use once_cell::sync::Lazy;
use regex::Regex;

pub const FIRST_NAME: &str = "first_name";
pub const LAST_NAME: &str = "last_name";
pub const EMAIL: &str = "email";
pub const COMPANY_ID: &str = "company_id";

const MAX_NAME_CHARS: usize = 50;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
});

pub type ClientWrapper = ModelWrapper<Client>;

impl Validate for Client {
    const VALIDATED_PROPERTIES: &'static [&'static str] = &[FIRST_NAME, LAST_NAME, EMAIL];

    fn validate_property(&self, property: &str) -> Vec<String> {
        let mut errors = Vec::new();
        match property {
            FIRST_NAME => {
                if self.first_name.trim().is_empty() {
                    errors.push("First name is required".to_string());
                }
                check_length(&mut errors, &self.first_name);
            }
            LAST_NAME => {
                if let Some(last_name) = &self.last_name {
                    check_length(&mut errors, last_name);
                }
            }
            EMAIL => {
                if let Some(email) = &self.email {
                    if !EMAIL_RE.is_match(email) {
                        errors.push("Email is not a valid email address".to_string());
                    }
                    check_length(&mut errors, email);
                }
            }
            _ => {}
        }
        errors
    }
}

fn check_length(errors: &mut Vec<String>, value: &str) {
    if value.chars().count() > MAX_NAME_CHARS {
        errors.push(format!("At most {MAX_NAME_CHARS} characters are allowed"));
    }
}

fn non_empty(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

impl ModelWrapper<Client> {
    pub fn id(&self) -> EntityId {
        self.read(|client| client.id)
    }

    pub fn first_name(&self) -> String {
        self.read(|client| client.first_name.clone())
    }

    pub fn set_first_name(&mut self, value: impl Into<String>) {
        self.set_value(FIRST_NAME, value.into(), |client| &mut client.first_name);
    }

    pub fn last_name(&self) -> Option<String> {
        self.read(|client| client.last_name.clone())
    }

    pub fn set_last_name(&mut self, value: impl Into<String>) {
        self.set_value(LAST_NAME, non_empty(value), |client| &mut client.last_name);
    }

    pub fn email(&self) -> Option<String> {
        self.read(|client| client.email.clone())
    }

    pub fn set_email(&mut self, value: impl Into<String>) {
        self.set_value(EMAIL, non_empty(value), |client| &mut client.email);
    }

    pub fn company_id(&self) -> Option<EntityId> {
        self.read(|client| client.company_id)
    }

    /// `None` selects the "no company" lookup item.
    pub fn set_company_id(&mut self, value: Option<EntityId>) {
        self.set_value(COMPANY_ID, value, |client| &mut client.company_id);
    }

    pub fn display_name(&self) -> String {
        self.read(Client::display_name)
    }
}
