//! Phone number wrapper and its field rules.

use super::{ModelWrapper, Validate};
use crate::model::client::ClientPhoneNumber;
use crate::model::EntityId;
use once_cell::sync::Lazy;
use regex::Regex;

pub const NUMBER: &str = "number";

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 ()\-/]{2,30}$").expect("valid phone regex"));

pub type ClientPhoneNumberWrapper = ModelWrapper<ClientPhoneNumber>;

impl Validate for ClientPhoneNumber {
    const VALIDATED_PROPERTIES: &'static [&'static str] = &[NUMBER];

    fn validate_property(&self, property: &str) -> Vec<String> {
        if property != NUMBER {
            return Vec::new();
        }
        if self.number.trim().is_empty() {
            return vec!["Phone number is required".to_string()];
        }
        if !PHONE_RE.is_match(&self.number) {
            return vec!["Phone number is not valid".to_string()];
        }
        Vec::new()
    }
}

impl ModelWrapper<ClientPhoneNumber> {
    pub fn id(&self) -> EntityId {
        self.read(|phone| phone.id)
    }

    pub fn number(&self) -> String {
        self.read(|phone| phone.number.clone())
    }

    pub fn set_number(&mut self, value: impl Into<String>) {
        self.set_value(NUMBER, value.into(), |phone| &mut phone.number);
    }
}
