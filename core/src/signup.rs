//! Registration forms for farmers and vets, and the profile documents they produce.

use crate::auth::AuthError;
use serde::{Deserialize, Serialize};

pub const USERS_COLLECTION: &str = "users";
pub const VETS_COLLECTION: &str = "vets";

const MIN_PASSWORD_CHARS: usize = 8;

/// Farmer registration form. Every field is required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmerSignup {
    pub full_name: String,
    pub email: String,
    pub mobile_number: String,
    pub password: String,
    pub confirm_password: String,
}

/// Vet registration form. `specialization` may be left blank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VetSignup {
    pub full_name: String,
    pub phone_number: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub vet_reg_number: String,
    pub specialization: String,
    pub clinic_name: String,
    pub clinic_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Signup {
    Farmer(FarmerSignup),
    Vet(VetSignup),
}

/// One rejected form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Signup {
    pub fn is_vet(&self) -> bool {
        matches!(self, Self::Vet(_))
    }

    pub fn email(&self) -> &str {
        match self {
            Self::Farmer(form) => form.email.trim(),
            Self::Vet(form) => form.email.trim(),
        }
    }

    pub fn password(&self) -> &str {
        match self {
            Self::Farmer(form) => &form.password,
            Self::Vet(form) => &form.password,
        }
    }

    /// Firestore collection the profile document is written to.
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Farmer(_) => USERS_COLLECTION,
            Self::Vet(_) => VETS_COLLECTION,
        }
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        match self {
            Self::Farmer(form) => form.validate(),
            Self::Vet(form) => form.validate(),
        }
    }

    /// Profile document fields, in the field names the app reads back.
    pub fn profile_fields(&self, user_id: &str) -> Vec<(&'static str, String)> {
        match self {
            Self::Farmer(form) => vec![
                ("userId", user_id.to_owned()),
                ("fullName", form.full_name.trim().to_owned()),
                ("email", form.email.trim().to_owned()),
                ("mobileNumber", form.mobile_number.trim().to_owned()),
            ],
            Self::Vet(form) => vec![
                ("fullName", form.full_name.trim().to_owned()),
                ("phoneNumber", form.phone_number.trim().to_owned()),
                ("email", form.email.trim().to_owned()),
                ("vetRegNumber", form.vet_reg_number.trim().to_owned()),
                ("specialization", form.specialization.trim().to_owned()),
                ("clinicName", form.clinic_name.trim().to_owned()),
                ("clinicAddress", form.clinic_address.trim().to_owned()),
            ],
        }
    }
}

impl FarmerSignup {
    pub fn validate(&self) -> Result<(), AuthError> {
        let required = [
            &self.email,
            &self.password,
            &self.confirm_password,
            &self.full_name,
            &self.mobile_number,
        ];
        if required.iter().any(|value| value.trim().is_empty()) {
            return Err(AuthError::IncompleteForm);
        }
        if self.password != self.confirm_password {
            return Err(AuthError::PasswordMismatch);
        }
        Ok(())
    }
}

impl VetSignup {
    /// Check every field and report all failures at once, in form order.
    pub fn validate(&self) -> Result<(), AuthError> {
        let mut errors = Vec::new();
        let mut reject = |field, message| errors.push(FieldError { field, message });

        if self.full_name.trim().is_empty() {
            reject("full_name", "Full name is required");
        }
        if self.phone_number.trim().is_empty() {
            reject("phone_number", "Phone number is required");
        } else if !is_phone_number(self.phone_number.trim()) {
            reject("phone_number", "Enter a valid 10-digit phone number");
        }
        if self.email.trim().is_empty() {
            reject("email", "Email is required");
        } else if !is_email(self.email.trim()) {
            reject("email", "Enter a valid email address");
        }
        if self.password.is_empty() {
            reject("password", "Password is required");
        } else if self.password.chars().count() < MIN_PASSWORD_CHARS {
            reject("password", "Password must be at least 8 characters");
        }
        if self.confirm_password.is_empty() {
            reject("confirm_password", "Please confirm your password");
        } else if self.confirm_password != self.password {
            reject("confirm_password", "Passwords do not match");
        }
        if self.vet_reg_number.trim().is_empty() {
            reject("vet_reg_number", "Registration number is required");
        }
        if self.clinic_name.trim().is_empty() {
            reject("clinic_name", "Clinic name is required");
        }
        if self.clinic_address.trim().is_empty() {
            reject("clinic_address", "Clinic address is required");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AuthError::InvalidFields(errors))
        }
    }
}

fn is_phone_number(value: &str) -> bool {
    value.len() == 10 && value.bytes().all(|b| b.is_ascii_digit())
}

// local@domain.tld, with no whitespace and no empty domain labels.
fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}
