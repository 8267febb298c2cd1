//! Validación del formulario de contacto público.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

// Sin punto inicial ni `..`: el crate regex no admite lookahead, se comprueba aparte.
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[A-Z0-9_'+\-.]*[A-Z0-9_+\-]@([A-Z0-9][A-Z0-9\-]*\.)+[A-Z]{2,}$")
        .expect("expresión de email válida")
});

pub fn is_valid_email(email: &str) -> bool {
    !email.starts_with('.') && !email.contains("..") && EMAIL_RE.is_match(email)
}

/// Cuerpo tal y como llega. Los campos se guardan sin tipar para que un tipo
/// incorrecto acabe como error de validación del campo.
#[derive(Debug, Default, Deserialize)]
pub struct ContactPayload {
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub email: Option<Value>,
    #[serde(default)]
    pub subject: Option<Value>,
    #[serde(default)]
    pub message: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

/// Errores por campo, en el formato `{campo: [mensajes]}`.
pub type FieldErrors = BTreeMap<&'static str, Vec<&'static str>>;

fn type_mismatch(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "Expected string, received boolean",
        Value::Number(_) => "Expected string, received number",
        Value::Array(_) => "Expected string, received array",
        _ => "Expected string, received object",
    }
}

/// Texto recortado del campo; `None` si el tipo no es una cadena (ya anotado).
fn text(errors: &mut FieldErrors, field: &'static str, value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => Some(String::new()),
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(other) => {
            errors.entry(field).or_default().push(type_mismatch(other));
            None
        }
    }
}

fn required(
    errors: &mut FieldErrors,
    field: &'static str,
    value: Option<&Value>,
    message: &'static str,
) -> String {
    let Some(trimmed) = text(errors, field, value) else {
        return String::new();
    };
    if trimmed.is_empty() {
        errors.entry(field).or_default().push(message);
    }
    trimmed
}

pub fn validate(payload: &ContactPayload) -> Result<ContactMessage, FieldErrors> {
    let mut errors = FieldErrors::new();

    let name = required(&mut errors, "name", payload.name.as_ref(), "Name is required");
    let email = match text(&mut errors, "email", payload.email.as_ref()) {
        Some(email) if is_valid_email(&email) => email,
        Some(_) => {
            errors.entry("email").or_default().push("Invalid email format");
            String::new()
        }
        None => String::new(),
    };
    let subject = required(&mut errors, "subject", payload.subject.as_ref(), "Subject is required");
    let message = required(&mut errors, "message", payload.message.as_ref(), "Message is required");

    if errors.is_empty() {
        Ok(ContactMessage { name, email, subject, message })
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(name: &str, email: &str, subject: &str, message: &str) -> ContactPayload {
        ContactPayload {
            name: Some(name.into()),
            email: Some(email.into()),
            subject: Some(subject.into()),
            message: Some(message.into()),
        }
    }

    #[test]
    fn accepts_and_trims_valid_messages() {
        let msg = validate(&payload("  Ana ", "ana@example.com ", "Hola", " Consulta ")).unwrap();
        assert_eq!(msg.name, "Ana");
        assert_eq!(msg.email, "ana@example.com");
        assert_eq!(msg.message, "Consulta");
    }

    #[test]
    fn reports_every_invalid_field() {
        let errors = validate(&payload("   ", "not-an-email", "", "x")).unwrap_err();
        assert_eq!(errors.get("name"), Some(&vec!["Name is required"]));
        assert_eq!(errors.get("email"), Some(&vec!["Invalid email format"]));
        assert_eq!(errors.get("subject"), Some(&vec!["Subject is required"]));
        assert!(!errors.contains_key("message"));
    }

    #[test]
    fn missing_fields_are_invalid() {
        let errors = validate(&ContactPayload::default()).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn email_rules() {
        for ok in ["ana@example.com", "first.last+tag@mail.example.co", "o'neil@x.io"] {
            assert!(is_valid_email(ok), "{ok} debería ser válido");
        }
        for bad in ["a..b@x.com", "a@b.c", ".a@x.com", "a.@x.com", "a@x", "a b@x.com", ""] {
            assert!(!is_valid_email(bad), "{bad} debería ser inválido");
        }
    }

    #[test]
    fn wrong_field_types_are_reported_per_field() {
        let body: ContactPayload = serde_json::from_value(json!({
            "name": "Ana",
            "email": 5,
            "subject": ["x"],
            "message": "Hola"
        }))
        .unwrap();
        let errors = validate(&body).unwrap_err();
        assert_eq!(errors.get("email"), Some(&vec!["Expected string, received number"]));
        assert_eq!(errors.get("subject"), Some(&vec!["Expected string, received array"]));
        assert_eq!(errors.len(), 2);
    }
}
