//! Helpers over loosely-typed backend records.
//!
//! The backend speaks schemaless JSON for user and patient records; the
//! client keeps them as [`serde_json::Value`] and reads the handful of fields
//! the coordinators branch on through these accessors.

use serde_json::Value;

/// Reserved system account receiving anonymized data donations. Donation
/// sub-accounts share the mailbox prefix (`bigdata+NSF@...`).
pub const DATA_DONATION_ACCOUNT_EMAIL: &str = "bigdata@shiosai.org";

/// Missing, `null` and `false` are absent; any other value counts as present.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(_) => true,
    }
}

/// Identifier of a user/patient record, as a string regardless of whether
/// the backend sent a string or a number.
pub fn record_id(record: &Value) -> Option<String> {
    let id = record.get("userid").or_else(|| record.get("id"))?;
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn email_verified(user: &Value) -> bool {
    truthy(user.get("emailVerified"))
}

/// Whether the account's profile indicates an own patient record exists.
pub fn has_patient_profile(user: &Value) -> bool {
    truthy(user.pointer("/profile/patient"))
}

pub fn has_clinic_role(user: &Value) -> bool {
    user.get("roles")
        .and_then(Value::as_array)
        .is_some_and(|roles| roles.iter().any(|r| r.as_str() == Some("clinic")))
}

pub fn has_clinic_profile(user: &Value) -> bool {
    truthy(user.pointer("/profile/clinic"))
}

/// Whether an invitation address targets the reserved data-donation account
/// or one of its sub-accounts.
pub fn is_data_donation_account(email: &str) -> bool {
    let Some((mailbox, domain)) = DATA_DONATION_ACCOUNT_EMAIL.split_once('@') else {
        return false;
    };
    match email.split_once('@') {
        Some((m, d)) => d == domain && (m == mailbox || m.starts_with(&format!("{mailbox}+"))),
        None => false,
    }
}

/// RFC 7386 merge of two records, the Rust rendering of the portal's deep
/// record merge (patient fields layered onto the user record, settings onto
/// a profile). `base` is not modified.
pub fn merge(base: &Value, patch: &Value) -> Value {
    let mut merged = base.clone();
    json_patch::merge(&mut merged, patch);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_id_accepts_numbers_and_strings() {
        assert_eq!(record_id(&json!({ "userid": "abc123" })).unwrap(), "abc123");
        assert_eq!(record_id(&json!({ "id": 27 })).unwrap(), "27");
        assert!(record_id(&json!({ "name": "Frank" })).is_none());
    }

    #[test]
    fn test_profile_flags() {
        let patient = json!({ "id": 27, "profile": { "patient": true }, "emailVerified": true });
        assert!(has_patient_profile(&patient));
        assert!(email_verified(&patient));
        assert!(!has_clinic_role(&patient));

        let clinician = json!({ "roles": ["clinic"], "profile": {} });
        assert!(has_clinic_role(&clinician));
        assert!(!has_clinic_profile(&clinician));

        let configured = json!({ "roles": ["clinic"], "profile": { "clinic": { "name": "x" } } });
        assert!(has_clinic_profile(&configured));
    }

    #[test]
    fn test_donation_account_matching() {
        assert!(is_data_donation_account(DATA_DONATION_ACCOUNT_EMAIL));
        assert!(is_data_donation_account("bigdata+NSF@shiosai.org"));
        assert!(!is_data_donation_account("bigdata@elsewhere.org"));
        assert!(!is_data_donation_account("a@b.com"));
    }

    #[test]
    fn test_merge_layers_patient_onto_user() {
        let user = json!({ "id": 27, "profile": { "patient": true } });
        let patient = json!({ "foo": "bar" });
        let merged = merge(&user, &patient);
        assert_eq!(merged["id"], 27);
        assert_eq!(merged["foo"], "bar");
        assert_eq!(merged["profile"]["patient"], true);
    }
}
