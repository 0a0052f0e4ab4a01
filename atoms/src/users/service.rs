use super::model::User;

/// Look up a user by email, case-insensitively. Emails are the unique key
/// in the directory.
pub fn find_by_email<'a>(users: &'a [User], email: &str) -> Option<&'a User> {
    users.iter().find(|u| u.email.eq_ignore_ascii_case(email))
}

/// Check a login attempt against the directory. The password is compared
/// verbatim - the directory stores it opaque, there is no hashing here.
pub fn verify_login<'a>(users: &'a [User], email: &str, password: &str) -> Option<&'a User> {
    find_by_email(users, email).filter(|u| u.password == password)
}

/// Parse a directory payload (a JSON array of user records). Individual
/// records that fail to parse are dropped rather than failing the batch.
pub fn parse_directory(body: &serde_json::Value) -> Vec<User> {
    match body.as_array() {
        Some(items) => items
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect(),
        None => Vec::new(),
    }
}
