use serde::{Deserialize, Serialize};

/// A Gort user as exchanged over the REST API.
///
/// `password` is only populated on input and on the bootstrap response; the
/// data access layer never hands stored credentials back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub email: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    pub username: String,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    /// Copy of this user with the password cleared.
    pub fn without_password(&self) -> Self {
        Self {
            password: String::new(),
            ..self.clone()
        }
    }
}
