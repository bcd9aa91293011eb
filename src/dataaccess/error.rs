use thiserror::Error;

/// Errors reported by a data access layer implementation.
///
/// Variants are grouped the way the HTTP layer classifies them; see
/// [`crate::error::ErrorKind`] for the mapping.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataAccessError {
    // Required field is empty or missing
    #[error("group name is empty")]
    EmptyGroupName,

    #[error("role name is empty")]
    EmptyRoleName,

    #[error("user name is empty")]
    EmptyUserName,

    #[error("field required: {0}")]
    FieldRequired(&'static str),

    // Requested resource doesn't exist
    #[error("no such group")]
    NoSuchGroup,

    #[error("no such role")]
    NoSuchRole,

    #[error("no such token")]
    NoSuchToken,

    #[error("no such user")]
    NoSuchUser,

    #[error("the admin user cannot be deleted")]
    AdminUndeletable,

    // Can't insert over something that already exists
    #[error("group already exists")]
    GroupExists,

    #[error("role already exists")]
    RoleExists,

    #[error("user already exists")]
    UserExists,

    #[error("not implemented")]
    NotImplemented,

    // Storage and connectivity
    #[error("data access layer not initialized")]
    NotInitialized,

    #[error("data access layer can't initialize: {0}")]
    CantInitialize(String),

    #[error("data access layer can't connect: {0}")]
    CantConnect(String),

    #[error("data access error: {0}")]
    Storage(String),
}

impl DataAccessError {
    /// Message that is safe to hand to a client.
    ///
    /// Storage variants carry backend detail in their `Display` output; that
    /// detail is only ever logged.
    pub fn public_message(&self) -> String {
        match self {
            DataAccessError::NotInitialized => "data access layer not initialized".to_string(),
            DataAccessError::CantInitialize(_) => "data access layer can't initialize".to_string(),
            DataAccessError::CantConnect(_) => "data access layer can't connect".to_string(),
            DataAccessError::Storage(_) => "data access error".to_string(),
            other => other.to_string(),
        }
    }
}
