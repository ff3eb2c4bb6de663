//! Tunnel name validation
//!
//! Names become URL path segments and subdomain labels, so the accepted
//! alphabet is deliberately narrow: lowercase letters and dashes, at most 20
//! characters.

/// Validation errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("tunnel name is empty")]
    EmptyName,

    #[error("tunnel name exceeds {limit} characters: {len}")]
    NameTooLong { len: usize, limit: usize },

    #[error("tunnel name contains invalid characters: {name}")]
    InvalidCharacters { name: String },
}

/// Maximum accepted tunnel name length.
pub const MAX_TUNNEL_NAME_LEN: usize = 20;

/// Validate a caller-chosen tunnel name.
pub fn validate_tunnel_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.len() > MAX_TUNNEL_NAME_LEN {
        return Err(ValidationError::NameTooLong {
            len: name.len(),
            limit: MAX_TUNNEL_NAME_LEN,
        });
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c == '-')
    {
        return Err(ValidationError::InvalidCharacters {
            name: name.to_string(),
        });
    }
    Ok(())
}
