use super::ApiError;

pub fn validate_post_id(id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid post ID: {}. ID must be a positive integer",
            id
        )));
    }
    Ok(id)
}

pub fn validate_user_id(id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid user ID: {}. ID must be a positive integer",
            id
        )));
    }
    Ok(id)
}

pub fn validate_limit(limit: u64) -> Result<u64, ApiError> {
    const MAX_LIMIT: u64 = 1000;
    const MIN_LIMIT: u64 = 1;

    if !(MIN_LIMIT..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::validation(format!(
            "Invalid limit: {}. Limit must be between {} and {}",
            limit, MIN_LIMIT, MAX_LIMIT
        )));
    }
    Ok(limit)
}

pub fn validate_username(username: &str) -> Result<&str, ApiError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Username cannot be empty"));
    }

    if trimmed.len() > 50 {
        return Err(ApiError::validation(
            "Username must be 50 characters or less",
        ));
    }

    if !trimmed
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ApiError::validation(
            "Username can only contain letters, numbers, hyphens, underscores, and dots",
        ));
    }

    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_post_id() {
        assert!(validate_post_id(1).is_ok());
        assert!(validate_post_id(12345).is_ok());
        assert!(validate_post_id(0).is_err());
        assert!(validate_post_id(-1).is_err());
    }

    #[test]
    fn test_validate_limit() {
        assert!(validate_limit(1).is_ok());
        assert!(validate_limit(500).is_ok());
        assert!(validate_limit(1000).is_ok());
        assert!(validate_limit(0).is_err());
        assert!(validate_limit(1001).is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("bob_the-3rd.smith").is_ok());
        assert!(validate_username("  trimmed  ").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("   ").is_err());
        assert!(validate_username("a".repeat(51).as_str()).is_err());
        assert!(validate_username("not valid").is_err());
        assert!(validate_username("bad@name").is_err());
    }
}
