//! Path helpers

use crate::domain::shared::error::StoreError;

const FORBIDDEN: &[char] = &['.', '#', '$', '[', ']'];

/// Join a parent path and a key
pub fn child_path(parent: &str, key: &str) -> String {
    let parent = parent.trim_end_matches('/');
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", parent, key)
    }
}

/// Split `path` into segments, rejecting empty paths, empty segments and
/// characters the store does not allow in keys
pub fn validate_path(path: &str) -> Result<Vec<&str>, StoreError> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(StoreError::InvalidPath("empty path".to_string()));
    }

    let segments: Vec<&str> = trimmed.split('/').collect();
    for segment in &segments {
        if segment.is_empty() {
            return Err(StoreError::InvalidPath(format!("empty segment in '{}'", path)));
        }
        if segment.contains(FORBIDDEN) {
            return Err(StoreError::InvalidPath(format!(
                "segment '{}' contains a forbidden character",
                segment
            )));
        }
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_path() {
        assert_eq!(child_path("Calls", "-Nabc"), "Calls/-Nabc");
        assert_eq!(child_path("CallHistory/u1/", "e1"), "CallHistory/u1/e1");
        assert_eq!(child_path("", "root"), "root");
    }

    #[test]
    fn test_validate_path() {
        assert_eq!(validate_path("/Calls/c1/").unwrap(), vec!["Calls", "c1"]);
        assert!(validate_path("").is_err());
        assert!(validate_path("Calls//c1").is_err());
        assert!(validate_path("Calls/a.b").is_err());
        assert!(validate_path("Calls/$id").is_err());
    }
}
