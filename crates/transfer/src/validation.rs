use std::path::{Component, Path};

use crate::TransferError;

/// Checks that a file name from a record is safe to create inside an
/// output directory.
///
/// Rejects empty names, absolute paths, `..` components, Windows prefixes,
/// and anything with more than one path component.
pub fn validate_output_name(name: &str) -> Result<(), TransferError> {
    if name.trim().is_empty() {
        return Err(TransferError::InvalidPath("empty file name".into()));
    }

    let path = Path::new(name);
    if path.is_absolute() {
        return Err(TransferError::InvalidPath(format!(
            "absolute path not allowed: {name}"
        )));
    }

    let mut normal = 0;
    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(TransferError::InvalidPath(format!(
                    "parent directory traversal not allowed: {name}"
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(TransferError::InvalidPath(format!(
                    "absolute path not allowed: {name}"
                )));
            }
            Component::CurDir => {}
            Component::Normal(_) => normal += 1,
        }
    }

    if normal != 1 {
        return Err(TransferError::InvalidPath(format!(
            "expected a bare file name: {name}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_names() {
        assert!(validate_output_name("report.txt").is_ok());
        assert!(validate_output_name(".hidden").is_ok());
        assert!(validate_output_name("./report.txt").is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert!(validate_output_name("").is_err());
        assert!(validate_output_name("   ").is_err());
    }

    #[test]
    fn rejects_traversal() {
        assert!(validate_output_name("..").is_err());
        assert!(validate_output_name("../etc/passwd").is_err());
    }

    #[test]
    fn rejects_absolute() {
        assert!(validate_output_name("/tmp/evil").is_err());
    }

    #[test]
    fn rejects_nested_paths() {
        assert!(validate_output_name("sub/file.txt").is_err());
    }
}
