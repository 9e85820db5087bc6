//! Composite resource identifiers
//!
//! Resources addressed by more than one key (an index inside an instance, a
//! pipeline inside a Logstash instance) store their components joined by
//! [`ID_SEPARATOR`] in local state.

use crate::error::{CloudError, Result};

pub const ID_SEPARATOR: &str = "#";

pub fn compose(parts: &[&str]) -> String {
    parts.join(ID_SEPARATOR)
}

/// Split `id` into exactly `N` non-empty components
pub fn split<const N: usize>(id: &str) -> Result<[&str; N]> {
    let parts: Vec<&str> = id.split(ID_SEPARATOR).collect();
    if parts.len() != N || parts.iter().any(|p| p.is_empty()) {
        return Err(CloudError::InvalidId(format!(
            "expected {} components separated by '{}', got {:?}",
            N, ID_SEPARATOR, id
        )));
    }
    let mut out = [""; N];
    out.copy_from_slice(&parts);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_and_split() {
        let id = compose(&["es-abc", "_doc", "logs"]);
        assert_eq!(id, "es-abc#_doc#logs");
        let [instance, kind, name] = split::<3>(&id).unwrap();
        assert_eq!((instance, kind, name), ("es-abc", "_doc", "logs"));
    }

    #[test]
    fn test_split_rejects_wrong_shape() {
        assert!(split::<2>("only-one").is_err());
        assert!(split::<2>("a#b#c").is_err());
        assert!(split::<2>("a#").is_err());
    }
}
