use rand::RngCore;

/// Reserved name prefix of the temporary paging cursor column.
pub const SEQUENCE_PREFIX: &str = "_dbs_seq_";

/// Marker text embedded in the column comment so a leftover column from an
/// aborted run can be recognized and dropped safely.
const COMMENT_MARKER: &str = "temporarily added by dbshift";

/// OS entropy was unavailable. Token and cursor-column naming both depend on
/// unpredictable bytes, so this is fatal to the run.
#[derive(Debug, thiserror::Error)]
#[error("entropy source failure: {0}")]
pub struct EntropyError(pub String);

/// Mint a fresh sequence column name: the reserved prefix plus eight
/// uppercase hex characters.
pub fn sequence_column_name() -> Result<String, EntropyError> {
    let mut bytes = [0u8; 4];
    rand::rngs::OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| EntropyError(e.to_string()))?;
    let mut name = String::from(SEQUENCE_PREFIX);
    for b in bytes {
        name.push_str(&format!("{b:02X}"));
    }
    Ok(name)
}

/// Column comment attached to the sequence column on creation.
pub fn sequence_column_comment(name: &str) -> String {
    format!("{name} {COMMENT_MARKER}. This column should be deleted.")
}

/// Whether a column matches the reserved sequence-column shape: name pattern
/// plus marker comment. Both must agree before anything is dropped.
pub fn is_residual_sequence_column(name: &str, comment: &str) -> bool {
    let Some(suffix) = name.strip_prefix(SEQUENCE_PREFIX) else {
        return false;
    };
    suffix.len() == 8
        && suffix.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
        && comment.starts_with(name)
        && comment.contains(COMMENT_MARKER)
        && comment.trim_end().ends_with("deleted.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_shape() {
        let name = sequence_column_name().unwrap();
        assert!(name.starts_with(SEQUENCE_PREFIX));
        assert_eq!(name.len(), SEQUENCE_PREFIX.len() + 8);
        assert!(is_residual_sequence_column(&name, &sequence_column_comment(&name)));
    }

    #[test]
    fn names_are_distinct() {
        let a = sequence_column_name().unwrap();
        let b = sequence_column_name().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn residual_requires_both_name_and_comment() {
        let name = "_dbs_seq_0A1B2C3D";
        assert!(is_residual_sequence_column(name, &sequence_column_comment(name)));
        // wrong comment
        assert!(!is_residual_sequence_column(name, "user comment"));
        // lowercase hex is not the reserved shape
        assert!(!is_residual_sequence_column(
            "_dbs_seq_0a1b2c3d",
            &sequence_column_comment("_dbs_seq_0a1b2c3d")
        ));
        // ordinary column
        assert!(!is_residual_sequence_column("title", "some comment"));
    }
}
