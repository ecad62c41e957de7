use dbshift_core::ReplacementSet;
use dbshift_replace::{substitute, substitute_batch, ReplaceError, TokenPool};

use crate::{decode, encode, Value};

/// Rewrite one database cell.
///
/// If the cell decodes as a serialized document, substitution runs over
/// its string leaves and the document is re-encoded with fresh lengths.
/// Anything that does not decode is treated as plain text and
/// substituted directly; a malformed serialized payload therefore
/// degrades to a flat replace rather than aborting the row.
pub fn rewrite_cell(raw: &[u8], set: &ReplacementSet) -> Result<(Vec<u8>, u64), ReplaceError> {
    let mut pool = TokenPool::new();
    match decode(raw) {
        Ok(mut tree) => {
            let count = substitute_tree(&mut tree, set, &mut pool)?;
            Ok((encode(&tree), count))
        }
        Err(_) => substitute(raw, set, &mut pool),
    }
}

/// Run substitution over every string leaf of a decoded tree, in one
/// batch so a single token pool covers the whole document.
///
/// Leaves are string values, array keys, and object property names;
/// object class names are left alone. Returns the total replacement
/// count.
pub fn substitute_tree(
    tree: &mut Value,
    set: &ReplacementSet,
    pool: &mut TokenPool,
) -> Result<u64, ReplaceError> {
    let mut subjects = Vec::new();
    collect(tree, &mut subjects);
    if subjects.is_empty() {
        return Ok(0);
    }

    let (rewritten, count) = substitute_batch(&subjects, set, pool)?;
    let mut it = rewritten.into_iter();
    write_back(tree, false, &mut it);
    debug_assert!(it.next().is_none());
    Ok(count)
}

fn collect(value: &Value, out: &mut Vec<Vec<u8>>) {
    match value {
        Value::Str(payload) => out.push(payload.clone()),
        Value::Nested(inner) => collect(inner, out),
        Value::Array(pairs) | Value::Object { props: pairs, .. } => {
            for (key, val) in pairs {
                collect(key, out);
                collect(val, out);
            }
        }
        _ => {}
    }
}

/// Mirror of [`collect`]: consumes rewritten payloads in the same
/// traversal order. `property_name` is set for keys in object property
/// position, where a substituted visibility prefix written as the two
/// characters `\0` must become a real NUL byte again.
fn write_back(value: &mut Value, property_name: bool, it: &mut std::vec::IntoIter<Vec<u8>>) {
    match value {
        Value::Str(payload) => {
            let mut rewritten = match it.next() {
                Some(bytes) => bytes,
                None => return,
            };
            if property_name {
                rewritten = restore_nul_prefixes(&rewritten);
            }
            *payload = rewritten;
        }
        Value::Nested(inner) => write_back(inner, false, it),
        Value::Array(pairs) => {
            for (key, val) in pairs {
                write_back(key, false, it);
                write_back(val, false, it);
            }
        }
        Value::Object { props, .. } => {
            for (key, val) in props {
                write_back(key, true, it);
                write_back(val, false, it);
            }
        }
        _ => {}
    }
}

/// Replace every literal backslash-zero pair with a NUL byte. Mangled
/// property names (`\0Class\0prop`, `\0*\0prop`) sometimes arrive with
/// the NULs spelled out as two characters after passing through other
/// tooling; re-encoding them that way would change the property's
/// visibility, so they are normalized back to real NULs.
fn restore_nul_prefixes(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut pos = 0;
    while pos < bytes.len() {
        if bytes[pos] == b'\\' && bytes.get(pos + 1) == Some(&b'0') {
            out.push(0);
            pos += 2;
        } else {
            out.push(bytes[pos]);
            pos += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbshift_core::ReplacementSet;

    fn set(pairs: &[(&str, &str)]) -> ReplacementSet {
        let mut set = ReplacementSet::new();
        for (from, to) in pairs {
            set.insert(from.to_string(), to.to_string());
        }
        set
    }

    #[test]
    fn zero_match_cell_round_trips_byte_for_byte() {
        let doc: &[u8] =
            b"O:8:\"stdClass\":2:{s:4:\"home\";s:20:\"http://old.test/blog\";s:5:\"count\";i:3;}";
        let (out, count) = rewrite_cell(doc, &set(&[("absent", "thing")])).unwrap();
        assert_eq!(out, doc.to_vec());
        assert_eq!(count, 0);
    }

    #[test]
    fn lengths_track_replacement_growth() {
        let doc = b"a:1:{s:3:\"url\";s:15:\"http://old.test\";}";
        let (out, count) =
            rewrite_cell(doc, &set(&[("old.test", "much-longer.example")])).unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            out,
            b"a:1:{s:3:\"url\";s:26:\"http://much-longer.example\";}".to_vec()
        );
    }

    #[test]
    fn structure_survives_while_only_strings_change() {
        let doc = b"a:3:{i:0;i:42;s:3:\"key\";s:8:\"old.test\";i:2;d:1.5;}";
        let (out, _) = rewrite_cell(doc, &set(&[("old.test", "new.test")])).unwrap();
        let tree = decode(&out).unwrap();
        match tree {
            Value::Array(pairs) => {
                assert_eq!(pairs.len(), 3);
                assert_eq!(pairs[0], (Value::Int(0), Value::Int(42)));
                assert_eq!(pairs[1], (Value::str("key"), Value::str("new.test")));
                assert_eq!(pairs[2], (Value::Int(2), Value::Float(b"1.5".to_vec())));
            }
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn array_keys_are_substituted_too() {
        let doc = b"a:1:{s:8:\"old.test\";i:1;}";
        let (out, count) = rewrite_cell(doc, &set(&[("old.test", "new.example")])).unwrap();
        assert_eq!(count, 1);
        assert_eq!(out, b"a:1:{s:11:\"new.example\";i:1;}".to_vec());
    }

    #[test]
    fn class_names_are_never_substituted() {
        let doc = b"O:8:\"SiteInfo\":1:{s:4:\"name\";s:8:\"SiteInfo\";}";
        let (out, count) = rewrite_cell(doc, &set(&[("SiteInfo", "Else")])).unwrap();
        assert_eq!(count, 1);
        assert_eq!(out, b"O:8:\"SiteInfo\":1:{s:4:\"name\";s:4:\"Else\";}".to_vec());
    }

    #[test]
    fn doubly_serialized_payload_is_rewritten_inside_out() {
        // Inner document serialized, then stored as a string of an
        // outer document. Both length layers must be recomputed.
        let inner = b"a:1:{s:4:\"link\";s:15:\"http://old.test\";}";
        let mut outer = Vec::new();
        outer.extend_from_slice(b"s:");
        outer.extend_from_slice(inner.len().to_string().as_bytes());
        outer.extend_from_slice(b":\"");
        outer.extend_from_slice(inner);
        outer.extend_from_slice(b"\";");

        let (out, count) = rewrite_cell(&outer, &set(&[("old.test", "renamed.example")])).unwrap();
        assert_eq!(count, 1);

        let expected_inner: &[u8] = b"a:1:{s:4:\"link\";s:22:\"http://renamed.example\";}";
        let mut expected = Vec::new();
        expected.extend_from_slice(b"s:");
        expected.extend_from_slice(expected_inner.len().to_string().as_bytes());
        expected.extend_from_slice(b":\"");
        expected.extend_from_slice(expected_inner);
        expected.extend_from_slice(b"\";");
        assert_eq!(out, expected);
    }

    #[test]
    fn malformed_payload_falls_back_to_plain_text() {
        // Truncated document; flat substitution still runs.
        let (out, count) =
            rewrite_cell(b"s:99:\"http://old.test\";", &set(&[("old.test", "new.test")])).unwrap();
        assert_eq!(count, 1);
        assert_eq!(out, b"s:99:\"http://new.test\";".to_vec());
    }

    #[test]
    fn excessively_nested_cell_degrades_to_plain_text() {
        // Nesting past the decoder's cap must not abort the row; the
        // cell is rewritten as flat text instead.
        let mut doc = Vec::new();
        for _ in 0..10_000 {
            doc.extend_from_slice(b"a:1:{i:0;");
        }
        doc.extend_from_slice(b"s:8:\"old.test\";");
        doc.extend(std::iter::repeat(b'}').take(10_000));

        let (out, count) = rewrite_cell(&doc, &set(&[("old.test", "new.test")])).unwrap();
        assert_eq!(count, 1);
        let expected = String::from_utf8(doc.clone())
            .unwrap()
            .replace("old.test", "new.test");
        assert_eq!(out, expected.into_bytes());
    }

    #[test]
    fn plain_text_cell_is_substituted_directly() {
        let (out, count) =
            rewrite_cell(b"visit http://old.test today", &set(&[("old.test", "new.test")])).unwrap();
        assert_eq!(count, 1);
        assert_eq!(out, b"visit http://new.test today".to_vec());
    }

    #[test]
    fn substitution_does_not_cascade_across_leaves() {
        let doc = b"a:2:{i:0;s:1:\"a\";i:1;s:1:\"b\";}";
        let (out, count) = rewrite_cell(doc, &set(&[("a", "b"), ("b", "c")])).unwrap();
        assert_eq!(count, 2);
        assert_eq!(out, b"a:2:{i:0;s:1:\"b\";i:1;s:1:\"c\";}".to_vec());
    }

    #[test]
    fn property_name_nul_prefix_is_restored() {
        assert_eq!(restore_nul_prefixes(b"\\0*\\0prop"), b"\x00*\x00prop".to_vec());
        assert_eq!(restore_nul_prefixes(b"plain"), b"plain".to_vec());
    }
}
