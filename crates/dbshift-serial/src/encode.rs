use crate::Value;

/// Serialize a tree back to wire bytes.
///
/// Every length field is recomputed from the bytes actually present,
/// which is the whole point: after substitution the payloads may have
/// grown or shrunk, and the declared lengths must follow. Encoding is
/// bottom-up, so a nested document is rebuilt first and its enclosing
/// string length measured from the rebuilt bytes.
pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write(value, &mut out);
    out
}

fn write(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.extend_from_slice(b"N;"),
        Value::Bool(false) => out.extend_from_slice(b"b:0;"),
        Value::Bool(true) => out.extend_from_slice(b"b:1;"),
        Value::Int(n) => {
            out.extend_from_slice(b"i:");
            out.extend_from_slice(n.to_string().as_bytes());
            out.push(b';');
        }
        Value::Float(repr) => {
            out.extend_from_slice(b"d:");
            out.extend_from_slice(repr);
            out.push(b';');
        }
        Value::Str(payload) => write_string(payload, out),
        Value::Nested(inner) => write_string(&encode(inner), out),
        Value::Array(pairs) => {
            out.extend_from_slice(b"a:");
            out.extend_from_slice(pairs.len().to_string().as_bytes());
            out.extend_from_slice(b":{");
            for (key, val) in pairs {
                write(key, out);
                write(val, out);
            }
            out.push(b'}');
        }
        Value::Object { class, props } => {
            out.extend_from_slice(b"O:");
            out.extend_from_slice(class.len().to_string().as_bytes());
            out.extend_from_slice(b":\"");
            out.extend_from_slice(class);
            out.extend_from_slice(b"\":");
            out.extend_from_slice(props.len().to_string().as_bytes());
            out.extend_from_slice(b":{");
            for (key, val) in props {
                write(key, out);
                write(val, out);
            }
            out.push(b'}');
        }
    }
}

fn write_string(payload: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(b"s:");
    out.extend_from_slice(payload.len().to_string().as_bytes());
    out.extend_from_slice(b":\"");
    out.extend_from_slice(payload);
    out.extend_from_slice(b"\";");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode;

    #[test]
    fn untouched_trees_round_trip_byte_for_byte() {
        let docs: &[&[u8]] = &[
            b"N;",
            b"b:1;",
            b"i:-9007199254740993;",
            b"d:1.0E+15;",
            b"s:0:\"\";",
            b"s:3:\"a\x00b\";",
            b"a:0:{}",
            b"a:2:{i:0;a:1:{s:1:\"k\";b:0;}i:1;N;}",
            b"O:8:\"stdClass\":2:{s:4:\"name\";s:5:\"hello\";s:6:\"\x00*\x00num\";i:3;}",
            b"s:11:\"s:4:\"abcd\";\";",
        ];
        for doc in docs {
            let tree = decode(doc).unwrap();
            assert_eq!(encode(&tree), doc.to_vec());
        }
    }

    #[test]
    fn lengths_follow_edited_payloads() {
        let mut tree = decode(b"a:1:{s:1:\"k\";s:3:\"old\";}").unwrap();
        if let Value::Array(pairs) = &mut tree {
            pairs[0].1 = Value::str("a longer value");
        }
        assert_eq!(encode(&tree), b"a:1:{s:1:\"k\";s:14:\"a longer value\";}".to_vec());
    }

    #[test]
    fn nested_document_is_measured_after_rebuild() {
        let tree = Value::Nested(Box::new(Value::str("wxyz")));
        assert_eq!(encode(&tree), b"s:11:\"s:4:\"wxyz\";\";".to_vec());
    }
}
