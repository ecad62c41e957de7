/// A decoded serialized document.
///
/// Strings and floats carry raw bytes rather than Rust `String`/`f64`:
/// cell contents are not guaranteed to be valid UTF-8, and a float's
/// textual representation must survive a round trip verbatim (PHP emits
/// shapes such as `1.0E+15` or `INF` that a parse/format cycle would
/// alter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    /// Float kept as its textual representation.
    Float(Vec<u8>),
    /// String leaf, raw payload bytes.
    Str(Vec<u8>),
    /// A string whose payload was itself a complete serialized
    /// document. The inner tree is rewritten like any other and
    /// re-encoded back into a string on output.
    Nested(Box<Value>),
    /// Ordered key/value pairs. Keys in practice are ints or strings
    /// but the decoder accepts any value in key position.
    Array(Vec<(Value, Value)>),
    Object {
        /// Class name, never substituted.
        class: Vec<u8>,
        props: Vec<(Value, Value)>,
    },
}

impl Value {
    /// Convenience constructor for string leaves.
    pub fn str(s: impl Into<Vec<u8>>) -> Self {
        Value::Str(s.into())
    }
}
