use crate::{DecodeError, Value};

/// Containers deeper than this are rejected rather than parsed. Real
/// stored data nests a handful of levels; the cap keeps a corrupt or
/// hostile cell from exhausting the stack, and bounds the mirrored
/// recursion in the encoder and the leaf transform.
const MAX_DEPTH: usize = 128;

/// Decode a complete serialized document.
///
/// The whole input must be consumed; trailing bytes after a valid
/// document are an error, which is what lets callers use this as a
/// detector for "is this cell serialized at all".
pub fn decode(input: &[u8]) -> Result<Value, DecodeError> {
    decode_at(input, 0)
}

/// Depth carries across doubly-serialized payloads, so a string whose
/// payload is itself a document cannot reset the budget.
fn decode_at(input: &[u8], depth: usize) -> Result<Value, DecodeError> {
    let mut d = Decoder { buf: input, pos: 0, depth };
    let value = d.value()?;
    if d.pos != input.len() {
        return Err(DecodeError::Trailing { pos: d.pos });
    }
    Ok(value)
}

struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Decoder<'a> {
    fn value(&mut self) -> Result<Value, DecodeError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(DecodeError::TooDeep { pos: self.pos });
        }
        let value = self.node()?;
        self.depth -= 1;
        Ok(value)
    }

    fn node(&mut self) -> Result<Value, DecodeError> {
        match self.byte()? {
            b'N' => {
                self.expect(b';')?;
                Ok(Value::Null)
            }
            b'b' => {
                self.expect(b':')?;
                let flag = match self.byte()? {
                    b'0' => false,
                    b'1' => true,
                    byte => {
                        return Err(DecodeError::Unexpected {
                            pos: self.pos - 1,
                            byte,
                        })
                    }
                };
                self.expect(b';')?;
                Ok(Value::Bool(flag))
            }
            b'i' => {
                self.expect(b':')?;
                let n = self.int()?;
                self.expect(b';')?;
                Ok(Value::Int(n))
            }
            b'd' => {
                self.expect(b':')?;
                let repr = self.float_repr()?;
                self.expect(b';')?;
                Ok(Value::Float(repr))
            }
            b's' => {
                self.expect(b':')?;
                let len = self.length()?;
                self.expect(b':')?;
                self.expect(b'"')?;
                let payload = self.take(len)?.to_vec();
                self.expect(b'"')?;
                self.expect(b';')?;
                // A payload that is itself a complete document is a
                // doubly-serialized value; keep the inner tree so its
                // strings get rewritten too. The payload is strictly
                // shorter than its enclosing string so this recursion
                // terminates.
                match decode_at(&payload, self.depth) {
                    Ok(inner) if !payload.is_empty() => Ok(Value::Nested(Box::new(inner))),
                    _ => Ok(Value::Str(payload)),
                }
            }
            b'a' => {
                self.expect(b':')?;
                let count = self.length()?;
                self.expect(b':')?;
                self.expect(b'{')?;
                let mut pairs = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    let key = self.value()?;
                    let val = self.value()?;
                    pairs.push((key, val));
                }
                self.expect(b'}')?;
                Ok(Value::Array(pairs))
            }
            b'O' => {
                self.expect(b':')?;
                let name_len = self.length()?;
                self.expect(b':')?;
                self.expect(b'"')?;
                let class = self.take(name_len)?.to_vec();
                self.expect(b'"')?;
                self.expect(b':')?;
                let count = self.length()?;
                self.expect(b':')?;
                self.expect(b'{')?;
                let mut props = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    let key = self.value()?;
                    let val = self.value()?;
                    props.push((key, val));
                }
                self.expect(b'}')?;
                Ok(Value::Object { class, props })
            }
            byte => Err(DecodeError::Unexpected {
                pos: self.pos - 1,
                byte,
            }),
        }
    }

    fn byte(&mut self) -> Result<u8, DecodeError> {
        let byte = *self
            .buf
            .get(self.pos)
            .ok_or(DecodeError::Truncated { pos: self.pos })?;
        self.pos += 1;
        Ok(byte)
    }

    fn expect(&mut self, want: u8) -> Result<(), DecodeError> {
        let byte = self.byte()?;
        if byte != want {
            return Err(DecodeError::Unexpected {
                pos: self.pos - 1,
                byte,
            });
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or(DecodeError::Truncated { pos: self.pos })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Unsigned decimal length field.
    fn length(&mut self) -> Result<usize, DecodeError> {
        let start = self.pos;
        while self.buf.get(self.pos).is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits = &self.buf[start..self.pos];
        if digits.is_empty() {
            return Err(DecodeError::BadLength { pos: start });
        }
        std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(DecodeError::BadLength { pos: start })
    }

    fn int(&mut self) -> Result<i64, DecodeError> {
        let start = self.pos;
        if self.buf.get(self.pos) == Some(&b'-') {
            self.pos += 1;
        }
        while self.buf.get(self.pos).is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits = &self.buf[start..self.pos];
        std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(DecodeError::BadInt { pos: start })
    }

    /// Float representation, captured verbatim up to the terminator.
    /// Accepts the digit/sign/exponent alphabet plus INF and NAN.
    fn float_repr(&mut self) -> Result<Vec<u8>, DecodeError> {
        let start = self.pos;
        while self.buf.get(self.pos).is_some_and(|b| {
            b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E' | b'I' | b'N' | b'F' | b'A')
        }) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(DecodeError::BadFloat { pos: start });
        }
        Ok(self.buf[start..self.pos].to_vec())
    }
}
