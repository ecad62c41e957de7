use rand::RngCore;

use crate::ReplaceError;

/// Pool of opaque intermediate markers used to make a multi-pattern replace
/// atomic. Tokens are minted from OS entropy and collision-checked against
/// both the pool and the subject text, so no token can occur in the data
/// being rewritten. The pool is scoped to one substitution call; callers
/// refresh it against every new subject.
#[derive(Debug, Default)]
pub struct TokenPool {
    tokens: Vec<Vec<u8>>,
}

impl TokenPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[Vec<u8>] {
        &self.tokens
    }

    /// Bring the pool to exactly `size` tokens, none of which occur in any
    /// of `subjects`. Existing tokens that do occur are dropped and replaced
    /// with freshly minted ones.
    pub fn refresh(&mut self, size: usize, subjects: &[&[u8]]) -> Result<(), ReplaceError> {
        self.tokens
            .retain(|t| !subjects.iter().any(|s| contains(s, t)));
        self.tokens.truncate(size);

        while self.tokens.len() < size {
            let token = loop {
                let candidate = mint()?;
                let collides = self.tokens.contains(&candidate)
                    || subjects.iter().any(|s| contains(s, &candidate));
                if !collides {
                    break candidate;
                }
            };
            self.tokens.push(token);
        }
        Ok(())
    }
}

/// Whether `needle` occurs anywhere in `haystack`.
pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle, 0).is_some()
}

/// First occurrence of `needle` in `haystack` at or after `from`.
pub(crate) fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Mint one token: 34 uppercase hex characters from 17 random bytes, framed
/// with SUB control bytes so no plausible stored text contains the shape.
fn mint() -> Result<Vec<u8>, ReplaceError> {
    let mut bytes = [0u8; 17];
    rand::rngs::OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| ReplaceError::Entropy(e.to_string()))?;

    let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
    let chunks: Vec<&str> = vec![&hex[0..8], &hex[8..16], &hex[16..24], &hex[24..32], &hex[32..34]];
    let token = format!(
        "##\u{1A}__{{DBSIRS{}-{}-{}-{}-{}}}__\u{1A}##",
        chunks[4], chunks[0], chunks[1], chunks[2], chunks[3]
    );
    Ok(token.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_fills_to_size() {
        let mut pool = TokenPool::new();
        pool.refresh(3, &[b"some subject"]).unwrap();
        assert_eq!(pool.len(), 3);
        // all distinct
        let t = pool.tokens();
        assert_ne!(t[0], t[1]);
        assert_ne!(t[1], t[2]);
    }

    #[test]
    fn refresh_drops_tokens_found_in_subject() {
        let mut pool = TokenPool::new();
        pool.refresh(2, &[b"x"]).unwrap();
        let leaked = pool.tokens()[0].clone();

        let mut subject = b"prefix ".to_vec();
        subject.extend_from_slice(&leaked);
        pool.refresh(2, &[subject.as_slice()]).unwrap();

        assert_eq!(pool.len(), 2);
        assert!(pool.tokens().iter().all(|t| *t != leaked));
        assert!(pool.tokens().iter().all(|t| !contains(&subject, t)));
    }

    #[test]
    fn refresh_shrinks_pool() {
        let mut pool = TokenPool::new();
        pool.refresh(4, &[b""]).unwrap();
        pool.refresh(1, &[b""]).unwrap();
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn find_byte_subsequences() {
        assert_eq!(find(b"abcabc", b"bc", 0), Some(1));
        assert_eq!(find(b"abcabc", b"bc", 2), Some(4));
        assert_eq!(find(b"abc", b"xyz", 0), None);
        assert_eq!(find(b"ab", b"abc", 0), None);
    }
}
