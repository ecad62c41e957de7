use dbshift_core::ReplacementSet;

use crate::tokens::TokenPool;
use crate::ReplaceError;

/// Replace every occurrence of every search key in `subject`, without
/// cascading: the output of one replacement is never re-examined by another.
///
/// Two phases over one token pool: first all search keys become opaque
/// tokens in a single simultaneous pass (longest key wins at each position),
/// then every token becomes its paired replacement. `{a→b, b→c}` applied to
/// `"a"` therefore yields `"b"`, never `"c"`.
///
/// Returns the rewritten bytes and the number of replacements made. An empty
/// replacement set is a zero-count no-op.
pub fn substitute(
    subject: &[u8],
    set: &ReplacementSet,
    pool: &mut TokenPool,
) -> Result<(Vec<u8>, u64), ReplaceError> {
    if set.is_empty() || subject.is_empty() {
        return Ok((subject.to_vec(), 0));
    }
    pool.refresh(set.len(), &[subject])?;
    Ok(apply(subject, set, pool))
}

/// [`substitute`] over a list of subjects with one shared token pool, so a
/// single non-cascading pass covers the whole collection consistently.
/// Counts are summed.
pub fn substitute_batch(
    subjects: &[Vec<u8>],
    set: &ReplacementSet,
    pool: &mut TokenPool,
) -> Result<(Vec<Vec<u8>>, u64), ReplaceError> {
    if set.is_empty() || subjects.is_empty() {
        return Ok((subjects.to_vec(), 0));
    }

    let refs: Vec<&[u8]> = subjects.iter().map(|s| s.as_slice()).collect();
    pool.refresh(set.len(), &refs)?;

    let mut out = Vec::with_capacity(subjects.len());
    let mut total = 0;
    for subject in subjects {
        let (rewritten, count) = apply(subject, set, pool);
        out.push(rewritten);
        total += count;
    }
    Ok((out, total))
}

fn apply(subject: &[u8], set: &ReplacementSet, pool: &TokenPool) -> (Vec<u8>, u64) {
    debug_assert_eq!(pool.len(), set.len());

    // Longest key first so no search key matches inside a longer key's span.
    let mut order: Vec<usize> = (0..set.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(set.pairs()[i].0.len()));

    let mut tokenized = Vec::with_capacity(subject.len());
    let mut count = 0u64;
    let mut pos = 0;
    'scan: while pos < subject.len() {
        for &i in &order {
            let key = set.pairs()[i].0.as_bytes();
            if subject[pos..].starts_with(key) {
                tokenized.extend_from_slice(&pool.tokens()[i]);
                pos += key.len();
                count += 1;
                continue 'scan;
            }
        }
        tokenized.push(subject[pos]);
        pos += 1;
    }

    // Tokens never overlap each other or remaining text; a plain scan
    // resolves them to the final replacements.
    let mut out = Vec::with_capacity(tokenized.len());
    let mut pos = 0;
    'resolve: while pos < tokenized.len() {
        for (i, token) in pool.tokens().iter().enumerate() {
            if tokenized[pos..].starts_with(token) {
                out.extend_from_slice(set.pairs()[i].1.as_bytes());
                pos += token.len();
                continue 'resolve;
            }
        }
        out.push(tokenized[pos]);
        pos += 1;
    }

    (out, count)
}
