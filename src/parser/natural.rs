use std::cmp::Ordering;

/// Digit-aware, case-insensitive comparison so "Ep 2" sorts before "Ep 10".
#[must_use]
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = Chunks::new(a);
    let mut right = Chunks::new(b);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = compare_chunks(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn compare_chunks(l: &str, r: &str) -> Ordering {
    let l_digits = l.starts_with(|c: char| c.is_ascii_digit());
    let r_digits = r.starts_with(|c: char| c.is_ascii_digit());

    match (l_digits, r_digits) {
        (true, true) => {
            let l_trim = l.trim_start_matches('0');
            let r_trim = r.trim_start_matches('0');
            l_trim
                .len()
                .cmp(&r_trim.len())
                .then_with(|| l_trim.cmp(r_trim))
                .then_with(|| l.len().cmp(&r.len()))
        }
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => l
            .chars()
            .flat_map(char::to_lowercase)
            .cmp(r.chars().flat_map(char::to_lowercase)),
    }
}

/// Splits a string into alternating runs of ASCII digits and everything else.
struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Chunks<'a> {
    const fn new(s: &'a str) -> Self {
        Self { rest: s }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = self
            .rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digits)
            .map_or(self.rest.len(), |(i, _)| i);
        let (chunk, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(chunk)
    }
}
