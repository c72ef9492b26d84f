fn fold(ch: char) -> char {
    ch.to_lowercase().next().unwrap_or(ch)
}

pub fn fold_query(query: &str) -> Vec<char> {
    query.chars().map(fold).collect()
}

pub fn match_ranges(line: &str, needle: &[char]) -> Vec<(usize, usize)> {
    if needle.is_empty() || line.trim().is_empty() {
        return Vec::new();
    }

    let hay: Vec<char> = line.chars().map(fold).collect();
    let mut ranges = Vec::new();
    let mut i = 0usize;

    while i + needle.len() <= hay.len() {
        if hay[i..i + needle.len()] == *needle {
            ranges.push((i, i + needle.len()));
            i += needle.len();
        } else {
            i += 1;
        }
    }

    ranges
}

pub fn contains_folded(line: &str, needle: &[char]) -> bool {
    if needle.is_empty() {
        return false;
    }
    let hay: Vec<char> = line.chars().map(fold).collect();
    hay.windows(needle.len()).any(|window| window == needle)
}

/// Finds the next visual line containing `query`, starting just after
/// (`forward`) or just before `from` and wrapping around the buffer once.
pub fn find_line(lines: &[&str], query: &str, from: usize, forward: bool) -> Option<usize> {
    let needle = fold_query(query);
    if needle.is_empty() || lines.is_empty() {
        return None;
    }

    let len = lines.len();
    let hit = |index: &usize| contains_folded(lines[*index], &needle);

    if forward {
        let start = if from + 1 >= len { 0 } else { from + 1 };
        (start..len).chain(0..start).find(hit)
    } else {
        let start = match from.checked_sub(1) {
            Some(prev) => prev.min(len - 1),
            None => len - 1,
        };
        (0..=start).rev().chain((start + 1..len).rev()).find(hit)
    }
}
