/// Canonical placeholder substituted for quoted literals and named parameters.
pub const PLACEHOLDER: &str = "{}";

/// Normalize step text for comparison.
///
/// Lower-cases, collapses whitespace and replaces every quoted substring,
/// `{name}` / `{name:fmt}` parameter and `<name>` outline placeholder with
/// [`PLACEHOLDER`]. Pure and deterministic.
pub fn normalize(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if (c == '"' || c == '\'') && at_word_start(&chars, i) {
            if let Some(end) = closing_quote(&chars, i) {
                out.push_str(PLACEHOLDER);
                i = end + 1;
                continue;
            }
        }

        if c == '{' {
            if let Some(end) = placeholder_end(&chars, i, '}', true) {
                out.push_str(PLACEHOLDER);
                i = end + 1;
                continue;
            }
        }

        if c == '<' {
            if let Some(end) = placeholder_end(&chars, i, '>', false) {
                out.push_str(PLACEHOLDER);
                i = end + 1;
                continue;
            }
        }

        out.push(c);
        i += 1;
    }

    out.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Named parameters declared by a step pattern, in order of appearance.
pub fn extract_parameters(pattern: &str) -> Vec<String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut params = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let close = match chars[i] {
            '{' => placeholder_end(&chars, i, '}', true).map(|e| (e, '}')),
            '<' => placeholder_end(&chars, i, '>', false).map(|e| (e, '>')),
            _ => None,
        };
        match close {
            Some((end, _)) => {
                let inner: String = chars[i + 1..end].iter().collect();
                let name = inner.split(':').next().unwrap_or("").to_string();
                if !name.is_empty() {
                    params.push(name);
                }
                i = end + 1;
            }
            None => i += 1,
        }
    }

    params
}

fn at_word_start(chars: &[char], i: usize) -> bool {
    i == 0 || !chars[i - 1].is_alphanumeric()
}

fn closing_quote(chars: &[char], open: usize) -> Option<usize> {
    let quote = chars[open];
    let mut j = open + 1;
    while j < chars.len() {
        if chars[j] == '\\' {
            j += 2;
            continue;
        }
        if chars[j] == quote {
            let at_word_end = chars.get(j + 1).is_none_or(|n| !n.is_alphanumeric());
            return at_word_end.then_some(j);
        }
        j += 1;
    }
    None
}

/// End index of `{ident}` / `{ident:fmt}` / `<ident>` starting at `open`.
/// `{}` counts as a placeholder when `allow_empty` is set.
fn placeholder_end(chars: &[char], open: usize, close: char, allow_empty: bool) -> Option<usize> {
    let mut j = open + 1;
    while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_') {
        j += 1;
    }
    let ident_len = j - open - 1;
    if ident_len == 0 && !(allow_empty && chars.get(j) == Some(&close)) {
        return None;
    }
    if close == '}' && chars.get(j) == Some(&':') {
        while j < chars.len() && chars[j] != '}' && !chars[j].is_whitespace() {
            j += 1;
        }
    }
    (chars.get(j) == Some(&close)).then_some(j)
}

// ============================================================================
// Similarity
// ============================================================================

/// Character-level Levenshtein distance.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// `1 - levenshtein(a, b) / max(len(a), len(b))`, in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Word-level differences turning `existing` into `candidate`, as
/// human-readable edits (`replace 'page' with 'screen'`).
pub fn word_diff(existing: &str, candidate: &str) -> Vec<String> {
    let a: Vec<&str> = existing.split_whitespace().collect();
    let b: Vec<&str> = candidate.split_whitespace().collect();

    // LCS table
    let mut lcs = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut edits = Vec::new();
    let mut removed: Vec<&str> = Vec::new();
    let mut added: Vec<&str> = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < a.len() || j < b.len() {
        if i < a.len() && j < b.len() && a[i] == b[j] {
            flush_edit(&mut edits, &mut removed, &mut added);
            i += 1;
            j += 1;
        } else if j < b.len() && (i == a.len() || lcs[i][j + 1] >= lcs[i + 1][j]) {
            added.push(b[j]);
            j += 1;
        } else {
            removed.push(a[i]);
            i += 1;
        }
    }
    flush_edit(&mut edits, &mut removed, &mut added);

    edits
}

fn flush_edit(edits: &mut Vec<String>, removed: &mut Vec<&str>, added: &mut Vec<&str>) {
    match (removed.is_empty(), added.is_empty()) {
        (true, true) => {}
        (false, true) => edits.push(format!("remove '{}'", removed.join(" "))),
        (true, false) => edits.push(format!("insert '{}'", added.join(" "))),
        (false, false) => edits.push(format!(
            "replace '{}' with '{}'",
            removed.join(" "),
            added.join(" ")
        )),
    }
    removed.clear();
    added.clear();
}
