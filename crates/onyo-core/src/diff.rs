//! Line-oriented unified diff for asset documents.
//!
//! Asset bodies are small, so a quadratic LCS table is fine and keeps the
//! hunks minimal (no heuristic splits).

/// Render a unified diff of `old` against `new` with `context` lines of
/// context. Returns an empty string when the inputs are equal.
#[must_use]
pub fn unified(old: &str, new: &str, context: usize) -> String {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    if old_lines == new_lines {
        return String::new();
    }

    let edits = edit_script(&old_lines, &new_lines);
    render_hunks(&old_lines, &new_lines, &edits, context)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Edit {
    Keep,
    Delete,
    Insert,
}

/// LCS-based edit script over line indices: a sequence of Keep/Delete/Insert
/// steps consuming `old` and `new` front to back.
fn edit_script(old: &[&str], new: &[&str]) -> Vec<Edit> {
    let n = old.len();
    let m = new.len();
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old[i] == new[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut edits = vec![];
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            edits.push(Edit::Keep);
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            edits.push(Edit::Delete);
            i += 1;
        } else {
            edits.push(Edit::Insert);
            j += 1;
        }
    }
    edits.extend(std::iter::repeat(Edit::Delete).take(n - i));
    edits.extend(std::iter::repeat(Edit::Insert).take(m - j));
    edits
}

fn render_hunks(old: &[&str], new: &[&str], edits: &[Edit], context: usize) -> String {
    // Positions of non-Keep edits, for grouping into hunks.
    let changed: Vec<usize> = edits
        .iter()
        .enumerate()
        .filter(|(_, e)| **e != Edit::Keep)
        .map(|(idx, _)| idx)
        .collect();

    // Map each edit index to the (old, new) line numbers it starts at.
    let mut old_at = vec![0usize; edits.len() + 1];
    let mut new_at = vec![0usize; edits.len() + 1];
    let (mut oi, mut ni) = (0, 0);
    for (idx, edit) in edits.iter().enumerate() {
        old_at[idx] = oi;
        new_at[idx] = ni;
        match edit {
            Edit::Keep => {
                oi += 1;
                ni += 1;
            }
            Edit::Delete => oi += 1,
            Edit::Insert => ni += 1,
        }
    }
    old_at[edits.len()] = oi;
    new_at[edits.len()] = ni;

    let mut out = String::new();
    let mut group_start = 0;
    while group_start < changed.len() {
        // Extend the group while gaps between changes fit inside 2*context.
        let mut group_end = group_start;
        while group_end + 1 < changed.len()
            && changed[group_end + 1] - changed[group_end] <= 2 * context
        {
            group_end += 1;
        }

        let lo = changed[group_start].saturating_sub(context);
        let hi = (changed[group_end] + context + 1).min(edits.len());

        let old_start = old_at[lo];
        let new_start = new_at[lo];
        let old_count = old_at[hi] - old_start;
        let new_count = new_at[hi] - new_start;
        out.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            old_start + 1,
            old_count,
            new_start + 1,
            new_count
        ));

        let (mut oi, mut ni) = (old_start, new_start);
        for edit in &edits[lo..hi] {
            match edit {
                Edit::Keep => {
                    out.push_str(&format!(" {}\n", old[oi]));
                    oi += 1;
                    ni += 1;
                }
                Edit::Delete => {
                    out.push_str(&format!("-{}\n", old[oi]));
                    oi += 1;
                }
                Edit::Insert => {
                    out.push_str(&format!("+{}\n", new[ni]));
                    ni += 1;
                }
            }
        }

        group_start = group_end + 1;
    }
    out
}
