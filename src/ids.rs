/// Canonical key of a semester group: `degree_stream_batch_sem{N}_{section}` with every
/// whitespace run collapsed into a single underscore.
///
/// Empty names yield empty segments rather than an error; callers resolve and validate
/// the names before building the id.
pub fn canonical_group_id(
    degree_name: &str,
    stream_name: &str,
    batch_name: &str,
    semester_no: u32,
    section: &str,
) -> String {
    let raw = format!(
        "{}_{}_{}_sem{}_{}",
        degree_name, stream_name, batch_name, semester_no, section
    );
    collapse_whitespace(&raw)
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_run = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !in_run {
                out.push('_');
                in_run = true;
            }
        } else {
            out.push(ch);
            in_run = false;
        }
    }
    out
}

/// Splits comma-separated form text ("Maths, Physics,,Chem ") into trimmed, non-empty items.
pub fn parse_list_field(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
