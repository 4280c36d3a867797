use arborist_core::trailers::Trailers;

/// Assemble a commit message from subject, body, and trailers in the shape
/// `trailer_parse::parse_message` expects to split back apart: subject
/// line, blank line, body, blank line, trailer lines.
pub fn build(subject: &str, body: &str, trailers: &Trailers) -> String {
    let lines = trailers.to_lines();
    if body.trim().is_empty() {
        format!("{subject}\n\n{}", lines.join("\n"))
    } else {
        format!("{subject}\n\n{body}\n\n{}", lines.join("\n"))
    }
}

/// ISO-8601-ish timestamp safe for filenames (colons replaced with dashes),
/// per the `<task-id>_<step>_<iso_timestamp>.log` convention in spec §6.
pub fn filename_timestamp(now: chrono::DateTime<chrono::Utc>) -> String {
    now.format("%Y-%m-%dT%H-%M-%SZ").to_string()
}
