use std::collections::BTreeMap;

/// Split a full commit message into `(subject, body, trailers)`. Trailers
/// are the trailing run of `Key: value` lines, separated from the body by a
/// blank line -- the same shape git itself uses for `Signed-off-by` etc.
pub fn parse_message(message: &str) -> (String, String, BTreeMap<String, String>) {
    let mut lines: Vec<&str> = message.lines().collect();
    let subject = lines.first().copied().unwrap_or_default().to_string();
    if !lines.is_empty() {
        lines.remove(0);
    }
    while lines.first().map(|l| l.trim().is_empty()).unwrap_or(false) {
        lines.remove(0);
    }

    let mut trailer_start = lines.len();
    for (idx, line) in lines.iter().enumerate().rev() {
        if is_trailer_line(line) {
            trailer_start = idx;
        } else if line.trim().is_empty() {
            continue;
        } else {
            break;
        }
    }

    let body_lines = &lines[..trailer_start];
    let trailer_lines = &lines[trailer_start..];

    let body = body_lines
        .join("\n")
        .trim_end()
        .to_string();

    let mut trailers = BTreeMap::new();
    for line in trailer_lines {
        if let Some((k, v)) = line.split_once(':') {
            let key = k.trim();
            let value = v.trim();
            if !key.is_empty() && key.chars().next().unwrap().is_alphabetic() {
                trailers.insert(key.to_string(), value.to_string());
            }
        }
    }

    (subject, body, trailers)
}

fn is_trailer_line(line: &str) -> bool {
    match line.split_once(':') {
        Some((k, _)) => {
            !k.is_empty()
                && k.chars()
                    .next()
                    .map(|c| c.is_alphabetic())
                    .unwrap_or(false)
                && k.chars().all(|c| c.is_alphanumeric() || c == '-')
        }
        None => line.trim().is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_subject_body_and_trailers() {
        let msg = "task(T001): implement \"do thing\"\n\nruntime output here\n\nArborist-Step: implement\nArborist-Result: pass\nArborist-Retry: 0\n";
        let (subject, body, trailers) = parse_message(msg);
        assert_eq!(subject, "task(T001): implement \"do thing\"");
        assert_eq!(body, "runtime output here");
        assert_eq!(trailers.get("Arborist-Step"), Some(&"implement".to_string()));
        assert_eq!(trailers.get("Arborist-Retry"), Some(&"0".to_string()));
    }

    #[test]
    fn subject_only_has_no_trailers() {
        let (subject, body, trailers) = parse_message("task(T001): rollup");
        assert_eq!(subject, "task(T001): rollup");
        assert_eq!(body, "");
        assert!(trailers.is_empty());
    }
}
