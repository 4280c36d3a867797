//! Markdown-directory-to-`TaskTree` parser, per spec §4.3. A narrow
//! structured subset, not general prose, so this is a line-oriented scan
//! with `regex` for the three fixed patterns rather than a full Markdown
//! AST -- the same reach-for-`regex`-on-structured-text instinct the pack
//! shows for log/porcelain parsing rather than hand-rolled state machines.

use crate::error::{SpecError, SpecResult};
use arborist_core::model::{TaskNode, TaskTree};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn phase_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#{2,}\s*Phase\s+(\d+)\s*:\s*(.+?)\s*$").unwrap())
}

fn generic_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{2,})\s*(.+?)\s*$").unwrap())
}

fn task_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*-\s*\[\s*\]\s*(T\w+)\s*(\[P\])?\s*(.*)$").unwrap())
}

fn dependency_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:→|->)").unwrap())
}

struct Line<'a> {
    file: &'a Path,
    number: usize,
    text: &'a str,
}

/// Parse a directory of markdown files into a `TaskTree`. Files are visited
/// in sorted filename order so that, given the same input bytes, the parser
/// always produces the same tree (spec §4.3 determinism requirement).
pub fn parse_spec_dir(spec_dir: &Path, spec_id: &str, namespace: &str) -> SpecResult<TaskTree> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(spec_dir)
        .map_err(|e| SpecError {
            file: spec_dir.to_path_buf(),
            line: 0,
            reason: format!("cannot read spec directory: {e}"),
        })?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("md"))
        .collect();
    entries.sort();

    let mut tree = TaskTree::new(spec_id, namespace);
    let mut header_stack: Vec<(usize, String)> = Vec::new(); // (level, id)
    let mut pending_deps: Vec<(String, Vec<String>, PathBuf, usize)> = Vec::new();
    let mut in_dependencies_section = false;
    let mut in_fence = false;

    for path in &entries {
        let contents = std::fs::read_to_string(path).map_err(|e| SpecError {
            file: path.clone(),
            line: 0,
            reason: format!("cannot read file: {e}"),
        })?;

        for (idx, text) in contents.lines().enumerate() {
            let line = Line {
                file: path,
                number: idx + 1,
                text,
            };

            if text.trim_start().starts_with("```") {
                in_fence = !in_fence;
                continue;
            }

            // A header- or task-item-shaped line inside a fenced code block
            // (a sample or example snippet) is not a real phase/task
            // boundary -- except the `Dependencies` block itself, which is
            // always fenced and whose content is handled below regardless
            // of fence state.
            if !in_fence {
                if let Some(caps) = generic_header_re().captures(text) {
                    let level = caps[1].len();
                    let title = caps[2].to_string();
                    in_dependencies_section = title.eq_ignore_ascii_case("dependencies");
                    if in_dependencies_section {
                        continue;
                    }

                    while header_stack.last().map(|(l, _)| *l >= level).unwrap_or(false) {
                        header_stack.pop();
                    }

                    let id = if let Some(caps) = phase_header_re().captures(text) {
                        format!("phase{}", &caps[1])
                    } else {
                        slugify(&title)
                    };

                    let parent_id = header_stack.last().map(|(_, id)| id.clone());
                    insert_node(&mut tree, &id, &title, parent_id, &line)?;
                    header_stack.push((level, id));
                    continue;
                }
            }

            if in_dependencies_section {
                if text.trim().is_empty() {
                    continue;
                }
                parse_dependency_line(&line, &mut pending_deps)?;
                continue;
            }

            if in_fence {
                continue;
            }

            if let Some(caps) = task_item_re().captures(text) {
                let id = caps[1].to_string();
                let parallel = caps.get(2).is_some();
                let description = caps[3].trim().to_string();
                let parent_id = header_stack.last().map(|(_, id)| id.clone());

                if tree.nodes.contains_key(&id) {
                    return Err(SpecError {
                        file: line.file.to_path_buf(),
                        line: line.number,
                        reason: format!("duplicate task id: {id}"),
                    });
                }

                let node = TaskNode {
                    id: id.clone(),
                    name: id.clone(),
                    description,
                    parent_id: parent_id.clone(),
                    children_ids: vec![],
                    depends_on: vec![],
                    parallelizable: parallel,
                };
                tree.nodes.insert(id.clone(), node);
                attach_child(&mut tree, parent_id, &id, &line)?;
            }
        }

        header_stack.clear();
    }

    for (source, targets, file, line_no) in pending_deps {
        if !tree.nodes.contains_key(&source) {
            return Err(SpecError {
                file,
                line: line_no,
                reason: format!("unknown dependency source id: {source}"),
            });
        }
        for target in targets {
            if !tree.nodes.contains_key(&target) {
                return Err(SpecError {
                    file,
                    line: line_no,
                    reason: format!("unknown dependency target id: {target}"),
                });
            }
            let node = tree.nodes.get_mut(&target).expect("checked above");
            if !node.depends_on.contains(&source) {
                node.depends_on.push(source.clone());
            }
        }
    }

    tree.validate().map_err(|e| SpecError {
        file: spec_dir.to_path_buf(),
        line: 0,
        reason: e.to_string(),
    })?;

    Ok(tree)
}

fn insert_node(
    tree: &mut TaskTree,
    id: &str,
    title: &str,
    parent_id: Option<String>,
    line: &Line,
) -> SpecResult<()> {
    if tree.nodes.contains_key(id) {
        return Ok(()); // a header revisited across files; idempotent.
    }
    tree.nodes.insert(
        id.to_string(),
        TaskNode {
            id: id.to_string(),
            name: title.to_string(),
            description: String::new(),
            parent_id: parent_id.clone(),
            children_ids: vec![],
            depends_on: vec![],
            parallelizable: false,
        },
    );
    attach_child(tree, parent_id, id, line)
}

fn attach_child(
    tree: &mut TaskTree,
    parent_id: Option<String>,
    id: &str,
    _line: &Line,
) -> SpecResult<()> {
    match parent_id {
        Some(parent) => {
            if let Some(parent_node) = tree.nodes.get_mut(&parent) {
                if !parent_node.children_ids.contains(&id.to_string()) {
                    parent_node.children_ids.push(id.to_string());
                }
            }
        }
        None => {
            if !tree.root_ids.contains(&id.to_string()) {
                tree.root_ids.push(id.to_string());
            }
        }
    }
    Ok(())
}

/// Parse one `Dependencies` block line, e.g. `T001 → T002, T003`.
/// A second arrow on the same line is rejected as ambiguous, resolving the
/// comma/arrow precedence Open Question per the expanded spec.
fn parse_dependency_line(
    line: &Line,
    out: &mut Vec<(String, Vec<String>, PathBuf, usize)>,
) -> SpecResult<()> {
    let arrow_count = dependency_line_re().find_iter(line.text).count();
    if arrow_count == 0 {
        return Ok(());
    }
    if arrow_count > 1 {
        return Err(SpecError {
            file: line.file.to_path_buf(),
            line: line.number,
            reason: format!(
                "ambiguous dependency rule (multiple arrows on one line): \"{}\"",
                line.text.trim()
            ),
        });
    }

    let parts: Vec<&str> = dependency_line_re().splitn(line.text, 2).collect();
    let source = parts[0].trim().to_string();
    let targets: Vec<String> = parts
        .get(1)
        .map(|rest| rest.split(',').map(|t| t.trim().to_string()).collect())
        .unwrap_or_default();

    if source.is_empty() || targets.is_empty() || targets.iter().any(|t| t.is_empty()) {
        return Err(SpecError {
            file: line.file.to_path_buf(),
            line: line.number,
            reason: format!("malformed dependency line: \"{}\"", line.text.trim()),
        });
    }

    out.push((source, targets, line.file.to_path_buf(), line.number));
    Ok(())
}

fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let mut last_was_dash = false;
    for c in title.chars() {
        if c.is_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    slug.trim_matches('-').to_string()
}
