//! Parser for the indented classification config.
//!
//! ```text
//! # comment
//! highway | 00000011111111111111 ; line-primary
//!   primary
//!     bridge
//! amenity
//! ```
//!
//! Two spaces of indentation per level. The optional `| mask` gives one
//! `0`/`1` per scale starting at scale 0 (missing trailing scales are
//! hidden, no mask at all means visible everywhere). The optional `; keys`
//! lists drawing-rule keys.

use crate::error::{FormatError, Result};
use crate::type_path::{PackedType, MAX_DEPTH};

use super::node::{ClassifNode, NodeId, SCALES_COUNT};

const INDENT: usize = 2;
const MAX_CHILDREN: usize = 256;

struct Line<'a> {
    depth: usize,
    name: &'a str,
    visibility: Option<u32>,
    rules: Vec<String>,
}

fn parse_visibility(s: &str, line: usize) -> Result<u32> {
    if s.len() > SCALES_COUNT as usize {
        return Err(FormatError::malformed(
            line,
            format!("visibility mask longer than {SCALES_COUNT} scales"),
        ));
    }
    let mut mask = 0u32;
    for (scale, c) in s.chars().enumerate() {
        match c {
            '1' => mask |= 1 << scale,
            '0' => {}
            other => {
                return Err(FormatError::malformed(
                    line,
                    format!("bad visibility character {other:?}"),
                ))
            }
        }
    }
    Ok(mask)
}

fn parse_line(raw: &str, line: usize) -> Result<Option<Line<'_>>> {
    let trimmed = raw.trim_end();
    let body = trimmed.trim_start_matches(' ');
    if body.is_empty() || body.starts_with('#') {
        return Ok(None);
    }
    if body.starts_with('\t') {
        return Err(FormatError::malformed(line, "tabs are not allowed"));
    }

    let indent = trimmed.len() - body.len();
    if indent % INDENT != 0 {
        return Err(FormatError::malformed(
            line,
            format!("indentation of {indent} spaces"),
        ));
    }

    let (head, rules) = match body.split_once(';') {
        Some((h, r)) => (
            h,
            r.split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_owned)
                .collect(),
        ),
        None => (body, Vec::new()),
    };

    let (name, visibility) = match head.split_once('|') {
        Some((n, v)) => (n.trim(), Some(parse_visibility(v.trim(), line)?)),
        None => (head.trim(), None),
    };

    if name.is_empty() {
        return Err(FormatError::malformed(line, "empty node name"));
    }
    if name.contains(char::is_whitespace) || name.contains('-') {
        return Err(FormatError::malformed(
            line,
            format!("invalid node name {name:?}"),
        ));
    }

    Ok(Some(Line {
        depth: indent / INDENT + 1,
        name,
        visibility,
        rules,
    }))
}

/// Builds the node arena; index 0 is the unnamed root.
pub(crate) fn build_tree(text: &str) -> Result<Vec<ClassifNode>> {
    let mut nodes = vec![ClassifNode::new(String::new(), None, PackedType::ROOT)];
    // stack[d] is the most recent node at depth d
    let mut stack: Vec<NodeId> = vec![0];

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let Some(line) = parse_line(raw, line_no)? else {
            continue;
        };

        if line.depth > MAX_DEPTH as usize {
            return Err(FormatError::malformed(
                line_no,
                format!("depth {} exceeds {MAX_DEPTH}", line.depth),
            ));
        }
        if line.depth > stack.len() {
            return Err(FormatError::malformed(
                line_no,
                "indentation skips a level",
            ));
        }
        stack.truncate(line.depth);
        let parent = stack[line.depth - 1];

        let siblings = &nodes[parent as usize].children;
        if siblings
            .iter()
            .any(|&c| nodes[c as usize].name == line.name)
        {
            return Err(FormatError::malformed(
                line_no,
                format!("duplicate node {:?}", line.name),
            ));
        }
        if siblings.len() >= MAX_CHILDREN {
            return Err(FormatError::malformed(
                line_no,
                format!("more than {MAX_CHILDREN} children"),
            ));
        }

        let packed = nodes[parent as usize]
            .packed
            .push(siblings.len() as u8)
            .map_err(|e| FormatError::malformed(line_no, e.to_string()))?;

        let id = nodes.len() as NodeId;
        let mut node = ClassifNode::new(line.name.to_owned(), Some(parent), packed);
        if let Some(v) = line.visibility {
            node.visibility = v;
        }
        node.draw_rules = line.rules;
        nodes.push(node);
        nodes[parent as usize].children.push(id);
        stack.push(id);
    }

    Ok(nodes)
}
