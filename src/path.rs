//! Deep get/set on nested JSON values using dotted and bracketed paths.
//!
//! Paths look like `user.name`, `coords[0].lat`, or `matrix[1][0]`.
//! Bracketed keys may be quoted to carry dots: `labels["en.US"]`.

use serde_json::{Map, Value};

/// One step of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Object key (`a.b`, `a["b"]`).
    Key(String),
    /// Array index (`a[0]`).
    Index(usize),
}

/// Split a path string into segments.
///
/// Parsing is lenient: an unterminated bracket is read as a plain key,
/// empty segments from `a..b` are dropped.
pub fn parse(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '.' => flush(&mut current, &mut segments),
            '[' => {
                flush(&mut current, &mut segments);
                let mut inner = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    inner.push(c);
                }
                if !closed {
                    current.push('[');
                    current.push_str(&inner);
                    continue;
                }
                segments.push(bracket_segment(&inner));
            }
            _ => current.push(c),
        }
    }
    flush(&mut current, &mut segments);
    segments
}

fn flush(current: &mut String, segments: &mut Vec<Segment>) {
    if !current.is_empty() {
        segments.push(Segment::Key(std::mem::take(current)));
    }
}

fn bracket_segment(inner: &str) -> Segment {
    let trimmed = inner.trim();
    for quote in ['"', '\''] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return Segment::Key(trimmed[1..trimmed.len() - 1].to_string());
        }
    }
    match trimmed.parse::<usize>() {
        Ok(i) => Segment::Index(i),
        Err(_) => Segment::Key(trimmed.to_string()),
    }
}

/// Fetch the value at `path`.
///
/// Returns `None` when any intermediate step is missing. A present `null`,
/// `false` or `0` comes back as `Some`.
pub fn get<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    let segments = parse(path);
    if segments.is_empty() {
        return None;
    }
    segments
        .iter()
        .try_fold(tree, |node, segment| step(node, segment))
}

fn step<'a>(node: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (node, segment) {
        (Value::Object(map), Segment::Key(k)) => map.get(k),
        (Value::Object(map), Segment::Index(i)) => map.get(&i.to_string()),
        (Value::Array(arr), Segment::Index(i)) => arr.get(*i),
        // `list.0` addresses an element the same way `list[0]` does
        (Value::Array(arr), Segment::Key(k)) => k.parse::<usize>().ok().and_then(|i| arr.get(i)),
        _ => None,
    }
}

/// Write `value` at `path`, creating intermediate containers.
///
/// An index segment creates an array (padded with `null`), a key segment an
/// object. A scalar sitting where a container is needed gets replaced.
/// An empty path replaces the whole tree.
pub fn set(tree: &mut Value, path: &str, value: Value) {
    let segments = parse(path);
    let Some((last, parents)) = segments.split_last() else {
        *tree = value;
        return;
    };

    let mut node = tree;
    for (i, segment) in parents.iter().enumerate() {
        let next = &segments[i + 1];
        node = slot(node, segment, || empty_container(next));
    }
    *slot(node, last, || Value::Null) = value;
}

fn empty_container(next: &Segment) -> Value {
    match next {
        Segment::Index(_) => Value::Array(Vec::new()),
        Segment::Key(_) => Value::Object(Map::new()),
    }
}

/// Borrow the child slot for `segment`, coercing `node` into the matching
/// container kind and filling a missing child with `fresh()`.
fn slot<'a>(node: &'a mut Value, segment: &Segment, fresh: impl FnOnce() -> Value) -> &'a mut Value {
    match segment {
        Segment::Key(k) => {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            let Value::Object(map) = node else {
                unreachable!("node was just made an object")
            };
            map.entry(k.clone()).or_insert_with(fresh)
        }
        Segment::Index(i) => {
            if !node.is_array() {
                *node = Value::Array(Vec::new());
            }
            let Value::Array(arr) = node else {
                unreachable!("node was just made an array")
            };
            if arr.len() <= *i {
                arr.resize(*i + 1, Value::Null);
                arr[*i] = fresh();
            }
            &mut arr[*i]
        }
    }
}
