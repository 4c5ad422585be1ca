//! Default key syntax: `window.size(1).width[@unit]`
//!
//! - `.` separates node names; a doubled `..` is a literal dot inside a name
//! - `(n)` selects the n-th (0-based) same-named child of each parent
//! - a trailing `[@name]` addresses an attribute of the selected nodes
//!
//! The empty key addresses the root.

use prefsync::config_adapter::{ExpressionEngine, NodeAddData, QueryResult};
use prefsync::config_tree::ConfigNode;
use prefsync::prelude::*;

const DELIMITER: char = '.';
const ESCAPED_DELIMITER: &str = "..";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
	name: String,
	index: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct KeyPath {
	segments: Vec<Segment>,
	attribute: Option<String>,
}

/// Split an index suffix `name(n)` off a raw segment
fn split_index(raw: &str) -> (String, Option<usize>) {
	if let Some(stripped) = raw.strip_suffix(')')
		&& let Some(open) = stripped.rfind('(')
		&& open > 0
		&& let Ok(index) = stripped[open + 1..].parse::<usize>()
	{
		return (stripped[..open].to_string(), Some(index));
	}
	(raw.to_string(), None)
}

fn parse_key(key: &str) -> PsResult<KeyPath> {
	let mut path = KeyPath::default();

	let mut body = key;
	if let Some(stripped) = key.strip_suffix(']')
		&& let Some(open) = stripped.rfind("[@")
	{
		let attribute = &stripped[open + 2..];
		if attribute.is_empty() {
			return Err(Error::Parse(format!("empty attribute name in '{}'", key)));
		}
		path.attribute = Some(attribute.to_string());
		body = &key[..open];
	}
	if body.contains("[@") {
		return Err(Error::Parse(format!("attribute in the middle of '{}'", key)));
	}
	if body.is_empty() {
		return Ok(path);
	}

	let mut current = String::new();
	let mut chars = body.chars().peekable();
	while let Some(c) = chars.next() {
		if c == DELIMITER {
			if chars.peek() == Some(&DELIMITER) {
				chars.next();
				current.push(DELIMITER);
				continue;
			}
			if current.is_empty() {
				return Err(Error::Parse(format!("empty node name in '{}'", key)));
			}
			let (name, index) = split_index(&current);
			path.segments.push(Segment { name, index });
			current.clear();
		} else {
			current.push(c);
		}
	}
	if current.is_empty() {
		return Err(Error::Parse(format!("empty node name in '{}'", key)));
	}
	let (name, index) = split_index(&current);
	path.segments.push(Segment { name, index });

	Ok(path)
}

fn escape_name(name: &str) -> String {
	name.replace(DELIMITER, ESCAPED_DELIMITER)
}

/// Children of `parent` selected by one key segment
fn select<'a>(parent: &'a ConfigNode, segment: &Segment) -> Vec<&'a ConfigNode> {
	let mut matching = parent.children_named(&segment.name);
	match segment.index {
		Some(index) => matching.nth(index).into_iter().collect(),
		None => matching.collect(),
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExpressionEngine;

impl DefaultExpressionEngine {
	pub fn new() -> Self {
		Self
	}
}

impl ExpressionEngine for DefaultExpressionEngine {
	fn query(&self, root: &ConfigNode, key: &str) -> PsResult<Vec<QueryResult>> {
		let path = parse_key(key)?;

		let mut nodes = vec![root];
		for segment in &path.segments {
			nodes = nodes.into_iter().flat_map(|node| select(node, segment)).collect();
			if nodes.is_empty() {
				return Ok(Vec::new());
			}
		}

		Ok(match path.attribute {
			Some(attribute) => nodes
				.into_iter()
				.filter(|node| node.attribute(&attribute).is_some())
				.map(|node| QueryResult::Attribute {
					parent: node.clone(),
					name: attribute.as_str().into(),
				})
				.collect(),
			None => nodes.into_iter().map(|node| QueryResult::Node(node.clone())).collect(),
		})
	}

	fn node_key(&self, node: &ConfigNode, parent_key: &str) -> String {
		if node.name().is_empty() {
			return parent_key.to_string();
		}
		if parent_key.is_empty() {
			escape_name(node.name())
		} else {
			format!("{}{}{}", parent_key, DELIMITER, escape_name(node.name()))
		}
	}

	fn attribute_key(&self, parent_key: &str, name: &str) -> String {
		format!("{}[@{}]", parent_key, name)
	}

	fn prepare_add(&self, root: &ConfigNode, key: &str) -> PsResult<NodeAddData> {
		let mut path = parse_key(key)?;

		let (new_name, is_attribute) = match path.attribute.take() {
			Some(attribute) => (attribute, true),
			None => match path.segments.pop() {
				Some(Segment { index: Some(_), .. }) => {
					return Err(Error::Parse(format!("cannot add an indexed node: '{}'", key)));
				}
				Some(Segment { name, index: None }) => (name, false),
				None => return Err(Error::Parse("cannot add the root node".into())),
			},
		};

		let mut parent = root.clone();
		let mut remaining = path.segments.into_iter();
		let mut path_nodes = Vec::new();
		for segment in remaining.by_ref() {
			// Without an index the last same-named child receives the addition
			let found = match segment.index {
				Some(index) => parent.children_named(&segment.name).nth(index).cloned(),
				None => parent.children_named(&segment.name).last().cloned(),
			};
			match found {
				Some(child) => parent = child,
				None if segment.index.is_some() => {
					return Err(Error::Parse(format!(
						"index on a non-existing node '{}' in '{}'",
						segment.name, key
					)));
				}
				None => {
					path_nodes.push(segment.name);
					break;
				}
			}
		}
		for segment in remaining {
			if segment.index.is_some() {
				return Err(Error::Parse(format!(
					"index on a non-existing node '{}' in '{}'",
					segment.name, key
				)));
			}
			path_nodes.push(segment.name);
		}

		Ok(NodeAddData { parent, path_nodes, new_name, is_attribute })
	}
}


// vim: ts=4
