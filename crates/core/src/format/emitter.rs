use serde_yaml::{Mapping, Sequence, Value};

use crate::error::{Result, SynthesisError};

/// Characters that end a plain scalar inside a flow collection.
const FLOW_INDICATORS: &[char] = &[',', '[', ']', '{', '}', ':'];
/// Characters that cannot start a plain scalar inside a flow collection.
const LEADING_INDICATORS: &[char] = &[
    '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%', '@', '`',
];

/// Location of a node inside the document being emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
    /// A mapping key that is not a string.
    OtherKey,
}

/// Block-style YAML writer with per-path flow sequences.
///
/// Layout follows `serde_yaml`: two-space mapping indent, sequences under a key
/// at the key's own indent, `[]`/`{}` for empty collections. Scalar quoting is
/// delegated to `serde_yaml` so plain/quoted decisions match its output.
pub struct Emitter<F> {
    out: String,
    path: Vec<PathSegment>,
    flow: F,
}

impl<F> Emitter<F>
where
    F: Fn(&[PathSegment]) -> bool,
{
    /// `flow` is asked, for every non-empty sequence, whether it should be inline.
    pub fn new(flow: F) -> Self {
        Self {
            out: String::new(),
            path: Vec::new(),
            flow,
        }
    }

    pub fn emit(mut self, value: &Value) -> Result<String> {
        match value {
            Value::Mapping(map) if !map.is_empty() => self.block_mapping(map, 0, false)?,
            Value::Sequence(seq) if !seq.is_empty() && !self.is_flow() => {
                self.block_sequence(seq, 0, false)?
            }
            other => {
                let text = inline(other, false)?;
                self.out.push_str(&text);
                self.out.push('\n');
            }
        }
        Ok(self.out)
    }

    fn is_flow(&self) -> bool {
        (self.flow)(&self.path)
    }

    fn block_mapping(&mut self, map: &Mapping, indent: usize, same_line: bool) -> Result<()> {
        for (position, (key, value)) in map.iter().enumerate() {
            if position > 0 || !same_line {
                self.pad(indent);
            }
            let key_text = inline(key, false)?;
            self.out.push_str(&key_text);
            self.out.push(':');

            self.path.push(match key {
                Value::String(key) => PathSegment::Key(key.clone()),
                _ => PathSegment::OtherKey,
            });
            match value {
                Value::Mapping(child) if !child.is_empty() => {
                    self.out.push('\n');
                    self.block_mapping(child, indent + 2, false)?;
                }
                Value::Sequence(child) if !child.is_empty() && !self.is_flow() => {
                    self.out.push('\n');
                    self.block_sequence(child, indent, false)?;
                }
                other => self.trailing_inline(other)?,
            }
            self.path.pop();
        }
        Ok(())
    }

    fn block_sequence(&mut self, seq: &Sequence, indent: usize, same_line: bool) -> Result<()> {
        for (index, item) in seq.iter().enumerate() {
            if index > 0 || !same_line {
                self.pad(indent);
            }
            self.out.push('-');

            self.path.push(PathSegment::Index(index));
            match item {
                Value::Mapping(child) if !child.is_empty() => {
                    self.out.push(' ');
                    self.block_mapping(child, indent + 2, true)?;
                }
                Value::Sequence(child) if !child.is_empty() && !self.is_flow() => {
                    self.out.push(' ');
                    self.block_sequence(child, indent + 2, true)?;
                }
                other => self.trailing_inline(other)?,
            }
            self.path.pop();
        }
        Ok(())
    }

    fn trailing_inline(&mut self, value: &Value) -> Result<()> {
        let text = inline(value, false)?;
        self.out.push(' ');
        self.out.push_str(&text);
        self.out.push('\n');
        Ok(())
    }

    fn pad(&mut self, indent: usize) {
        self.out.extend(std::iter::repeat(' ').take(indent));
    }
}

/// Renders a value on a single line, collections in flow style.
fn inline(value: &Value, in_flow: bool) -> Result<String> {
    match value {
        Value::Sequence(items) => {
            let items = items
                .iter()
                .map(|item| inline(item, true))
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("[{}]", items.join(", ")))
        }
        Value::Mapping(entries) => {
            let entries = entries
                .iter()
                .map(|(key, value)| -> Result<String> {
                    Ok(format!("{}: {}", inline(key, true)?, inline(value, true)?))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("{{{}}}", entries.join(", ")))
        }
        Value::Tagged(tagged) => Ok(format!("{} {}", tagged.tag, inline(&tagged.value, in_flow)?)),
        Value::String(text) => string_scalar(text, in_flow),
        scalar => plain_scalar(scalar),
    }
}

fn string_scalar(text: &str, in_flow: bool) -> Result<String> {
    if !(in_flow && needs_flow_quotes(text)) {
        let rendered = plain_scalar(&Value::from(text))?;
        if !rendered.contains('\n') {
            return Ok(rendered);
        }
    }
    // JSON string syntax is a valid YAML double-quoted scalar.
    serde_json::to_string(text).map_err(|err| SynthesisError::Render(err.to_string()))
}

/// Whether a plain rendering of `text` would be read back differently inside `[...]`.
fn needs_flow_quotes(text: &str) -> bool {
    text.starts_with(LEADING_INDICATORS) || text.contains(FLOW_INDICATORS) || text.contains(" #")
}

fn plain_scalar(value: &Value) -> Result<String> {
    let rendered =
        serde_yaml::to_string(value).map_err(|err| SynthesisError::Render(err.to_string()))?;
    Ok(rendered.trim_end_matches('\n').to_string())
}
