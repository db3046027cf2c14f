use std::cell::RefCell;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::attr_pattern::{AttributePatternDefinition, Interpretation, SyntaxInterpreter};
use crate::error::{Result, TemplateError};

/// A markup attribute split into binding target and command.
/// `command` is `None` for plain attributes (static or interpolated).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrSyntax {
    pub raw_name: String,
    pub raw_value: String,
    pub target: String,
    pub command: Option<String>,
}

impl AttrSyntax {
    pub fn new(raw_name: &str, raw_value: &str, target: &str, command: Option<&str>) -> Self {
        Self {
            raw_name: raw_name.to_string(),
            raw_value: raw_value.to_string(),
            target: target.to_string(),
            command: command.map(str::to_string),
        }
    }
}

/// Builds an [`AttrSyntax`] from `(raw_name, raw_value, parts)`.
pub type PatternHandler = fn(&str, &str, &[String]) -> AttrSyntax;

/// A pattern definition paired with the handler that interprets its parts.
#[derive(Debug, Clone)]
pub struct AttributePattern {
    pub definition: AttributePatternDefinition,
    pub handler: PatternHandler,
}

impl AttributePattern {
    pub fn new(pattern: &str, symbols: &str, handler: PatternHandler) -> Self {
        Self {
            definition: AttributePatternDefinition::new(pattern, symbols),
            handler,
        }
    }
}

fn part(parts: &[String], i: usize) -> &str {
    parts.get(i).map(String::as_str).unwrap_or("")
}

/// `target.command` and `target.ignored.command`.
pub fn dot_separated_patterns() -> Vec<AttributePattern> {
    vec![
        AttributePattern::new("PART.PART", ".", |name, value, parts| {
            AttrSyntax::new(name, value, part(parts, 0), Some(part(parts, 1)))
        }),
        AttributePattern::new("PART.PART.PART", ".", |name, value, parts| {
            AttrSyntax::new(name, value, part(parts, 0), Some(part(parts, 2)))
        }),
    ]
}

/// `ref` and `target.ref`.
pub fn ref_patterns() -> Vec<AttributePattern> {
    vec![
        AttributePattern::new("ref", "", |name, value, _| AttrSyntax::new(name, value, "element", Some("ref"))),
        AttributePattern::new("PART.ref", ".", |name, value, parts| {
            let target = match part(parts, 0) {
                "view-model" => "component",
                other => other,
            };
            AttrSyntax::new(name, value, target, Some("ref"))
        }),
    ]
}

/// `:target` (bind) and `@target` (trigger).
pub fn shorthand_patterns() -> Vec<AttributePattern> {
    vec![
        AttributePattern::new(":PART", ":", |name, value, parts| {
            AttrSyntax::new(name, value, part(parts, 0), Some("bind"))
        }),
        AttributePattern::new("@PART", "@", |name, value, parts| {
            AttrSyntax::new(name, value, part(parts, 0), Some("trigger"))
        }),
    ]
}

pub fn default_patterns() -> Vec<AttributePattern> {
    let mut all = dot_separated_patterns();
    all.extend(ref_patterns());
    all.extend(shorthand_patterns());
    all
}

/// Parses attribute names into [`AttrSyntax`] through the pattern automaton.
/// Interpretations are memoized per distinct name.
#[derive(Debug)]
pub struct AttributeParser {
    interpreter: SyntaxInterpreter,
    handlers: FxHashMap<String, PatternHandler>,
    cache: RefCell<FxHashMap<String, Interpretation>>,
}

impl AttributeParser {
    pub fn new(patterns: &[AttributePattern]) -> Self {
        let mut interpreter = SyntaxInterpreter::new();
        let defs: Vec<_> = patterns.iter().map(|p| p.definition.clone()).collect();
        interpreter.add(&defs);
        let handlers = patterns
            .iter()
            .map(|p| (p.definition.pattern.clone(), p.handler))
            .collect();
        Self {
            interpreter,
            handlers,
            cache: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn interpret(&self, name: &str) -> Interpretation {
        if let Some(hit) = self.cache.borrow().get(name) {
            return hit.clone();
        }
        let interpretation = self.interpreter.interpret(name);
        self.cache
            .borrow_mut()
            .insert(name.to_string(), interpretation.clone());
        interpretation
    }

    pub fn parse(&self, name: &str, value: &str) -> Result<AttrSyntax> {
        let interpretation = self.interpret(name);
        let Some(pattern) = interpretation.pattern else {
            return Ok(AttrSyntax::new(name, value, name, None));
        };
        let handler = self
            .handlers
            .get(&pattern)
            .ok_or(TemplateError::MissingPatternHandler(pattern.clone()))?;
        Ok(handler(name, value, &interpretation.parts))
    }
}

impl Default for AttributeParser {
    fn default() -> Self {
        Self::new(&default_patterns())
    }
}
