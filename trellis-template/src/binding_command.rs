//! Binding commands (`.bind`, `.trigger`, ...) and the attribute-to-property
//! mapping they use for plain elements.

use std::fmt::Debug;
use std::sync::Arc;

use trellis_dom::{Document, NodeId};

use crate::attr_syntax::AttrSyntax;
use crate::case::camel_case;
use crate::expr::{Expression, ExpressionKind};
use crate::instructions::*;
use crate::resources::{BindableInfo, BindingMode};

/// Everything a command needs to build its instruction.
pub struct CommandBuildInfo<'a> {
    pub doc: &'a Document,
    pub node: NodeId,
    pub attr: &'a AttrSyntax,
    pub expression: Expression,
    /// Resolved bindable when the attribute targets a custom element or
    /// attribute property, `None` for plain element attributes.
    pub bindable: Option<&'a BindableInfo>,
    pub mapper: &'a AttrMapper,
}

impl CommandBuildInfo<'_> {
    /// Property targeted by the binding.
    fn property(&self) -> String {
        match self.bindable {
            Some(b) => b.prop_name.clone(),
            None => self
                .mapper
                .map(self.doc, self.node, &self.attr.target)
                .unwrap_or_else(|| camel_case(&self.attr.target)),
        }
    }
}

pub trait BindingCommand: Debug + Send + Sync {
    fn name(&self) -> &str;

    /// How the attribute value is parsed.
    fn expression_kind(&self) -> ExpressionKind {
        ExpressionKind::Property
    }

    /// Commands that always address the element itself, even when the target
    /// names a custom attribute.
    fn ignores_custom_attributes(&self) -> bool {
        false
    }

    /// Whether an empty value defaults to the camel-cased target name.
    fn defaults_empty_value(&self) -> bool {
        false
    }

    fn build(&self, info: CommandBuildInfo<'_>) -> Instruction;
}

/// `bind`, `one-time`, `to-view`, `from-view` and `two-way`.
#[derive(Debug)]
pub struct PropertyCommand {
    name: &'static str,
    /// `None` for `bind`: the bindable's mode, or detected for plain elements.
    mode: Option<BindingMode>,
}

impl BindingCommand for PropertyCommand {
    fn name(&self) -> &str {
        self.name
    }

    fn defaults_empty_value(&self) -> bool {
        true
    }

    fn build(&self, info: CommandBuildInfo<'_>) -> Instruction {
        let to = info.property();
        let mode = match (self.mode, info.bindable) {
            (Some(mode), _) => mode,
            (None, Some(b)) => b.mode.or(BindingMode::ToView),
            (None, None) => {
                if info.mapper.is_two_way(info.doc, info.node, &info.attr.target) {
                    BindingMode::TwoWay
                } else {
                    BindingMode::ToView
                }
            }
        };
        Instruction::PropertyBinding(PropertyBindingInstruction {
            from: info.expression,
            to,
            mode,
        })
    }
}

/// `trigger`, `delegate` and `capture`.
#[derive(Debug)]
pub struct ListenerCommand {
    name: &'static str,
    prevent_default: bool,
    strategy: DelegationStrategy,
}

impl BindingCommand for ListenerCommand {
    fn name(&self) -> &str {
        self.name
    }

    fn expression_kind(&self) -> ExpressionKind {
        ExpressionKind::Function
    }

    fn ignores_custom_attributes(&self) -> bool {
        true
    }

    fn build(&self, info: CommandBuildInfo<'_>) -> Instruction {
        Instruction::ListenerBinding(ListenerBindingInstruction {
            from: info.expression,
            to: info.attr.target.clone(),
            prevent_default: self.prevent_default,
            strategy: self.strategy,
        })
    }
}

#[derive(Debug)]
pub struct CallCommand;

impl BindingCommand for CallCommand {
    fn name(&self) -> &str {
        "call"
    }

    fn expression_kind(&self) -> ExpressionKind {
        ExpressionKind::Function
    }

    fn build(&self, info: CommandBuildInfo<'_>) -> Instruction {
        let to = info.property();
        Instruction::CallBinding(CallBindingInstruction {
            from: info.expression,
            to,
        })
    }
}

#[derive(Debug)]
pub struct ForCommand;

impl BindingCommand for ForCommand {
    fn name(&self) -> &str {
        "for"
    }

    fn expression_kind(&self) -> ExpressionKind {
        ExpressionKind::Iterator
    }

    fn build(&self, info: CommandBuildInfo<'_>) -> Instruction {
        let to = info.property();
        Instruction::IteratorBinding(IteratorBindingInstruction {
            from: info.expression,
            to,
        })
    }
}

#[derive(Debug)]
pub struct RefCommand;

impl BindingCommand for RefCommand {
    fn name(&self) -> &str {
        "ref"
    }

    fn ignores_custom_attributes(&self) -> bool {
        true
    }

    fn build(&self, info: CommandBuildInfo<'_>) -> Instruction {
        Instruction::RefBinding(RefBindingInstruction {
            from: info.expression,
            to: info.attr.target.clone(),
        })
    }
}

/// `attr` and `class`: bind an attribute or toggle a class.
#[derive(Debug)]
pub struct AttributeCommand {
    name: &'static str,
}

impl BindingCommand for AttributeCommand {
    fn name(&self) -> &str {
        self.name
    }

    fn ignores_custom_attributes(&self) -> bool {
        true
    }

    fn build(&self, info: CommandBuildInfo<'_>) -> Instruction {
        let attr = match self.name {
            "class" => "class".to_string(),
            _ => info.attr.target.clone(),
        };
        Instruction::AttributeBinding(AttributeBindingInstruction {
            attr,
            from: info.expression,
            to: info.attr.target.clone(),
        })
    }
}

/// `style`: bind one inline style property.
#[derive(Debug)]
pub struct StyleCommand;

impl BindingCommand for StyleCommand {
    fn name(&self) -> &str {
        "style"
    }

    fn ignores_custom_attributes(&self) -> bool {
        true
    }

    fn build(&self, info: CommandBuildInfo<'_>) -> Instruction {
        Instruction::StylePropertyBinding(StylePropertyBindingInstruction {
            from: info.expression,
            to: info.attr.target.clone(),
        })
    }
}

pub fn default_commands() -> Vec<Arc<dyn BindingCommand>> {
    vec![
        Arc::new(PropertyCommand { name: "bind", mode: None }),
        Arc::new(PropertyCommand {
            name: "one-time",
            mode: Some(BindingMode::OneTime),
        }),
        Arc::new(PropertyCommand {
            name: "to-view",
            mode: Some(BindingMode::ToView),
        }),
        Arc::new(PropertyCommand {
            name: "from-view",
            mode: Some(BindingMode::FromView),
        }),
        Arc::new(PropertyCommand {
            name: "two-way",
            mode: Some(BindingMode::TwoWay),
        }),
        Arc::new(ListenerCommand {
            name: "trigger",
            prevent_default: true,
            strategy: DelegationStrategy::None,
        }),
        Arc::new(ListenerCommand {
            name: "delegate",
            prevent_default: false,
            strategy: DelegationStrategy::Bubbling,
        }),
        Arc::new(ListenerCommand {
            name: "capture",
            prevent_default: false,
            strategy: DelegationStrategy::Capturing,
        }),
        Arc::new(CallCommand),
        Arc::new(ForCommand),
        Arc::new(RefCommand),
        Arc::new(AttributeCommand { name: "attr" }),
        Arc::new(AttributeCommand { name: "class" }),
        Arc::new(StyleCommand),
    ]
}

/// Maps attribute names of native elements to DOM properties and knows
/// which of them update from the view (two-way by default).
#[derive(Debug, Clone, Default)]
pub struct AttrMapper;

impl AttrMapper {
    pub fn is_two_way(&self, doc: &Document, node: NodeId, attr: &str) -> bool {
        let tag = doc.tag(node).unwrap_or("");
        let attr = attr.to_ascii_lowercase();
        let by_tag = match tag {
            "input" => matches!(
                attr.as_str(),
                "value" | "checked" | "files" | "value-as-number" | "value-as-date" | "valueasnumber" | "valueasdate"
            ),
            "textarea" | "select" => attr == "value",
            _ => false,
        };
        if by_tag {
            return true;
        }
        if doc.has_attribute(node, "contenteditable") && matches!(attr.as_str(), "textcontent" | "innerhtml") {
            return true;
        }
        matches!(attr.as_str(), "scrolltop" | "scrollleft" | "scroll-top" | "scroll-left")
    }

    /// Property for `attr` on `node`, or `None` when the camel-cased name applies.
    pub fn map(&self, doc: &Document, node: NodeId, attr: &str) -> Option<String> {
        let tag = doc.tag(node).unwrap_or("");
        let by_tag = match (tag, attr) {
            ("label", "for") => Some("htmlFor"),
            ("img", "usemap") => Some("useMap"),
            ("input", "maxlength") | ("textarea", "maxlength") => Some("maxLength"),
            ("input", "minlength") | ("textarea", "minlength") => Some("minLength"),
            ("input", "formaction") => Some("formAction"),
            ("input", "formenctype") => Some("formEnctype"),
            ("input", "formmethod") => Some("formMethod"),
            ("input", "formnovalidate") => Some("formNoValidate"),
            ("input", "formtarget") => Some("formTarget"),
            ("input", "inputmode") => Some("inputMode"),
            ("td", "rowspan") | ("th", "rowspan") => Some("rowSpan"),
            ("td", "colspan") | ("th", "colspan") => Some("colSpan"),
            _ => None,
        };
        if let Some(p) = by_tag {
            return Some(p.to_string());
        }
        let global = match attr {
            "class" => "className",
            "accesskey" => "accessKey",
            "contenteditable" => "contentEditable",
            "tabindex" => "tabIndex",
            "textcontent" => "textContent",
            "innerhtml" => "innerHTML",
            "scrolltop" => "scrollTop",
            "scrollleft" => "scrollLeft",
            "readonly" => "readOnly",
            _ => return None,
        };
        Some(global.to_string())
    }
}
