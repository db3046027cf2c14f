//! Template compilation: attribute syntax, binding commands, the binder and
//! the compiler that turns element markup into instruction rows.
//!
//! ```ignore
//! let compiler = TemplateCompiler::default();
//! let def = CustomElementDefinition::builder("app").template("<p>${msg}</p>").build();
//! let compiled = compiler.compile(&def, &ResourceRegistry::new(), None)?;
//! ```

pub mod attr_pattern;
pub mod attr_syntax;
pub mod binder;
pub mod binding_command;
pub mod case;
pub mod compiler;
pub mod error;
pub mod expr;
pub mod instructions;
pub mod markup;
pub mod resources;
pub mod symbols;

pub use attr_pattern::{AttributePatternDefinition, Interpretation, SyntaxInterpreter};
pub use attr_syntax::{AttrSyntax, AttributeParser, AttributePattern, default_patterns};
pub use binding_command::{AttrMapper, BindingCommand, CommandBuildInfo, default_commands};
pub use compiler::{CompilerOptions, TemplateCompiler};
pub use error::{Result, TemplateError};
pub use expr::{BasicExpressionParser, Expr, Expression, ExpressionKind, ExpressionParser};
pub use instructions::*;
pub use resources::{
    BindableDefinition, BindingMode, CustomAttributeDefinition, CustomElementDefinition, ResourceDefinition,
    ResourceRegistry, ResourceResolver, ScopedResolver, ShadowMode, ShadowOptions,
};
