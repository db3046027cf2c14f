use thiserror::Error;

pub type Result<T> = std::result::Result<T, TemplateError>;

/// Errors raised while parsing markup, binding or compiling a template.
/// All of them abort the compilation; no partial definition is produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    #[error("markup parse error: {0}")]
    Markup(String),

    #[error("invalid expression `{text}`: {reason}")]
    Expression { text: String, reason: String },

    #[error("{resource} declares more than one primary bindable (`{first}` and `{second}`)")]
    DuplicatePrimaryBindable {
        resource: String,
        first: String,
        second: String,
    },

    #[error("unknown custom element `{0}`")]
    UnknownElement(String),

    #[error("custom attribute `{attribute}` has no bindable named `{property}`")]
    UnknownBindable { attribute: String, property: String },

    #[error("template controller `{0}` cannot be used on a surrogate")]
    SurrogateTemplateController(String),

    #[error("local template `{0}` must be declared directly under the root")]
    LocalTemplateNotAtRoot(String),

    #[error("local template `as-custom-element` requires a name")]
    EmptyLocalTemplateName,

    #[error("duplicate local template `{0}`")]
    DuplicateLocalTemplate(String),

    #[error("<bindable> in local template `{0}` is missing the `property` attribute")]
    MissingBindableProperty(String),

    #[error("local template `{element}` declares bindable attribute `{attribute}` twice")]
    DuplicateLocalBindable { element: String, attribute: String },

    #[error("template of `{0}` contains only local templates")]
    OnlyLocalTemplates(String),

    #[error("no handler registered for attribute pattern `{0}`")]
    MissingPatternHandler(String),
}

impl From<pest::error::Error<crate::markup::Rule>> for TemplateError {
    fn from(e: pest::error::Error<crate::markup::Rule>) -> Self {
        TemplateError::Markup(e.to_string())
    }
}
