use thiserror::Error;
use trellis_template::TemplateError;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("cannot {operation} controller {controller} in state {state}")]
    InvalidTransition {
        controller: String,
        operation: &'static str,
        state: String,
    },

    #[error("{name}: template has {targets} targets but {rows} instruction rows")]
    TargetCountMismatch { name: String, targets: usize, rows: usize },

    #[error("no renderer registered for instruction type `{0}`")]
    MissingRenderer(String),

    #[error("renderer `{renderer}` cannot render instruction `{instruction}`")]
    RendererMismatch { renderer: &'static str, instruction: String },

    #[error("instruction `{0}` needs an element target")]
    NodeTargetRequired(String),

    #[error("instruction `{0}` needs a view-model target")]
    ComponentTargetRequired(String),

    #[error("{0}: a containerless element cannot use shadow DOM")]
    ContainerlessShadow(String),

    #[error("no custom element named `{0}` is registered")]
    UnknownElement(String),

    #[error("no custom attribute named `{0}` is registered")]
    UnknownAttribute(String),

    #[error("synthetic view {0} activated without a scope")]
    MissingScope(String),

    #[error("expression `{0}` is not assignable")]
    NotAssignable(String),
}
