use ash::vk;

#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    #[error("null argument: {0}")]
    NullArgument(&'static str),

    #[error("no loader link record in the {0} create info chain")]
    LinkNotFound(&'static str),

    #[error("next layer does not provide {0}")]
    MissingEntryPoint(&'static str),

    #[error("{0} handle is null")]
    NullHandle(&'static str),

    #[error("next layer returned {0}")]
    Downstream(vk::Result),
}

impl From<LayerError> for vk::Result {
    /// Downstream codes pass through verbatim; everything else is a failure to
    /// join the call chain.
    fn from(err: LayerError) -> Self {
        match err {
            LayerError::Downstream(code) => code,
            _ => vk::Result::ERROR_INITIALIZATION_FAILED,
        }
    }
}
