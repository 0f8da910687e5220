#[derive(Debug, thiserror::Error)]
pub enum TypeMapError {
    #[error("unsupported source type: {0}")]
    UnsupportedType(String),
    #[error("a relation needs at least one column")]
    EmptySchema,
}
