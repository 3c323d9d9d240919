use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("duplicate node id '{0}' in dependency graph")]
    DuplicateNode(String),

    #[error("edge references unknown node '{0}'")]
    UnknownNode(String),
}
