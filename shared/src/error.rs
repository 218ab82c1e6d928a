use thiserror::Error;

/// Failure to read an entity or argument list off the wire.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("invalid value `{value}` for field `{field}`")]
    InvalidField { field: &'static str, value: String },
    #[error("unknown tile type `{0}`")]
    UnknownTileType(String),
    #[error("unknown room type `{0}`")]
    UnknownRoomType(String),
}

/// Failure of a World Model operation that was asked for by identifier.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorldError {
    #[error("no tile at ({0}, {1})")]
    NoSuchTile(i32, i32),
    #[error("no room named `{0}`")]
    NoSuchRoom(String),
    #[error("tile ({0}, {1}) is already covered by room `{2}`")]
    TileAlreadyCovered(i32, i32, String),
}
