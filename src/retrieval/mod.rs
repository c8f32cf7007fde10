mod image_source;
mod tile_retriever;

pub use crate::retrieval::{
    image_source::{DirectoryImageSource, ImageSource},
    tile_retriever::{RetrievalRequest, TileRetriever},
};
