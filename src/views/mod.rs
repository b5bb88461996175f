mod admin;
mod gallery;

pub use admin::{AdminRow, AdminView};
pub use gallery::{Facets, GalleryView};
