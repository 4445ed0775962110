//! Encoding catalog artifact.

use std::path::Path;

use varscreen_model::EncodingCatalog;

use crate::artifact::{read_json, write_json};
use crate::error::Result;

pub fn load_catalog(path: &Path) -> Result<EncodingCatalog> {
    read_json("encoding catalog", path)
}

pub fn save_catalog(path: &Path, catalog: &EncodingCatalog) -> Result<()> {
    write_json(path, catalog)
}
