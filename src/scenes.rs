use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{TrailerError, TrailerResult};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SceneSpec {
    pub prompt: String,
    /// Still from the film whose look the scene imitates.
    pub movie_reference_image: String,
    /// Marker standing in for the viewer's own photo.
    #[serde(default)]
    pub person_reference_image: String,
}

/// A named scene, in the order the scene file declares it.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub name: String,
    pub spec: SceneSpec,
}

/// Parses a JSON object of `name -> scene`, keeping declaration order.
pub fn parse_scenes(json: &str) -> TrailerResult<Vec<Scene>> {
    let entries: Map<String, Value> = serde_json::from_str(json)?;
    entries
        .into_iter()
        .map(|(name, value)| -> TrailerResult<Scene> {
            let spec = serde_json::from_value(value)?;
            Ok(Scene { name, spec })
        })
        .collect()
}

pub fn load_scenes(path: &Path) -> TrailerResult<Vec<Scene>> {
    let json = std::fs::read_to_string(path).map_err(|source| TrailerError::Resource {
        path: path.to_path_buf(),
        source,
    })?;
    parse_scenes(&json)
}
