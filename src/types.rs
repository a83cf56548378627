use serde::{Deserialize, Serialize};

/// Segment-local document identifier, staged as little-endian `i32`.
pub type DocId = i32;

/// Distance space the remote service builds the graph for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceType {
    #[default]
    L2,
    Cosinesimil,
    InnerProduct,
}

impl std::fmt::Display for SpaceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpaceType::L2 => write!(f, "l2"),
            SpaceType::Cosinesimil => write!(f, "cosinesimil"),
            SpaceType::InnerProduct => write!(f, "innerproduct"),
        }
    }
}

impl std::str::FromStr for SpaceType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "l2" => Ok(SpaceType::L2),
            "cosinesimil" | "cosine" => Ok(SpaceType::Cosinesimil),
            "innerproduct" | "inner_product" => Ok(SpaceType::InnerProduct),
            other => Err(format!("unknown space type: {other}")),
        }
    }
}

/// Element type of the staged vectors.
///
/// Only `Float32` is staged today; wider or narrower encodings are rejected at
/// eligibility time and built locally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorDataType {
    #[default]
    Float32,
    Float16,
    Byte,
}

impl VectorDataType {
    /// Bytes occupied by one vector element.
    pub fn element_width(&self) -> usize {
        match self {
            VectorDataType::Float32 => 4,
            VectorDataType::Float16 => 2,
            VectorDataType::Byte => 1,
        }
    }
}

impl std::fmt::Display for VectorDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorDataType::Float32 => write!(f, "float"),
            VectorDataType::Float16 => write!(f, "half_float"),
            VectorDataType::Byte => write!(f, "byte"),
        }
    }
}

/// Describes the vector field one graph is built for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub dimension: usize,
    #[serde(default)]
    pub space_type: SpaceType,
    #[serde(default = "default_engine")]
    pub engine: String,
    /// Engine-specific build parameters, forwarded to the service untouched.
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

fn default_engine() -> String {
    "faiss".to_string()
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            space_type: SpaceType::default(),
            engine: default_engine(),
            parameters: serde_json::Map::new(),
        }
    }

    pub fn with_space_type(mut self, space_type: SpaceType) -> Self {
        self.space_type = space_type;
        self
    }

    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}
