//! Registry of loaded cascade models.
//!
//! Several cascades can be registered at once; they share one pyramid and
//! their detections are told apart by the caller-supplied [`Tag`].

use crate::cascade::{Cascade, CascadeInfo};
use crate::geom::Size;
use crate::util::DetectionResult;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Caller-defined identifier attached to every detection of a model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(pub i32);

impl Tag {
    /// Tag used when the caller does not supply one.
    pub const UNDEFINED: Tag = Tag(-1);
}

impl Default for Tag {
    fn default() -> Self {
        Tag::UNDEFINED
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Tag::UNDEFINED {
            f.write_str("undefined")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// A cascade together with the tag its detections carry.
#[derive(Debug)]
pub struct ClassifierModel {
    cascade: Cascade,
    tag: Tag,
}

impl ClassifierModel {
    pub fn new(cascade: Cascade, tag: Tag) -> Self {
        Self { cascade, tag }
    }

    pub fn cascade(&self) -> &Cascade {
        &self.cascade
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn info(&self) -> CascadeInfo {
        self.cascade.info()
    }

    pub fn window(&self) -> Size {
        self.cascade.window()
    }
}

/// Ordered set of loaded models. Evaluators hold shared references to them.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: Vec<Arc<ClassifierModel>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a cascade file and registers it. Nothing is stored on error.
    pub fn load<P: AsRef<Path>>(&mut self, path: P, tag: Tag) -> DetectionResult<()> {
        let cascade = Cascade::from_path(path)?;
        self.register(cascade, tag);
        Ok(())
    }

    /// Parses an in-memory cascade and registers it.
    pub fn load_str(&mut self, text: &str, tag: Tag) -> DetectionResult<()> {
        let cascade = Cascade::from_json_str(text)?;
        self.register(cascade, tag);
        Ok(())
    }

    /// Registers an already parsed cascade.
    pub fn register(&mut self, cascade: Cascade, tag: Tag) {
        self.models.push(Arc::new(ClassifierModel::new(cascade, tag)));
    }

    pub fn models(&self) -> &[Arc<ClassifierModel>] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
