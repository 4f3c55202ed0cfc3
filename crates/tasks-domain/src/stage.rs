use std::collections::BTreeMap;

/// Ordered, sparse set of named pipeline stages.
///
/// Stage indices come from the remote and are not contiguous (the final
/// stage is often reported under a marker index such as `99`). Lookups of
/// unknown indices never fail.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct StageCatalog {
    stages: BTreeMap<u32, String>,
}

impl StageCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_stage(mut self, index: u32, name: impl Into<String>) -> Self {
        self.stages.insert(index, name.into());
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn name(&self, index: u32) -> Option<&str> {
        self.stages.get(&index).map(String::as_str)
    }

    /// Stage name, or `stage {index}` for indices the catalog doesn't know.
    pub fn label(&self, index: u32) -> String {
        self.name(index)
            .map_or_else(|| format!("stage {index}"), str::to_string)
    }

    /// Zero-based rank of a known stage.
    pub fn position(&self, index: u32) -> Option<usize> {
        self.stages.keys().position(|&k| k == index)
    }

    /// Share of known stages reached, counting `index` as reached. Unknown
    /// indices rank after every known stage below them.
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self, index: u32) -> f64 {
        if self.stages.is_empty() {
            return 0.0;
        }
        let reached = self.stages.range(..=index).count();
        reached as f64 / self.stages.len() as f64
    }

    /// True when `index` is the highest known stage.
    pub fn is_final(&self, index: u32) -> bool {
        self.stages.keys().next_back() == Some(&index)
    }
}
