//! Line classification: route interleaved log lines into category buffers.

use serde::{Deserialize, Serialize};

/// Message categories, in marker priority order. A line belongs to the first
/// category whose marker it contains, or to none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Catalogue listing requests.
    Catalogues,
    /// Market definition messages.
    Definitions,
    /// Order placements.
    Postings,
    /// Order cancellations.
    Cancels,
    /// Order change messages.
    Updates,
}

impl Category {
    /// All categories, in marker priority order.
    pub const ALL: [Category; 5] = [
        Category::Catalogues,
        Category::Definitions,
        Category::Postings,
        Category::Cancels,
        Category::Updates,
    ];

    /// Marker substring that routes a line into this category.
    pub fn marker(self) -> &'static str {
        match self {
            Category::Catalogues => "listMarketCatalogue",
            Category::Definitions => "marketDefinition",
            Category::Postings => "placeOrders",
            Category::Cancels => "cancelOrders",
            // change messages carry the op tag escaped inside a string field
            Category::Updates => r#"\"op\":\"ocm\""#,
        }
    }

    /// Directory name under which this category's partitions are written.
    pub fn dir_name(self) -> &'static str {
        match self {
            Category::Catalogues => "catalogues",
            Category::Definitions => "definitions",
            Category::Postings => "postings",
            Category::Cancels => "cancels",
            Category::Updates => "updates",
        }
    }

    /// Classifies a line: first matching marker in priority order wins.
    pub fn of(line: &str) -> Option<Category> {
        Self::ALL.into_iter().find(|c| line.contains(c.marker()))
    }
}

/// Per-category byte buffers accumulated during one archive run.
#[derive(Debug, Default)]
pub struct ClassifiedBuffers {
    buffers: [Vec<u8>; Category::ALL.len()],
}

impl ClassifiedBuffers {
    /// Creates empty buffers for every category.
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes one raw line (terminator included) into its category buffer.
    /// Lines matching no marker are dropped. Returns the chosen category.
    pub fn push(&mut self, line: &str) -> Option<Category> {
        let category = Category::of(line)?;
        self.buffers[category as usize].extend_from_slice(line.as_bytes());
        Some(category)
    }

    /// The accumulated buffer for one category.
    pub fn get(&self, category: Category) -> &[u8] {
        &self.buffers[category as usize]
    }

    /// Iterates (category, buffer) pairs that accumulated any data.
    pub fn non_empty(&self) -> impl Iterator<Item = (Category, &[u8])> {
        Category::ALL
            .into_iter()
            .zip(self.buffers.iter())
            .filter(|(_, buffer)| !buffer.is_empty())
            .map(|(category, buffer)| (category, buffer.as_slice()))
    }

    /// Categories that accumulated no data.
    pub fn empty_categories(&self) -> impl Iterator<Item = Category> + '_ {
        Category::ALL
            .into_iter()
            .filter(|category| self.buffers[*category as usize].is_empty())
    }
}
