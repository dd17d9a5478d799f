//! Report document model.
//!
//! A [`Report`] is a title plus numbered sections of [`Block`]s. It carries
//! no layout; renderers decide how each block looks.

use crate::charts::Figure;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Sub-heading inside a section (level 2 and below).
    Heading { level: u8, text: String },
    Paragraph { text: String },
    Table {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    /// A chart as SVG markup plus the model it was drawn from. `svg` is empty
    /// when SVG drawing failed.
    Figure {
        caption: String,
        svg: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        figure: Option<Figure>,
    },
    List { ordered: bool, items: Vec<String> },
}

impl Block {
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Block::Heading {
            level,
            text: text.into(),
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Block::Paragraph { text: text.into() }
    }

    pub fn table<H: Into<String>>(headers: impl IntoIterator<Item = H>, rows: Vec<Vec<String>>) -> Self {
        Block::Table {
            headers: headers.into_iter().map(Into::into).collect(),
            rows,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    pub blocks: Vec<Block>,
}

impl Section {
    pub fn new(heading: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            blocks: Vec::new(),
        }
    }

    pub fn push(&mut self, block: Block) -> &mut Self {
        self.blocks.push(block);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub created_at: String,
    pub sections: Vec<Section>,
}

impl Report {
    pub fn section(&self, heading_prefix: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.heading.starts_with(heading_prefix))
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.sections.iter().flat_map(|s| s.blocks.iter())
    }
}
