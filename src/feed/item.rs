use serde::Serialize;

/// A single normalized entry ready for display.
///
/// Items are built once by the normalizer and never mutated afterwards.
/// `title` and `description` are always non-empty; `url` may be empty
/// when the upstream event carried no image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayItem {
    title: String,
    description: String,
    url: String,
}

impl DisplayItem {
    /// Builds an item, returning `None` when the title or description is empty.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        url: impl Into<String>,
    ) -> Option<Self> {
        let title = title.into();
        let description = description.into();
        if title.is_empty() || description.is_empty() {
            return None;
        }
        Some(Self {
            title,
            description,
            url: url.into(),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Link (image URL) for the item; empty when none was provided.
    pub fn url(&self) -> &str {
        &self.url
    }
}
