use std::collections::HashSet;

const EMPTY_SLUG: &str = "section";

/// Arabic harakat and tatweel are dropped rather than treated as word breaks.
fn is_ignorable_mark(c: char) -> bool {
    matches!(c, '\u{0640}' | '\u{064B}'..='\u{065F}' | '\u{0670}')
}

/// Lowercase `text` and collapse every run of non-alphanumeric characters into one `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_sep = false;
    for c in text.chars() {
        if is_ignorable_mark(c) {
            continue;
        }
        if c.is_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    if slug.is_empty() {
        EMPTY_SLUG.to_string()
    } else {
        slug
    }
}

/// Anchor ids issued during one segmentation run.
#[derive(Debug, Default, Clone)]
pub struct AnchorSlugRegistry {
    issued: HashSet<String>,
}

impl AnchorSlugRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slug for `content`, suffixed `-1`, `-2`, ... when the plain slug is taken.
    pub fn generate_header_id(&mut self, content: &str) -> String {
        let base = slugify(content);
        if self.issued.insert(base.clone()) {
            return base;
        }
        let mut n = 1usize;
        loop {
            let candidate = format!("{base}-{n}");
            if self.issued.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.issued.contains(id)
    }

    pub fn len(&self) -> usize {
        self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}
