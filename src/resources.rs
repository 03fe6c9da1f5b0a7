// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Catalogue of the triaged image tree served to the app

use serde::Serialize;
use std::path::Path;

use crate::fs::FileSystem;
use crate::sidecar::{SidecarMatcher, TRIAGED_DIR};
use crate::Result;

/// `<category>/<item>/<file>` listing, sidecars and dotfiles left out
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Catalogue {
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Item {
    pub name: String,
    /// URL paths relative to `/resources`
    pub files: Vec<String>,
}

impl Catalogue {
    /// Number of leaf files across all categories
    pub fn file_count(&self) -> usize {
        self.categories
            .iter()
            .flat_map(|c| c.items.iter())
            .map(|i| i.files.len())
            .sum()
    }
}

fn visible(name: &str, matcher: &SidecarMatcher) -> bool {
    !name.starts_with('.') && !matcher.matches(name)
}

/// Scan `<root>/triaged_images`. A missing tree is an empty catalogue.
pub fn scan(fs: &dyn FileSystem, root: &Path, matcher: &SidecarMatcher) -> Result<Catalogue> {
    let triaged = root.join(TRIAGED_DIR);
    if !fs.is_dir(&triaged) {
        return Ok(Catalogue::default());
    }

    let mut catalogue = Catalogue::default();
    for category in fs.read_dir(&triaged)? {
        let category_name = category.name();
        if !category.is_dir || !visible(&category_name, matcher) {
            continue;
        }

        let mut items = Vec::new();
        for item in fs.read_dir(&category.path)? {
            let item_name = item.name();
            if !item.is_dir || !visible(&item_name, matcher) {
                continue;
            }

            let files = fs
                .read_dir(&item.path)?
                .into_iter()
                .filter(|f| !f.is_dir)
                .map(|f| f.name())
                .filter(|name| visible(name, matcher))
                .map(|name| format!("{}/{}/{}", category_name, item_name, name))
                .collect();

            items.push(Item { name: item_name, files });
        }

        catalogue.categories.push(Category { name: category_name, items });
    }

    Ok(catalogue)
}
