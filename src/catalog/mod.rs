use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// A code exercise definition. Owned by the catalog; the sync core only
/// reads `code` when a room is first created and compares against
/// `solution` on every edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeBlock {
    pub id: String,
    pub title: String,
    pub code: String,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Listing entry for the lobby page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeBlockSummary {
    pub id: String,
    pub title: String,
}

/// Detail view served over REST. The solution text never leaves the
/// process this way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeBlockDetail {
    pub id: String,
    pub title: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl From<&CodeBlock> for CodeBlockDetail {
    fn from(block: &CodeBlock) -> Self {
        Self {
            id: block.id.clone(),
            title: block.title.clone(),
            code: block.code.clone(),
            explanation: block.explanation.clone(),
        }
    }
}

/// Read-only store of code block definitions, built once at startup.
#[derive(Debug)]
pub struct CodeBlockStore {
    blocks: HashMap<String, CodeBlock>,
    /// Listing order is stable regardless of map iteration order
    order: Vec<String>,
}

impl CodeBlockStore {
    /// Build the store from a JSON catalog file, or from the built-in
    /// seed exercises when no path is configured.
    pub fn from_config(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                tracing::info!("No catalog file configured, seeding built-in exercises");
                Ok(Self::with_blocks(seed_blocks()))
            }
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SyncError::CatalogLoad(format!("{}: {}", path.display(), e)))?;
        let blocks: Vec<CodeBlock> = serde_json::from_str(&raw)
            .map_err(|e| SyncError::CatalogLoad(format!("{}: {}", path.display(), e)))?;

        if blocks.is_empty() {
            return Err(SyncError::CatalogLoad(format!(
                "{}: catalog contains no code blocks",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), count = blocks.len(), "Loaded catalog");
        Ok(Self::with_blocks(blocks))
    }

    pub fn with_blocks(blocks: Vec<CodeBlock>) -> Self {
        let order: Vec<String> = blocks.iter().map(|b| b.id.clone()).collect();
        let blocks = blocks.into_iter().map(|b| (b.id.clone(), b)).collect();
        Self { blocks, order }
    }

    /// All blocks, as lobby listing entries
    pub fn list(&self) -> Vec<CodeBlockSummary> {
        self.order
            .iter()
            .filter_map(|id| self.blocks.get(id))
            .map(|b| CodeBlockSummary {
                id: b.id.clone(),
                title: b.title.clone(),
            })
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&CodeBlock> {
        self.blocks.get(id)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Built-in exercises used when no catalog file is configured
fn seed_blocks() -> Vec<CodeBlock> {
    vec![
        CodeBlock {
            id: "async-function".to_string(),
            title: "Async Function".to_string(),
            code: "async function fetchData() {\n  // Complete code here\n}".to_string(),
            solution: Some("async function fetchData() {\n  const response = await fetch('https://api.example.com/data');\n  const data = await response.json();\n  return data;\n}".to_string()),
            explanation: Some("Fetch JSON data with async/await.".to_string()),
        },
        CodeBlock {
            id: "array-methods".to_string(),
            title: "Array Methods".to_string(),
            code: "const numbers = [1, 2, 3, 4, 5];\n// Filter even numbers".to_string(),
            solution: Some("const numbers = [1, 2, 3, 4, 5];\nconst evenNumbers = numbers.filter(num => num % 2 === 0);".to_string()),
            explanation: Some("Use Array.prototype.filter with a predicate.".to_string()),
        },
        CodeBlock {
            id: "promise-chain".to_string(),
            title: "Promise Chain".to_string(),
            code: "function processData() {\n  // Create a promise chain\n}".to_string(),
            solution: Some("function processData() {\n  return fetch('https://api.example.com/data')\n    .then(response => response.json())\n    .then(data => data.filter(item => item.active))\n    .catch(error => console.error(error));\n}".to_string()),
            explanation: Some("Chain then/catch handlers off a fetch call.".to_string()),
        },
        CodeBlock {
            id: "dom-manipulation".to_string(),
            title: "DOM Manipulation".to_string(),
            code: "// Create a function to add a new element to the page".to_string(),
            solution: Some("function addElement(text) {\n  const newDiv = document.createElement('div');\n  newDiv.textContent = text;\n  document.body.appendChild(newDiv);\n  return newDiv;\n}".to_string()),
            explanation: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_store() {
        let store = CodeBlockStore::from_config(None).unwrap();
        assert_eq!(store.len(), 4);
        assert!(store.get("async-function").is_some());
        assert!(store.get("does-not-exist").is_none());
    }

    #[test]
    fn test_list_preserves_order() {
        let store = CodeBlockStore::from_config(None).unwrap();
        let titles: Vec<String> = store.list().into_iter().map(|s| s.title).collect();
        assert_eq!(
            titles,
            vec![
                "Async Function",
                "Array Methods",
                "Promise Chain",
                "DOM Manipulation"
            ]
        );
    }

    #[test]
    fn test_detail_omits_solution() {
        let store = CodeBlockStore::from_config(None).unwrap();
        let detail = CodeBlockDetail::from(store.get("array-methods").unwrap());
        let json = serde_json::to_value(&detail).unwrap();
        assert!(json.get("solution").is_none());
        assert_eq!(json["id"], "array-methods");
    }

    #[test]
    fn test_load_missing_file() {
        let err = CodeBlockStore::load("/nonexistent/catalog.json").unwrap_err();
        assert!(matches!(err, SyncError::CatalogLoad(_)));
    }

    #[test]
    fn test_with_blocks_roundtrip() {
        let store = CodeBlockStore::with_blocks(vec![CodeBlock {
            id: "b1".to_string(),
            title: "Block One".to_string(),
            code: "let x = 1;".to_string(),
            solution: Some("let x = 2;".to_string()),
            explanation: None,
        }]);
        assert_eq!(
            store.get("b1").unwrap().solution.as_deref(),
            Some("let x = 2;")
        );
        assert_eq!(store.list().len(), 1);
    }
}
