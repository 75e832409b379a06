use serde::{Deserialize, Serialize};

/// Sanitization middleware configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanitizationConfig {
    /// Containers nested deeper than this are replaced by `null`
    pub max_depth: usize,
    /// Largest body buffered for inspection, in bytes
    pub max_body_bytes: usize,
    /// Elements removed together with their content
    pub stripped_elements: Vec<String>,
    /// Whether to remove null bytes
    pub remove_null_bytes: bool,
    /// Whether path segments are sanitized
    pub sanitize_path: bool,
    /// Longest value copied into a security event
    pub max_event_value_chars: usize,
}

impl Default for SanitizationConfig {
    fn default() -> Self {
        Self {
            max_depth: 20,
            max_body_bytes: 1024 * 1024, // 1MiB
            stripped_elements: [
                "script", "style", "iframe", "object", "embed", "noscript", "template",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            remove_null_bytes: true,
            sanitize_path: true,
            max_event_value_chars: 512,
        }
    }
}

impl SanitizationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn production() -> Self {
        Self::default()
    }

    pub fn development() -> Self {
        Self {
            max_body_bytes: 10 * 1024 * 1024,
            ..Self::default()
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    /// Add an element whose content is dropped along with its tags
    pub fn with_stripped_element(mut self, element: impl Into<String>) -> Self {
        let element = element.into().to_ascii_lowercase();
        if !self.stripped_elements.contains(&element) {
            self.stripped_elements.push(element);
        }
        self
    }

    pub fn with_null_byte_removal(mut self, enabled: bool) -> Self {
        self.remove_null_bytes = enabled;
        self
    }

    pub fn with_path_sanitization(mut self, enabled: bool) -> Self {
        self.sanitize_path = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_depth == 0 {
            return Err("Sanitization max_depth must be greater than 0".to_string());
        }
        if self.max_body_bytes == 0 {
            return Err("Sanitization max_body_bytes must be greater than 0".to_string());
        }
        if self
            .stripped_elements
            .iter()
            .any(|e| e.is_empty() || !e.chars().all(|c| c.is_ascii_alphanumeric()))
        {
            return Err("Stripped element names must be non-empty alphanumeric".to_string());
        }
        Ok(())
    }
}
