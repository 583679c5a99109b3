//! Instruction text sent with every page image.
//!
//! The prompt is fixed for a session: the same text accompanies every page.
//! Callers can override it via [`crate::config::SessionConfig::system_prompt`];
//! the constant here is used only when no override is provided.

/// Default instruction for converting a page image to Markdown.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"Convert the provided image into Markdown format. Ensure that all content from the page is included, such as headers, footers, subtexts, images (with alt text if possible), tables, and any other elements.

Requirements:
- Output Only Markdown: Return solely the Markdown content without any additional explanations or comments.
- No Delimiters: Do not use code fences or delimiters like ```markdown.
- Complete Content: Do not omit any part of the page, including headers, footers, and subtext."#;
