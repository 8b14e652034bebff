//! Utility functions for common operations.
//!
//! This module provides reusable utilities for:
//!
//! - **URL handling**: absolute-URI validation and domain/origin extraction
//! - **Text processing**: HTML cleaning, truncation, filename sanitization,
//!   XML-safe text and human-readable dates
//!
//! # Examples
//!
//! ```
//! use feedhub::util::{clean_html, truncate_text, validate_url};
//!
//! let url = validate_url("https://example.com/feed.xml").unwrap();
//! assert_eq!(url.scheme(), "https");
//!
//! assert_eq!(clean_html("<p>Hello <b>world</b></p>"), "Hello world");
//! assert_eq!(truncate_text("short", 200), "short");
//! ```

mod text;
mod url_validator;

pub use text::{
    clean_html, format_date, format_relative_time, sanitize_filename, strip_xml_invalid_chars,
    truncate_text,
};
pub use url_validator::{base_origin, get_domain, validate_url, UrlValidationError};
