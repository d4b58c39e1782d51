//! Utility functions for common operations.
//!
//! This module provides reusable utilities for:
//!
//! - **URL validation**: Security-focused validation for feed URLs added by users
//! - **Text processing**: Stripping terminal escape sequences from feed-supplied text
//! - **Durations**: Parsing `agg` intervals such as `10s` or `1h30m`
//!
//! # Examples
//!
//! ```
//! use gator::util::{parse_duration, strip_control_chars, validate_url};
//!
//! let url = validate_url("https://example.com/feed.xml").unwrap();
//! assert_eq!(url.host_str(), Some("example.com"));
//!
//! assert_eq!(strip_control_chars("plain"), "plain");
//! assert_eq!(parse_duration("1m").unwrap().as_secs(), 60);
//! ```

mod duration;
mod text;
mod url_validator;

pub use duration::{format_duration, parse_duration, DurationError};
pub use text::strip_control_chars;
pub use url_validator::{validate_url, UrlValidationError};
