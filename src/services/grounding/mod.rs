//! Grounding
//!
//! Binds abstract action targets to concrete, addressable elements of a page
//! snapshot and extracts literal action arguments from free text. Stateless
//! and read-only over the snapshot it is given.

pub mod extractors;
pub mod locator;

pub use extractors::{
    extract_extraction_options, extract_input_value, extract_list_count, extract_navigation_url,
    extract_scroll_amount, extract_scroll_direction, extract_wait_duration, quoted_fragments,
    ExtractTarget, ExtractionOptions, ScrollDirection, DEFAULT_WAIT_MS,
};
pub use locator::{find_button, find_input, resolve_locator, Locator, LocatorStrategy, ROOT_LOCATOR};
