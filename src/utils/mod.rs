// SPDX-License-Identifier: GPL-3.0-only
pub mod path_sanitizer;

pub use path_sanitizer::{is_plain_file_name, resolve_content_path};
