// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

/// Normalize a backend name for registry lookup: lowercase, ASCII
/// alphanumerics only.
pub fn normalize_name(name: &str) -> String {
    name.to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Sim"), "sim");
        assert_eq!(normalize_name("md-hat v2"), "mdhatv2");
        assert_eq!(normalize_name(""), "");
    }
}
