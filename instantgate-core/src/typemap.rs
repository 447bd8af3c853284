//! Native MySQL type classification.
//!
//! Maps a native column type string (e.g. `varchar(255) unsigned`) to an
//! [`AbstractType`]. The mapping is a pure function over a static token
//! table; unrecognized tokens classify as `Unknown` rather than failing.

use crate::models::AbstractType;

/// Classifies a native column type string.
///
/// The type string is lowercased, modifier suffixes (`unsigned`, `signed`,
/// `zerofill`) are stripped, the token is cut at the first `(` or space, and
/// the result is looked up in the static table.
///
/// # Example
/// ```rust
/// use instantgate_core::typemap::map_native_type;
/// use instantgate_core::models::AbstractType;
///
/// assert_eq!(map_native_type("varchar(255)"), AbstractType::Text);
/// assert_eq!(map_native_type("BIGINT UNSIGNED"), AbstractType::Integer);
/// ```
pub fn map_native_type(native_type: &str) -> AbstractType {
    match base_token(native_type).as_str() {
        "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "bit" | "year" => {
            AbstractType::Integer
        }
        "float" | "double" | "decimal" | "numeric" => AbstractType::Real,
        "char" | "varchar" | "tinytext" | "text" | "mediumtext" | "longtext" | "json" | "enum"
        | "set" => AbstractType::Text,
        "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" => {
            AbstractType::Binary
        }
        "date" | "datetime" | "timestamp" | "time" => AbstractType::Temporal,
        "bool" | "boolean" => AbstractType::Boolean,
        _ => AbstractType::Unknown,
    }
}

/// Reduces a native type string to its bare lowercase token.
fn base_token(native_type: &str) -> String {
    let mut token = native_type.trim().to_ascii_lowercase();

    for suffix in [" unsigned", " signed", " zerofill"] {
        if let Some(idx) = token.find(suffix) {
            token.truncate(idx);
        }
    }

    if let Some(idx) = token.find(|c| c == '(' || c == ' ') {
        token.truncate(idx);
    }

    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_tokens() {
        for native in ["tinyint", "smallint", "mediumint", "int", "integer", "bigint", "year"] {
            assert_eq!(map_native_type(native), AbstractType::Integer, "{native}");
        }
    }

    #[test]
    fn test_real_tokens() {
        for native in ["float", "double", "decimal", "numeric"] {
            assert_eq!(map_native_type(native), AbstractType::Real, "{native}");
        }
    }

    #[test]
    fn test_text_tokens() {
        for native in ["char", "varchar", "tinytext", "text", "mediumtext", "longtext", "json", "enum", "set"] {
            assert_eq!(map_native_type(native), AbstractType::Text, "{native}");
        }
    }

    #[test]
    fn test_binary_tokens() {
        for native in ["binary", "varbinary", "tinyblob", "blob", "mediumblob", "longblob"] {
            assert_eq!(map_native_type(native), AbstractType::Binary, "{native}");
        }
    }

    #[test]
    fn test_temporal_tokens() {
        for native in ["date", "datetime", "timestamp", "time"] {
            assert_eq!(map_native_type(native), AbstractType::Temporal, "{native}");
        }
    }

    #[test]
    fn test_boolean_token() {
        assert_eq!(map_native_type("bool"), AbstractType::Boolean);
        assert_eq!(map_native_type("boolean"), AbstractType::Boolean);
    }

    #[test]
    fn test_length_suffix_stripped() {
        assert_eq!(map_native_type("varchar(255)"), AbstractType::Text);
        assert_eq!(map_native_type("decimal(10,2)"), AbstractType::Real);
        assert_eq!(map_native_type("bit(8)"), AbstractType::Integer);
    }

    #[test]
    fn test_modifiers_stripped() {
        assert_eq!(map_native_type("int unsigned"), AbstractType::Integer);
        assert_eq!(map_native_type("bigint(20) unsigned zerofill"), AbstractType::Integer);
        assert_eq!(map_native_type("TINYINT SIGNED"), AbstractType::Integer);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(map_native_type("VARCHAR(64)"), AbstractType::Text);
        assert_eq!(map_native_type("DateTime"), AbstractType::Temporal);
    }

    #[test]
    fn test_unknown_token() {
        assert_eq!(map_native_type("geometry"), AbstractType::Unknown);
        assert_eq!(map_native_type(""), AbstractType::Unknown);
        assert_eq!(map_native_type("made_up_type(4)"), AbstractType::Unknown);
    }
}
