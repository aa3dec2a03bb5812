use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static LAST_MICROS: AtomicU64 = AtomicU64::new(0);

/// Microseconds since the epoch, strictly increasing across calls in this process.
pub fn unique_micros() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or_default();

    let mut last = LAST_MICROS.load(Ordering::Relaxed);
    loop {
        let next = if now > last { now } else { last + 1 };
        match LAST_MICROS.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

/// Normalized file extension for a declared content type.
///
/// `image/jpeg` becomes `jpg`, structured suffixes are dropped (`image/svg+xml` -> `svg`)
/// and anything unparsable falls back to `bin`.
pub fn extension_for(content_type: &str) -> String {
    let Ok(mime) = content_type.parse::<mime::Mime>() else {
        return "bin".to_string();
    };

    let subtype = mime.subtype().as_str().to_ascii_lowercase();
    let ext = match subtype.as_str() {
        "jpeg" | "pjpeg" => "jpg".to_string(),
        "x-icon" | "vnd.microsoft.icon" => "ico".to_string(),
        other => other.trim_start_matches("x-").to_string(),
    };

    let ext: String = ext.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if ext.is_empty() { "bin".to_string() } else { ext }
}

/// Collision-resistant name for an upload: `<micros>.<ext>`
pub fn generate_file_name(content_type: &str) -> String {
    format!("{}.{}", unique_micros(), extension_for(content_type))
}

/// Only names this service could have generated are accepted on read paths.
pub fn is_valid_file_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 128
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_extension_mapping() {
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("image/gif"), "gif");
        assert_eq!(extension_for("image/svg+xml"), "svg");
        assert_eq!(extension_for("image/x-icon"), "ico");
        assert_eq!(extension_for("IMAGE/WEBP"), "webp");
        assert_eq!(extension_for("not a mime"), "bin");
    }

    #[test]
    fn test_generated_names_are_unique() {
        let names: HashSet<String> = (0..1000).map(|_| generate_file_name("image/png")).collect();
        assert_eq!(names.len(), 1000);
        assert!(names.iter().all(|n| n.ends_with(".png")));
    }

    #[test]
    fn test_unique_micros_is_monotonic() {
        let a = unique_micros();
        let b = unique_micros();
        assert!(b > a);
    }

    #[test]
    fn test_file_name_validation() {
        assert!(is_valid_file_name("1700000000000000.jpg"));
        assert!(!is_valid_file_name("../etc/passwd"));
        assert!(!is_valid_file_name(".hidden"));
        assert!(!is_valid_file_name("a/b.png"));
        assert!(!is_valid_file_name(""));
    }
}
