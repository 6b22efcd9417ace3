//! Build configuration patching.
//!
//! The solver's worker count is a compile-time constant. Before building we
//! rewrite its value in place; nothing else in the file changes.

use std::path::Path;

use regex::Regex;
use tracing::debug;

const INTEGER_TYPES: &str = "u8|u16|u32|u64|u128|usize|i8|i16|i32|i64|i128|isize";

/// Matches `const NAME: <int> = <digits>;` for one constant name.
///
/// Only declarations that start a line (optionally `pub` or `pub(...)`)
/// match, so commented-out copies are never rewritten.
#[derive(Debug, Clone)]
pub struct ConstPattern {
    name: String,
    regex: Regex,
}

impl ConstPattern {
    pub fn new(name: &str) -> Self {
        let pattern = format!(
            r"(?m)^([ \t]*(?:pub(?:\([^)]*\))?[ \t]+)?const\s+{}\s*:\s*(?:{})\s*=\s*)(\d[\d_]*)(\s*;)",
            regex::escape(name),
            INTEGER_TYPES
        );
        ConstPattern {
            name: name.to_string(),
            regex: Regex::new(&pattern).expect("escaped constant pattern is valid"),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rewrite the first matching declaration to `value`.
    ///
    /// Returns `None` when no declaration matches.
    pub fn apply_to_text(&self, text: &str, value: u64) -> Option<String> {
        let caps = self.regex.captures(text)?;
        let digits = caps.get(2)?;

        let mut out = String::with_capacity(text.len() + 4);
        out.push_str(&text[..digits.start()]);
        out.push_str(&value.to_string());
        out.push_str(&text[digits.end()..]);
        Some(out)
    }
}

/// What [`patch_threads`] did. Only `Applied` touches the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// No value requested
    Unchanged,
    Applied,
    SkippedMissingFile,
    PatternNotFound,
    /// The file could not be read or written
    Failed,
}

impl PatchOutcome {
    pub fn is_warning(self) -> bool {
        matches!(
            self,
            PatchOutcome::SkippedMissingFile | PatchOutcome::PatternNotFound | PatchOutcome::Failed
        )
    }
}

/// Set the thread-count constant in `path`. Never fails the pipeline; the
/// caller reports non-`Applied` outcomes to the operator.
pub fn patch_threads(path: &Path, pattern: &ConstPattern, value: Option<u32>) -> PatchOutcome {
    let Some(value) = value else {
        return PatchOutcome::Unchanged;
    };

    if !path.is_file() {
        debug!("{} not found, keeping default thread count", path.display());
        return PatchOutcome::SkippedMissingFile;
    }

    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            debug!("Cannot read {}: {}", path.display(), err);
            return PatchOutcome::Failed;
        }
    };

    let Some(patched) = pattern.apply_to_text(&text, u64::from(value)) else {
        debug!("No `const {}` declaration in {}", pattern.name(), path.display());
        return PatchOutcome::PatternNotFound;
    };

    if patched == text {
        debug!("{} already set to {}", pattern.name(), value);
        return PatchOutcome::Applied;
    }

    match std::fs::write(path, patched) {
        Ok(()) => {
            debug!("Set {} = {} in {}", pattern.name(), value, path.display());
            PatchOutcome::Applied
        }
        Err(err) => {
            debug!("Cannot write {}: {}", path.display(), err);
            PatchOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    fn threads() -> ConstPattern {
        ConstPattern::new("NUM_THREADS")
    }

    #[test]
    fn test_rewrites_only_the_value() {
        let text = "use rayon::prelude::*;\n\nconst NUM_THREADS: u64 = 2;\npub const MB: usize = 1024 * 1024;\n";
        let patched = threads().apply_to_text(text, 4).unwrap();
        assert_eq!(
            patched,
            "use rayon::prelude::*;\n\nconst NUM_THREADS: u64 = 4;\npub const MB: usize = 1024 * 1024;\n"
        );
    }

    #[test]
    fn test_keeps_original_formatting_and_type() {
        let text = "pub const NUM_THREADS :usize=8 ;";
        assert_eq!(
            threads().apply_to_text(text, 16).unwrap(),
            "pub const NUM_THREADS :usize=16 ;"
        );
    }

    #[test]
    fn test_ignores_similar_identifiers() {
        let text = "const MAX_NUM_THREADS: u64 = 2;\nconst NUM_THREADS_HINT: u64 = 3;\nlet NUM_THREADS = 5;\n";
        assert!(threads().apply_to_text(text, 4).is_none());
    }

    #[test]
    fn test_ignores_non_integer_types() {
        assert!(threads().apply_to_text("const NUM_THREADS: f64 = 2;", 4).is_none());
        assert!(threads().apply_to_text("const NUM_THREADS: u64 = FOO;", 4).is_none());
    }

    #[test]
    fn test_only_first_declaration_changes() {
        let text = "const NUM_THREADS: u64 = 2;\nmod a {\n    const NUM_THREADS: u64 = 2;\n}\n";
        assert_eq!(
            threads().apply_to_text(text, 4).unwrap(),
            "const NUM_THREADS: u64 = 4;\nmod a {\n    const NUM_THREADS: u64 = 2;\n}\n"
        );
    }

    #[test]
    fn test_commented_declaration_is_not_rewritten() {
        let text = "// was: const NUM_THREADS: usize = 2;\n/* const NUM_THREADS: usize = 3; */\nconst NUM_THREADS: usize = 8;\n";
        assert_eq!(
            threads().apply_to_text(text, 4).unwrap(),
            "// was: const NUM_THREADS: usize = 2;\n/* const NUM_THREADS: usize = 3; */\nconst NUM_THREADS: usize = 4;\n"
        );
    }

    #[test]
    fn test_visibility_and_indentation_are_kept() {
        let text = "mod cfg {\n    pub(crate) const NUM_THREADS: u32 = 2;\n}\n";
        assert_eq!(
            threads().apply_to_text(text, 6).unwrap(),
            "mod cfg {\n    pub(crate) const NUM_THREADS: u32 = 6;\n}\n"
        );
    }

    #[test]
    fn test_only_commented_declaration_is_pattern_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("main.rs");
        let text = "// const NUM_THREADS: usize = 2;\nfn main() {}\n";
        std::fs::write(&path, text).unwrap();

        assert_eq!(patch_threads(&path, &threads(), Some(4)), PatchOutcome::PatternNotFound);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), text);
    }

    #[test]
    fn test_patch_file_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("main.rs");
        std::fs::write(&path, "const NUM_THREADS: usize = 8;\nfn main() {}\n").unwrap();

        assert_eq!(patch_threads(&path, &threads(), Some(12)), PatchOutcome::Applied);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "const NUM_THREADS: usize = 12;\nfn main() {}\n"
        );
    }

    #[test]
    fn test_missing_file_is_a_warning() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("main.rs");

        let outcome = patch_threads(&path, &threads(), Some(4));
        assert_eq!(outcome, PatchOutcome::SkippedMissingFile);
        assert!(outcome.is_warning());
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    /// Counts WARN events emitted while it is the default subscriber.
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn test_skipped_patch_leaves_warning_to_caller() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("main.rs");
        let unmatched = dir.path().join("lib.rs");
        std::fs::write(&unmatched, "fn main() {}\n").unwrap();

        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(warnings.clone()));
        let outcomes = tracing::subscriber::with_default(subscriber, || {
            [
                patch_threads(&missing, &threads(), Some(4)),
                patch_threads(&unmatched, &threads(), Some(4)),
            ]
        });

        assert_eq!(
            outcomes,
            [PatchOutcome::SkippedMissingFile, PatchOutcome::PatternNotFound]
        );
        assert_eq!(warnings.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_no_value_is_a_noop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("main.rs");
        std::fs::write(&path, "const NUM_THREADS: u64 = 2;").unwrap();

        assert_eq!(patch_threads(&path, &threads(), None), PatchOutcome::Unchanged);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "const NUM_THREADS: u64 = 2;");
    }
}
