use crate::identity::FunctionIdentity;

/// Normalize a path-like prefix to forward slashes (FaaSr payloads sometimes
/// carry `invocation_folder` values with backslashes).
fn normalize(prefix: &str) -> String {
    prefix.replace('\\', "/")
}

/// The object-store key for a function's log: `<log_folder>/<identity>.txt`,
/// where `(k)` in the identity is rewritten to `.k`.
pub fn log_key(invocation_folder: &str, identity: &FunctionIdentity) -> String {
    format!("{}/{}.txt", normalize(invocation_folder), identity.key_suffix())
}

/// The object-store key for a function's completion marker:
/// `<log_folder>/function_completions/<bare-name>[.k].done`.
pub fn done_key(invocation_folder: &str, identity: &FunctionIdentity) -> String {
    format!(
        "{}/function_completions/{}.done",
        normalize(invocation_folder),
        identity.key_suffix()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_identity_keys() {
        let id = FunctionIdentity::bare("test_function");
        assert_eq!(log_key("test/invocation", &id), "test/invocation/test_function.txt");
        assert_eq!(
            done_key("test/invocation", &id),
            "test/invocation/function_completions/test_function.done"
        );
    }

    #[test]
    fn replica_identity_keys() {
        let id = FunctionIdentity::replica("test_function", 2);
        assert_eq!(log_key("test/invocation", &id), "test/invocation/test_function.2.txt");
        assert_eq!(
            done_key("test/invocation", &id),
            "test/invocation/function_completions/test_function.2.done"
        );
    }

    #[test]
    fn normalizes_backslashes() {
        let id = FunctionIdentity::bare("test_function");
        assert_eq!(log_key("test\\invocation", &id), "test/invocation/test_function.txt");
    }
}
