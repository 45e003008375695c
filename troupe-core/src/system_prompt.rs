//! System Prompt Composition
//!
//! Builds an agent's system prompt from its instructions, its tool sets'
//! guidance, and an optional project prompt file read from both the
//! user's home directory and the session's working directory.

use std::path::Path;

use anyhow::{Context, Result};

use crate::agent::Agent;

/// Read a prompt file from the user's home directory and the working
/// directory, concatenating them with home content first. Returns an
/// empty string if neither file exists; only non-not-found IO errors are
/// surfaced.
pub fn prompt_file_content(working_dir: &Path, prompt_file: &str) -> Result<String> {
    if prompt_file.is_empty() {
        return Ok(String::new());
    }

    let mut contents: Vec<String> = Vec::new();

    if let Some(home) = std::env::var_os("HOME") {
        if let Some(text) = read_prompt_file(&Path::new(&home).join(prompt_file))? {
            contents.push(text);
        }
    }

    if let Some(text) = read_prompt_file(&working_dir.join(prompt_file))? {
        contents.push(text);
    }

    if contents.is_empty() {
        return Ok(String::new());
    }

    Ok(format!(
        "\n\n# Project-Specific Context\n Make sure to follow the instructions in the context below\n{}",
        contents.join("\n")
    ))
}

/// Read a single prompt file. Returns `None` when the file does not
/// exist or is empty.
fn read_prompt_file(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) if text.is_empty() => Ok(None),
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => {
            Err(e).with_context(|| format!("failed to read prompt file {}", path.display()))
        }
    }
}

/// Compose the full system prompt for an agent: its instructions, each
/// tool set's guidance, then any project prompt file content.
pub fn build_system_prompt(
    agent: &Agent,
    working_dir: &Path,
    prompt_file: Option<&str>,
) -> Result<String> {
    let mut prompt = agent.instructions.clone();

    for toolset in &agent.toolsets {
        if let Some(instructions) = toolset.instructions() {
            prompt.push_str("\n\n");
            prompt.push_str(&instructions);
        }
    }

    if let Some(file) = prompt_file {
        prompt.push_str(&prompt_file_content(working_dir, file)?);
    }

    Ok(prompt)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // HOME is process-global; serialize the tests that rewrite it.
    static HOME_LOCK: Mutex<()> = Mutex::new(());

    fn with_home<T>(home: &Path, f: impl FnOnce() -> T) -> T {
        let _guard = HOME_LOCK.lock().unwrap();
        let previous = std::env::var_os("HOME");
        std::env::set_var("HOME", home);
        let result = f();
        match previous {
            Some(value) => std::env::set_var("HOME", value),
            None => std::env::remove_var("HOME"),
        }
        result
    }

    const HEADER: &str =
        "\n\n# Project-Specific Context\n Make sure to follow the instructions in the context below\n";

    #[test]
    fn empty_prompt_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let result =
            with_home(home.path(), || prompt_file_content(dir.path(), "")).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn nonexistent_files_are_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let result = with_home(home.path(), || {
            prompt_file_content(dir.path(), "nonexistent.txt")
        })
        .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn only_home_file() {
        let dir = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join("test.md"), "Home content").unwrap();

        let result =
            with_home(home.path(), || prompt_file_content(dir.path(), "test.md")).unwrap();
        assert_eq!(result, format!("{HEADER}Home content"));
    }

    #[test]
    fn only_work_file() {
        let dir = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("test.md"), "Work content").unwrap();

        let result =
            with_home(home.path(), || prompt_file_content(dir.path(), "test.md")).unwrap();
        assert_eq!(result, format!("{HEADER}Work content"));
    }

    #[test]
    fn both_files_home_first() {
        let dir = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join("test.md"), "Home content").unwrap();
        std::fs::write(dir.path().join("test.md"), "Work content").unwrap();

        let result =
            with_home(home.path(), || prompt_file_content(dir.path(), "test.md")).unwrap();
        assert_eq!(result, format!("{HEADER}Home content\nWork content"));
        assert!(result.starts_with("\n\n"));
    }

    #[test]
    fn empty_files_yield_empty_result() {
        let dir = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join("empty.txt"), "").unwrap();
        std::fs::write(dir.path().join("empty.txt"), "").unwrap();

        let result = with_home(home.path(), || {
            prompt_file_content(dir.path(), "empty.txt")
        })
        .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn directory_in_place_of_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("dir")).unwrap();

        let result = with_home(home.path(), || prompt_file_content(dir.path(), "dir"));
        assert!(result.is_err());
    }
}
