use std::fmt::Write;

use crate::github::FileChange;

/// Framing placed before the PR data. Must not quote any input text so that
/// the first occurrence of a filename or commit message is inside its section.
const INSTRUCTIONS: &str = "\
You maintain the documentation of a software project. Below are the file \
changes and commit messages of a pull request, followed by the project's \
current README. Propose an updated README that reflects these changes. Keep \
everything that is still accurate, and reply with the complete updated README \
in Markdown and nothing else.";

const NO_PATCH: &str = "(no textual diff available)";

/// Combine PR file changes, commit messages and the current README into one prompt.
///
/// Files and commits keep the order they are given in. Pure: the same inputs
/// always produce the same string.
pub fn build_prompt(files: &[FileChange], readme: &str, commits: &[String]) -> String {
    let mut prompt = String::with_capacity(
        INSTRUCTIONS.len()
            + readme.len()
            + files
                .iter()
                .map(|f| f.filename.len() + f.patch.as_ref().map_or(0, String::len) + 32)
                .sum::<usize>()
            + commits.iter().map(|c| c.len() + 1).sum::<usize>()
            + 64,
    );

    prompt.push_str(INSTRUCTIONS);
    prompt.push_str("\n\n## Changed files\n");
    if files.is_empty() {
        prompt.push_str("\n(none)\n");
    }
    for file in files {
        // Writing to a String cannot fail.
        let _ = write!(prompt, "\n### {}\n", file.filename);
        match &file.patch {
            Some(patch) => {
                prompt.push_str("```diff\n");
                prompt.push_str(patch);
                if !patch.ends_with('\n') {
                    prompt.push('\n');
                }
                prompt.push_str("```\n");
            }
            None => {
                prompt.push_str(NO_PATCH);
                prompt.push('\n');
            }
        }
    }

    prompt.push_str("\n## Commit messages\n\n");
    if commits.is_empty() {
        prompt.push_str("(none)\n");
    }
    for message in commits {
        prompt.push_str(message);
        prompt.push('\n');
    }

    prompt.push_str("\n## Current README\n\n");
    prompt.push_str(readme);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(filename: &str, patch: Option<&str>) -> FileChange {
        FileChange {
            filename: filename.to_string(),
            patch: patch.map(str::to_string),
        }
    }

    /// Position of each needle, searching forward from the previous match.
    fn positions_in_order(haystack: &str, needles: &[&str]) -> Option<Vec<usize>> {
        let mut from = 0;
        let mut found = Vec::new();
        for needle in needles {
            let pos = haystack[from..].find(needle)? + from;
            found.push(pos);
            from = pos + needle.len();
        }
        Some(found)
    }

    #[test]
    fn test_single_file_scenario_order() {
        let files = vec![change("README.md", Some("+added section"))];
        let commits = vec!["docs: update".to_string()];
        let prompt = build_prompt(&files, "# Title\n", &commits);

        let needles = ["README.md", "+added section", "docs: update", "# Title"];
        let first: Vec<usize> = needles.iter().map(|n| prompt.find(n).unwrap()).collect();
        assert!(first.windows(2).all(|w| w[0] < w[1]), "{prompt}");
    }

    #[test]
    fn test_preserves_file_and_commit_order() {
        let files = vec![
            change("src/z.rs", Some("+z")),
            change("src/a.rs", Some("+a")),
            change("docs/m.md", Some("+m")),
        ];
        let commits = vec![
            "feat: third".to_string(),
            "fix: first".to_string(),
            "chore: second".to_string(),
        ];
        let prompt = build_prompt(&files, "readme", &commits);

        assert!(positions_in_order(
            &prompt,
            &["src/z.rs", "+z", "src/a.rs", "+a", "docs/m.md", "+m"]
        )
        .is_some());
        assert!(positions_in_order(&prompt, &["feat: third", "fix: first", "chore: second"]).is_some());
    }

    #[test]
    fn test_contains_every_input_verbatim() {
        let files = vec![
            change("a b/with space.txt", Some("@@ -1 +1 @@\n-old\n+new\n")),
            change("Cargo.lock", Some("+dep")),
        ];
        let commits = vec![
            "feat: multi-line\n\nBody paragraph with `code`.".to_string(),
            "Merge branch 'main' into feature".to_string(),
        ];
        let readme = "# Project\n\nSome *markdown* here.\n";
        let prompt = build_prompt(&files, readme, &commits);

        for file in &files {
            assert!(prompt.contains(&file.filename));
            assert!(prompt.contains(file.patch.as_deref().unwrap()));
        }
        for commit in &commits {
            assert!(prompt.contains(commit.as_str()));
        }
        assert!(prompt.ends_with(readme));
    }

    #[test]
    fn test_missing_patch_is_marked() {
        let files = vec![change("logo.png", None), change("src/lib.rs", Some("+x"))];
        let prompt = build_prompt(&files, "", &[]);
        let png = prompt.find("### logo.png").unwrap();
        let marker = prompt.find(NO_PATCH).unwrap();
        let lib = prompt.find("### src/lib.rs").unwrap();
        assert!(png < marker && marker < lib);
        assert_eq!(prompt.matches("```diff").count(), 1);
    }

    #[test]
    fn test_is_pure() {
        let files = vec![change("README.md", Some("+added section"))];
        let commits = vec!["docs: update".to_string()];
        assert_eq!(
            build_prompt(&files, "# Title\n", &commits),
            build_prompt(&files, "# Title\n", &commits)
        );
    }

    #[test]
    fn test_empty_inputs() {
        let prompt = build_prompt(&[], "", &[]);
        assert!(prompt.starts_with(INSTRUCTIONS));
        assert!(prompt.contains("## Changed files\n\n(none)"));
        assert!(prompt.contains("## Commit messages\n\n(none)"));
        assert!(prompt.ends_with("## Current README\n\n"));
    }
}
