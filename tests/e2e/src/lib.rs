//! Shared harness for the journey tests.
//!
//! A [`TestProject`] is a throwaway project directory with the standard
//! memory tree, plus seeding helpers that write realistic memory files.

use std::fs;
use std::path::Path;

use ganglion_core::ProjectPaths;
use tempfile::TempDir;

/// A temp project with the `_bmad/_memory` / `_bmad-output` tree in place.
pub struct TestProject {
    // Held for its Drop: the directory lives as long as the project.
    _dir: TempDir,
    pub paths: ProjectPaths,
}

impl TestProject {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp project dir");
        let paths = ProjectPaths::new(dir.path());
        fs::create_dir_all(paths.learnings_dir()).expect("memory tree");
        fs::create_dir_all(paths.output_dir()).expect("output tree");
        Self { _dir: dir, paths }
    }

    pub fn root(&self) -> &Path {
        self.paths.root()
    }

    /// Write one agent's learnings file from bullet lines.
    pub fn write_learnings(&self, agent: &str, lines: &[&str]) {
        let body: String = lines.iter().map(|l| format!("- {}\n", l)).collect();
        fs::write(self.paths.learnings_dir().join(format!("{}.md", agent)), body)
            .expect("write learnings");
    }

    pub fn write_decisions(&self, lines: &[&str]) {
        let body: String = lines.iter().map(|l| format!("- {}\n", l)).collect();
        fs::write(self.paths.decisions_log(), body).expect("write decisions");
    }

    pub fn write_failure_museum(&self, content: &str) {
        fs::write(self.paths.failure_museum(), content).expect("write failure museum");
    }

    pub fn write_trace(&self, content: &str) {
        fs::write(self.paths.trace(), content).expect("write trace");
    }

    pub fn write_shared_context(&self, content: &str) {
        fs::write(self.paths.shared_context(), content).expect("write shared context");
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}
