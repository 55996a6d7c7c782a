use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub const SDLC_TREE: &str = r#"
email: test@test.com
management_account: "111111111111"
units:
  - name: SDLC
    accounts:
      - name: Account1
      - name: Account2
  - name: Prod
    accounts:
      - name: Account3
"#;

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    pub fn write_tree(&self, content: &str) -> PathBuf {
        let path = self.root.path().join("org.yaml");
        fs::write(&path, content).unwrap();
        path
    }

    #[allow(dead_code)]
    pub fn write_state(&self, content: &str) {
        let dir = self.root.path().join(".orgflow");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("state.json"), content).unwrap();
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }
}
