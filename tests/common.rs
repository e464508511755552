use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Runs the built binary with config, home and git state isolated in a
/// temporary directory.
#[allow(dead_code)]
pub struct TestContext {
    pub temp_dir: TempDir,
    pub config_path: PathBuf,
    pub work_dir: PathBuf,
    pub bin_path: PathBuf,
}

#[allow(dead_code)]
impl TestContext {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("config.json");
        let work_dir = temp_dir.path().join("work");
        std::fs::create_dir_all(&work_dir).expect("Failed to create work dir");

        Self {
            config_path,
            work_dir,
            bin_path: PathBuf::from(env!("CARGO_BIN_EXE_binrel")),
            temp_dir,
        }
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = Command::new(&self.bin_path);
        cmd.current_dir(&self.work_dir);
        cmd.env("BINREL_CONFIG", &self.config_path);
        cmd.env_remove("BINREL_TOKEN");
        cmd.env_remove("RUST_LOG");
        // Nothing may reach a real server from these tests
        cmd.env("BINREL_API_URL", "http://127.0.0.1:9");
        cmd.env("BINREL_UPLOAD_URL", "http://127.0.0.1:9");
        cmd.env("BINREL_WEB_URL", "http://127.0.0.1:9");
        cmd.env("HOME", self.temp_dir.path());
        cmd.env("XDG_CONFIG_HOME", self.temp_dir.path().join("config"));
        cmd.env("GIT_CEILING_DIRECTORIES", self.temp_dir.path());
        cmd
    }

    pub fn run(&self, args: &[&str]) -> CommandOutput {
        self.cmd()
            .args(args)
            .output()
            .expect("Failed to run binrel")
            .into()
    }

    /// Create an empty file in the working directory
    pub fn touch(&self, name: &str) -> PathBuf {
        let path = self.work_dir.join(name);
        std::fs::write(&path, b"\x7fELF").expect("Failed to write file");
        path
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }

    pub fn write_config(&self, content: &str) {
        std::fs::write(&self.config_path, content).expect("Failed to write config");
    }

    pub fn exists(&self, name: &str) -> bool {
        Path::new(&self.work_dir).join(name).exists()
    }
}

#[allow(dead_code)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: std::process::ExitStatus,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            status: output.status,
        }
    }
}

#[allow(dead_code)]
impl CommandOutput {
    pub fn assert_success(&self) -> &Self {
        if !self.status.success() {
            panic!(
                "Command failed with status {:?}\nstdout: {}\nstderr: {}",
                self.status.code(),
                self.stdout,
                self.stderr
            );
        }
        self
    }

    pub fn assert_failure(&self) -> &Self {
        if self.status.success() {
            panic!(
                "Command unexpectedly succeeded\nstdout: {}\nstderr: {}",
                self.stdout, self.stderr
            );
        }
        assert_eq!(self.status.code(), Some(1), "stderr: {}", self.stderr);
        self
    }

    pub fn assert_stdout_contains(&self, text: &str) -> &Self {
        assert!(
            self.stdout.contains(text),
            "Stdout did not contain '{}'\nActual stdout: {}",
            text,
            self.stdout
        );
        self
    }

    pub fn assert_stderr_contains(&self, text: &str) -> &Self {
        assert!(
            self.stderr.contains(text),
            "Stderr did not contain '{}'\nActual stderr: {}",
            text,
            self.stderr
        );
        self
    }
}
