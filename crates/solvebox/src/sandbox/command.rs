//! Command builder for the container runtime CLI
//!
//! Builds command-line arguments for `docker run` and `docker rm`, or any
//! runtime that accepts the same flags.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::ImageRef;
use crate::types::ResourceLimits;

/// Builder for container runtime command-line arguments
#[derive(Debug, Clone)]
pub struct SandboxCommand {
    /// Path to the runtime binary
    runtime_path: PathBuf,
    /// One of `run` or `rm`
    action: SandboxAction,
    /// --name, also the handle used to force-remove the container
    name: String,
    image: Option<ImageRef>,
    /// Resource limits
    limits: ResourceLimits,
    /// -e, --env
    env: BTreeMap<String, String>,
    command: Vec<String>,
}

impl SandboxCommand {
    /// Create a new command builder for the container called `name`
    pub fn new(runtime_path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            runtime_path: runtime_path.into(),
            action: SandboxAction::Run,
            name: name.into(),
            image: None,
            limits: ResourceLimits::default(),
            env: BTreeMap::new(),
            command: Vec::new(),
        }
    }

    /// Set the action to perform
    pub fn action(mut self, action: SandboxAction) -> Self {
        self.action = action;
        self
    }

    /// Set the image to run
    pub fn image(mut self, image: ImageRef) -> Self {
        self.image = Some(image);
        self
    }

    /// Set resource limits
    pub fn limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the command to run inside the container
    pub fn command(mut self, cmd: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.command = cmd.into_iter().map(Into::into).collect();
        self
    }

    /// Build the command-line arguments
    ///
    /// Consumes self to avoid cloning the command vector.
    pub fn build(self) -> Vec<String> {
        let mut args = vec![self.runtime_path.to_string_lossy().into_owned()];

        match self.action {
            SandboxAction::Remove => {
                args.push("rm".to_string());
                args.push("--force".to_string());
                args.push(self.name);
            }
            SandboxAction::Run => {
                args.push("run".to_string());

                // Single-use container fed over stdin, removed on exit
                args.push("--rm".to_string());
                args.push("--interactive".to_string());
                args.push(format!("--name={}", self.name));

                // Isolation, applied to every spawn regardless of limits
                args.push("--network=none".to_string());
                args.push("--read-only".to_string());
                args.push("--cap-drop=ALL".to_string());
                args.push("--security-opt=no-new-privileges".to_string());

                // Resource limits
                if let Some(memory) = self.limits.memory_limit {
                    args.push(format!("--memory={memory}m"));
                    args.push(format!("--memory-swap={memory}m"));
                }
                if let Some(cpus) = self.limits.cpus {
                    args.push(format!("--cpus={cpus}"));
                }
                if let Some(procs) = self.limits.max_processes {
                    args.push(format!("--pids-limit={procs}"));
                }
                if let Some(tmpfs) = self.limits.tmpfs_size {
                    args.push(format!("--tmpfs=/tmp:rw,noexec,nosuid,size={tmpfs}m"));
                }

                // Environment
                for (key, value) in &self.env {
                    args.push(format!("--env={key}={value}"));
                }

                // Image and command
                if let Some(image) = self.image {
                    args.push(image.to_string());
                }
                args.extend(self.command);
            }
        }

        args
    }

    /// Get the runtime binary path
    pub fn runtime_path(&self) -> &Path {
        &self.runtime_path
    }

    /// Get the container name
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxAction {
    /// Start a container attached to stdin
    Run,
    /// Force-remove a container, killing it if it still runs
    Remove,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(name: &str) -> ImageRef {
        ImageRef::new(name).unwrap()
    }

    #[test]
    fn test_remove_command() {
        let cmd = SandboxCommand::new("docker", "solvebox-1").action(SandboxAction::Remove);
        let args = cmd.build();
        assert_eq!(args, vec!["docker", "rm", "--force", "solvebox-1"]);
    }

    #[test]
    fn test_run_command_isolation_flags() {
        let cmd = SandboxCommand::new("docker", "solvebox-2")
            .image(image("node:20-alpine"))
            .command(["node", "-"]);
        let args = cmd.build();

        assert_eq!(&args[..3], &["docker", "run", "--rm"]);
        for flag in [
            "--interactive",
            "--name=solvebox-2",
            "--network=none",
            "--read-only",
            "--cap-drop=ALL",
            "--security-opt=no-new-privileges",
        ] {
            assert!(args.contains(&flag.to_string()), "missing {flag}");
        }
        assert_eq!(&args[args.len() - 3..], &["node:20-alpine", "node", "-"]);
    }

    #[test]
    fn test_run_command_with_limits() {
        let limits = ResourceLimits::unset()
            .with_memory_limit(64)
            .with_cpus(0.1)
            .with_max_processes(10)
            .with_tmpfs_size(8);
        let cmd = SandboxCommand::new("docker", "solvebox-3")
            .image(image("python:3.12-alpine"))
            .limits(limits);
        let args = cmd.build();

        assert!(args.contains(&"--memory=64m".to_string()));
        assert!(args.contains(&"--memory-swap=64m".to_string()));
        assert!(args.contains(&"--cpus=0.1".to_string()));
        assert!(args.contains(&"--pids-limit=10".to_string()));
        assert!(args.contains(&"--tmpfs=/tmp:rw,noexec,nosuid,size=8m".to_string()));
    }

    #[test]
    fn test_unset_limits_emit_no_flags() {
        // Ceilings are enforced by config validation
        let cmd = SandboxCommand::new("docker", "solvebox-4")
            .image(image("node:20-alpine"))
            .limits(ResourceLimits::unset());
        let args = cmd.build();

        assert!(!args.iter().any(|a| a.starts_with("--memory")));
        assert!(!args.iter().any(|a| a.starts_with("--cpus=")));
        assert!(!args.iter().any(|a| a.starts_with("--pids-limit=")));
        assert!(!args.iter().any(|a| a.starts_with("--tmpfs=")));
        // Isolation flags do not depend on limits
        assert!(args.contains(&"--network=none".to_string()));
        assert!(args.contains(&"--read-only".to_string()));
    }

    #[test]
    fn test_env_is_sorted_and_before_image() {
        let cmd = SandboxCommand::new("podman", "solvebox-5")
            .env("B", "2")
            .env("A", "1")
            .image(image("python:3.12-alpine"))
            .command(["python3", "-"]);
        let args = cmd.build();

        let a = args.iter().position(|x| x == "--env=A=1").unwrap();
        let b = args.iter().position(|x| x == "--env=B=2").unwrap();
        let img = args.iter().position(|x| x == "python:3.12-alpine").unwrap();
        assert!(a < b && b < img);
        assert_eq!(args[0], "podman");
    }

    #[test]
    fn test_accessors() {
        let cmd = SandboxCommand::new("/usr/bin/docker", "solvebox-6");
        assert_eq!(cmd.runtime_path(), Path::new("/usr/bin/docker"));
        assert_eq!(cmd.name(), "solvebox-6");
    }
}
